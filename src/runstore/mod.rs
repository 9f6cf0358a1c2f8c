//! Run Store (C6): persisted crew run state, append-only logs, immutable
//! artefacts (spec.md §4.6).
//!
//! Directory layout per run: `.cage/runs/<run_id>/{status.json, logs.jsonl,
//! artefacts/}`. `status.json` holds everything about a `Run` except its
//! log entries, which live in `logs.jsonl` as one JSON object per line and
//! are only ever appended to, never rewritten.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::CageError;
use crate::model::ids::{CrewId, RunId, TaskId};
use crate::model::run::{Run, RunLogEntry, RunStatus};

/// A filter applied by [`RunStore::list`].
#[derive(Clone, Debug, Default)]
pub struct RunFilter {
    pub status: Option<RunStatus>,
    pub task_id: Option<TaskId>,
    pub crew_id: Option<CrewId>,
}

impl RunFilter {
    fn matches(&self, run: &Run) -> bool {
        if let Some(status) = self.status {
            if run.status != status {
                return false;
            }
        }
        if let Some(task_id) = &self.task_id {
            if &run.task_id != task_id {
                return false;
            }
        }
        if let Some(crew_id) = &self.crew_id {
            if &run.crew_id != crew_id {
                return false;
            }
        }
        true
    }
}

/// The Run Store.
pub struct RunStore {
    root: PathBuf,
}

impl RunStore {
    /// Open a run store rooted at `<repo>/.cage/runs`. Creates the
    /// directory if it doesn't exist.
    ///
    /// # Errors
    /// Propagates any I/O failure creating the directory.
    pub fn open(repo_root: &Path) -> Result<Self, CageError> {
        let root = repo_root.join(".cage").join("runs");
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn run_dir(&self, run_id: RunId) -> PathBuf {
        self.root.join(run_id.to_string())
    }

    fn status_path(&self, run_id: RunId) -> PathBuf {
        self.run_dir(run_id).join("status.json")
    }

    fn logs_path(&self, run_id: RunId) -> PathBuf {
        self.run_dir(run_id).join("logs.jsonl")
    }

    fn artefacts_dir(&self, run_id: RunId) -> PathBuf {
        self.run_dir(run_id).join("artefacts")
    }

    /// Create a new run's directory tree and persist its initial state.
    ///
    /// # Errors
    /// Propagates I/O failures; never fails on duplicate ids since
    /// `RunId` is a freshly generated UUID.
    pub fn create(&self, run: &Run) -> Result<(), CageError> {
        let dir = self.run_dir(run.run_id);
        std::fs::create_dir_all(&dir)?;
        std::fs::create_dir_all(self.artefacts_dir(run.run_id))?;
        std::fs::write(self.logs_path(run.run_id), b"")?;
        self.write_status(run)?;
        Ok(())
    }

    fn write_status(&self, run: &Run) -> Result<(), CageError> {
        let mut on_disk = run.clone();
        on_disk.logs.clear();
        let path = self.status_path(run.run_id);
        let bytes = serde_json::to_vec_pretty(&on_disk)
            .map_err(|e| CageError::Internal(format!("failed to serialize run status: {e}")))?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let tmp = dir.join(format!("status.json.tmp-{}", uuid::Uuid::new_v4()));
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn read_status(&self, run_id: RunId) -> Result<Run, CageError> {
        let bytes = std::fs::read(self.status_path(run_id)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CageError::RunNotFound {
                    run_id: run_id.to_string(),
                }
            } else {
                CageError::Io(e)
            }
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| CageError::Internal(format!("corrupt run status.json: {e}")))
    }

    fn read_logs(&self, run_id: RunId) -> Result<Vec<RunLogEntry>, CageError> {
        let path = self.logs_path(run_id);
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&path)?;
        let mut logs = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: RunLogEntry = serde_json::from_str(line)
                .map_err(|e| CageError::Internal(format!("corrupt logs.jsonl line: {e}")))?;
            logs.push(entry);
        }
        Ok(logs)
    }

    /// Append one log entry. Never rewrites or truncates prior entries.
    ///
    /// # Errors
    /// `RunNotFound` if the run directory doesn't exist; otherwise I/O
    /// failures.
    pub fn append_log(
        &self,
        run_id: RunId,
        phase: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), CageError> {
        let dir = self.run_dir(run_id);
        if !dir.is_dir() {
            return Err(CageError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        let entry = RunLogEntry {
            timestamp: chrono::Utc::now(),
            phase: phase.into(),
            message: message.into(),
        };
        let line = serde_json::to_string(&entry)
            .map_err(|e| CageError::Internal(format!("failed to serialize log entry: {e}")))?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.logs_path(run_id))?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Replace the run's status record (everything but `logs`).
    ///
    /// # Errors
    /// `RunNotFound` if the run doesn't exist; otherwise I/O failures.
    pub fn set_status(&self, run: &Run) -> Result<(), CageError> {
        if !self.status_path(run.run_id).is_file() {
            return Err(CageError::RunNotFound {
                run_id: run.run_id.to_string(),
            });
        }
        self.write_status(run)
    }

    /// Record an uploaded artefact. Refuses path escape and refuses to
    /// overwrite an existing artefact (artefacts are immutable once
    /// written).
    ///
    /// # Errors
    /// `RunNotFound`, `PathEscape`, or `TaskConflict`-shaped rejection via
    /// `CageError::Internal` when the artefact already exists.
    pub fn upload_artefact(
        &self,
        run_id: RunId,
        relative_path: &str,
        bytes: &[u8],
    ) -> Result<(), CageError> {
        let base = self.artefacts_dir(run_id);
        if !base.is_dir() {
            return Err(CageError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        let rel = Path::new(relative_path);
        if rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(CageError::PathEscape {
                path: relative_path.to_owned(),
            });
        }
        let target = base.join(rel);
        if target.exists() {
            return Err(CageError::Internal(format!(
                "artefact '{relative_path}' already exists for run {run_id} and artefacts are immutable"
            )));
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, bytes)?;

        let mut run = self.read_status(run_id)?;
        run.artefacts.insert(relative_path.to_owned());
        self.write_status(&run)?;
        Ok(())
    }

    /// Write a well-known phase output file (`plan.json`, `review.json`) at
    /// the run directory root, distinct from `artefacts/<relative-path>`
    /// (spec.md §6). Overwritable, since a retried phase re-runs in place.
    ///
    /// # Errors
    /// `RunNotFound` if the run doesn't exist; otherwise I/O failures.
    pub fn write_phase_output(&self, run_id: RunId, filename: &str, bytes: &[u8]) -> Result<(), CageError> {
        let dir = self.run_dir(run_id);
        if !dir.is_dir() {
            return Err(CageError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        std::fs::write(dir.join(filename), bytes)?;
        Ok(())
    }

    /// Fetch the full run record, including its accumulated logs.
    ///
    /// # Errors
    /// `RunNotFound` if the run doesn't exist.
    pub fn get(&self, run_id: RunId) -> Result<Run, CageError> {
        let mut run = self.read_status(run_id)?;
        run.logs = self.read_logs(run_id)?;
        Ok(run)
    }

    /// List every run matching `filter`, ordered by `run_id`. Logs are not
    /// loaded for list results; call [`RunStore::get`] for a specific run's
    /// full log history.
    ///
    /// # Errors
    /// Propagates I/O or deserialization failures.
    pub fn list(&self, filter: &RunFilter) -> Result<Vec<Run>, CageError> {
        let mut runs = Vec::new();
        if !self.root.is_dir() {
            return Ok(runs);
        }
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let status_path = entry.path().join("status.json");
            let Ok(bytes) = std::fs::read(&status_path) else {
                continue;
            };
            let Ok(run) = serde_json::from_slice::<Run>(&bytes) else {
                continue;
            };
            if filter.matches(&run) {
                runs.push(run);
            }
        }
        runs.sort_by(|a, b| a.run_id.to_string().cmp(&b.run_id.to_string()));
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::run::RunStrategy;
    use tempfile::tempdir;

    fn sample_run() -> Run {
        Run::queued(
            TaskId::new("2025-01-01-demo").unwrap(),
            CrewId::new("crew-a").unwrap(),
            RunStrategy::ImplThenVerifyAndCommit,
            1200,
        )
    }

    #[test]
    fn create_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        let run = sample_run();
        store.create(&run).unwrap();
        let loaded = store.get(run.run_id).unwrap();
        assert_eq!(loaded.run_id, run.run_id);
        assert!(loaded.logs.is_empty());
    }

    #[test]
    fn append_log_accumulates_in_order() {
        let dir = tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        let run = sample_run();
        store.create(&run).unwrap();
        store.append_log(run.run_id, "plan", "starting").unwrap();
        store.append_log(run.run_id, "plan", "done").unwrap();
        let loaded = store.get(run.run_id).unwrap();
        assert_eq!(loaded.logs.len(), 2);
        assert_eq!(loaded.logs[0].message, "starting");
        assert_eq!(loaded.logs[1].message, "done");
    }

    #[test]
    fn set_status_replaces_without_touching_logs() {
        let dir = tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        let mut run = sample_run();
        store.create(&run).unwrap();
        store.append_log(run.run_id, "plan", "starting").unwrap();

        run.finish(RunStatus::Succeeded, None);
        store.set_status(&run).unwrap();

        let loaded = store.get(run.run_id).unwrap();
        assert_eq!(loaded.status, RunStatus::Succeeded);
        assert_eq!(loaded.logs.len(), 1);
    }

    #[test]
    fn upload_artefact_rejects_path_escape() {
        let dir = tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        let run = sample_run();
        store.create(&run).unwrap();
        let err = store
            .upload_artefact(run.run_id, "../escape.txt", b"data")
            .unwrap_err();
        assert!(matches!(err, CageError::PathEscape { .. }));
    }

    #[test]
    fn upload_artefact_rejects_overwrite() {
        let dir = tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        let run = sample_run();
        store.create(&run).unwrap();
        store
            .upload_artefact(run.run_id, "report.txt", b"v1")
            .unwrap();
        let err = store
            .upload_artefact(run.run_id, "report.txt", b"v2")
            .unwrap_err();
        assert!(matches!(err, CageError::Internal(_)));
    }

    #[test]
    fn upload_artefact_records_in_status() {
        let dir = tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        let run = sample_run();
        store.create(&run).unwrap();
        store
            .upload_artefact(run.run_id, "report.txt", b"v1")
            .unwrap();
        let loaded = store.get(run.run_id).unwrap();
        assert!(loaded.artefacts.contains("report.txt"));
    }

    #[test]
    fn write_phase_output_lands_at_run_root_not_artefacts() {
        let dir = tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        let run = sample_run();
        store.create(&run).unwrap();

        store.write_phase_output(run.run_id, "plan.json", b"{}").unwrap();

        let root = dir.path().join(run.run_id.to_string());
        assert!(root.join("plan.json").is_file());
        assert!(!root.join("artefacts").join("plan.json").exists());

        // Unlike `upload_artefact`, it doesn't register in `run.artefacts`
        // and is overwritable by a retried phase.
        let loaded = store.get(run.run_id).unwrap();
        assert!(!loaded.artefacts.contains("plan.json"));
        store.write_phase_output(run.run_id, "plan.json", b"{\"v\":2}").unwrap();
        assert_eq!(std::fs::read(root.join("plan.json")).unwrap(), b"{\"v\":2}");
    }

    #[test]
    fn get_missing_run_is_not_found() {
        let dir = tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        let err = store.get(RunId::new()).unwrap_err();
        assert!(matches!(err, CageError::RunNotFound { .. }));
    }

    #[test]
    fn list_filters_by_status() {
        let dir = tempdir().unwrap();
        let store = RunStore::open(dir.path()).unwrap();
        let run1 = sample_run();
        store.create(&run1).unwrap();
        let mut run2 = sample_run();
        run2.finish(RunStatus::Succeeded, None);
        store.create(&run2).unwrap();

        let succeeded = store
            .list(&RunFilter {
                status: Some(RunStatus::Succeeded),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(succeeded.len(), 1);
        assert_eq!(succeeded[0].run_id, run2.run_id);
    }
}
