//! Task Store (C4): persisted task records with schema + progress
//! invariants (spec.md §3, §4.4).
//!
//! One JSON file per task at `<repo>/.cage/tasks/<id>.json`, written
//! atomically (temp + rename), plus a derived `_status.json` index
//! partitioning tasks into `active` and `recently_completed`. Concurrency is
//! optimistic: callers may pass the `updated_at` they last observed as
//! `if_unchanged`; a mismatch fails with `TaskConflict` rather than
//! silently overwriting a concurrent change.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CageError;
use crate::model::ids::{LockId, TaskId};
use crate::model::task::{CommitMeta, Task, TaskStatus};

/// How long after completion a `done` task still counts as "recently
/// completed" in the status index, rather than aging out of it entirely.
const RECENTLY_COMPLETED_WINDOW_DAYS: i64 = 30;

/// A JSON-patch-style partial update to a task. `None` fields are left
/// unchanged. Append-only collections (`changelog`, `provenance.commits`)
/// are not patchable here — use [`TaskStore::append_changelog`] and
/// [`TaskStore::append_commit`] instead.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub owner: Option<String>,
    pub status: Option<TaskStatus>,
    pub summary: Option<String>,
    pub tags: Option<Vec<String>>,
    pub success_criteria: Option<Vec<crate::model::task::AcceptanceCheck>>,
    pub acceptance_checks: Option<Vec<crate::model::task::AcceptanceCheck>>,
    pub subtasks: Option<Vec<String>>,
    pub todo: Option<Vec<crate::model::task::TodoItem>>,
    pub decisions: Option<Vec<String>>,
    pub lessons_learned: Option<Vec<String>>,
    pub issues_risks: Option<Vec<String>>,
    pub next_steps: Option<Vec<String>>,
    pub references: Option<Vec<String>>,
}

/// A filter applied by [`TaskStore::list`].
#[derive(Clone, Debug, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub tag: Option<String>,
    pub owner: Option<String>,
}

impl TaskFilter {
    fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !task.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(owner) = &self.owner {
            if &task.owner != owner {
                return false;
            }
        }
        true
    }
}

/// The derived status index at `<repo>/.cage/tasks/_status.json`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatusIndex {
    pub active: Vec<TaskId>,
    pub recently_completed: Vec<TaskId>,
    pub rebuilt_at: Option<DateTime<Utc>>,
}

/// The Task Store.
pub struct TaskStore {
    root: PathBuf,
}

impl TaskStore {
    /// Open a task store rooted at `<repo>/.cage/tasks`. Creates the
    /// directory if it doesn't exist.
    ///
    /// # Errors
    /// Propagates any I/O failure creating the directory.
    pub fn open(repo_root: &Path) -> Result<Self, CageError> {
        let root = repo_root.join(".cage").join("tasks");
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn task_path(&self, id: &TaskId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn status_index_path(&self) -> PathBuf {
        self.root.join("_status.json")
    }

    /// Create and persist a brand-new task.
    ///
    /// # Errors
    /// `TaskConflict` if a task with this id already exists; otherwise I/O
    /// failures.
    pub fn create(&self, task: Task) -> Result<Task, CageError> {
        let path = self.task_path(&task.id);
        if path.is_file() {
            return Err(CageError::TaskConflict {
                id: task.id.to_string(),
                reason: "a task with this id already exists".to_owned(),
            });
        }
        let mut task = task;
        task.recompute_progress();
        write_json_atomic(&path, &task)?;
        self.rebuild_status_index()?;
        Ok(task)
    }

    /// Load a task by id.
    ///
    /// # Errors
    /// `TaskNotFound` if no such task exists.
    pub fn load(&self, id: &TaskId) -> Result<Task, CageError> {
        let path = self.task_path(id);
        let bytes = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CageError::TaskNotFound { id: id.to_string() }
            } else {
                CageError::Io(e)
            }
        })?;
        serde_json::from_slice(&bytes).map_err(|e| CageError::TaskSchemaViolation {
            id: id.to_string(),
            detail: e.to_string(),
        })
    }

    /// Apply a patch to a task. `if_unchanged`, when supplied, must equal
    /// the task's current `updated_at` or the write is rejected.
    ///
    /// # Errors
    /// `TaskNotFound`, `TaskConflict` (stale `if_unchanged`), or
    /// `TaskSchemaViolation` if the result would violate I1/I2.
    pub fn update(
        &self,
        id: &TaskId,
        patch: TaskPatch,
        if_unchanged: Option<DateTime<Utc>>,
    ) -> Result<Task, CageError> {
        let mut task = self.load(id)?;

        if let Some(expected) = if_unchanged {
            if task.updated_at != expected {
                return Err(CageError::TaskConflict {
                    id: id.to_string(),
                    reason: format!(
                        "task was modified at {} since the caller last observed {}",
                        task.updated_at, expected
                    ),
                });
            }
        }

        let TaskPatch {
            title,
            owner,
            status,
            summary,
            tags,
            success_criteria,
            acceptance_checks,
            subtasks,
            todo,
            decisions,
            lessons_learned,
            issues_risks,
            next_steps,
            references,
        } = patch;

        if let Some(v) = title {
            task.title = v;
        }
        if let Some(v) = owner {
            task.owner = v;
        }
        if let Some(v) = tags {
            task.tags = v;
        }
        if let Some(v) = success_criteria {
            task.success_criteria = v;
        }
        if let Some(v) = acceptance_checks {
            task.acceptance_checks = v;
        }
        if let Some(v) = subtasks {
            task.subtasks = v;
        }
        if let Some(v) = todo {
            task.todo = v;
        }
        if let Some(v) = decisions {
            task.decisions = v;
        }
        if let Some(v) = lessons_learned {
            task.lessons_learned = v;
        }
        if let Some(v) = issues_risks {
            task.issues_risks = v;
        }
        if let Some(v) = next_steps {
            task.next_steps = v;
        }
        if let Some(v) = references {
            task.references = v;
        }
        if let Some(v) = summary {
            task.summary = v;
        }

        task.recompute_progress();

        if let Some(new_status) = status {
            if matches!(new_status, TaskStatus::Done) && !task.satisfies_done_gate() {
                return Err(CageError::TaskSchemaViolation {
                    id: id.to_string(),
                    detail: "cannot move to done: not every success_criteria entry is checked"
                        .to_owned(),
                });
            }
            task.status = new_status;
        }

        task.updated_at = Utc::now();
        if task.updated_at <= task.created_at {
            task.updated_at = task.created_at + ChronoDuration::nanoseconds(1);
        }

        write_json_atomic(&self.task_path(id), &task)?;
        self.rebuild_status_index()?;
        Ok(task)
    }

    /// Append a changelog entry (I3, I4). Always succeeds if the task
    /// exists; append-only, never rejected for conflicting state.
    ///
    /// # Errors
    /// `TaskNotFound` if the task doesn't exist; otherwise I/O failures.
    pub fn append_changelog(
        &self,
        id: &TaskId,
        text: impl Into<String>,
        lock_id: Option<LockId>,
    ) -> Result<Task, CageError> {
        let mut task = self.load(id)?;
        task.append_changelog(text, lock_id);
        write_json_atomic(&self.task_path(id), &task)?;
        Ok(task)
    }

    /// Append a commit record to provenance (I5).
    ///
    /// # Errors
    /// `TaskNotFound` if the task doesn't exist; otherwise I/O failures.
    pub fn append_commit(&self, id: &TaskId, commit: CommitMeta) -> Result<Task, CageError> {
        let mut task = self.load(id)?;
        task.append_commit(commit);
        write_json_atomic(&self.task_path(id), &task)?;
        self.rebuild_status_index()?;
        Ok(task)
    }

    /// List every task matching `filter`, ordered by id.
    ///
    /// # Errors
    /// Propagates I/O or deserialization failures reading task files.
    pub fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, CageError> {
        let mut tasks = Vec::new();
        if !self.root.is_dir() {
            return Ok(tasks);
        }
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.file_name().and_then(|n| n.to_str()) == Some("_status.json") {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            let Ok(task) = serde_json::from_slice::<Task>(&bytes) else {
                continue;
            };
            if filter.matches(&task) {
                tasks.push(task);
            }
        }
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tasks)
    }

    /// Delete a task's file. Does not touch any lock it referenced.
    ///
    /// # Errors
    /// `TaskNotFound` if no such task exists.
    pub fn delete(&self, id: &TaskId) -> Result<(), CageError> {
        let path = self.task_path(id);
        std::fs::remove_file(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CageError::TaskNotFound { id: id.to_string() }
            } else {
                CageError::Io(e)
            }
        })?;
        self.rebuild_status_index()?;
        Ok(())
    }

    /// Regenerate `_status.json` from the task files on disk. Safe to call
    /// at any time; never fails due to task content.
    ///
    /// # Errors
    /// Propagates I/O failures.
    pub fn rebuild_status_index(&self) -> Result<StatusIndex, CageError> {
        let tasks = self.list(&TaskFilter::default())?;
        let now = Utc::now();
        let window = ChronoDuration::days(RECENTLY_COMPLETED_WINDOW_DAYS);

        let mut active = BTreeSet::new();
        let mut recently_completed = BTreeSet::new();
        for task in tasks {
            match task.status {
                TaskStatus::Done => {
                    if now - task.updated_at <= window {
                        recently_completed.insert(task.id);
                    }
                }
                TaskStatus::Abandoned => {}
                _ => {
                    active.insert(task.id);
                }
            }
        }

        let index = StatusIndex {
            active: active.into_iter().collect(),
            recently_completed: recently_completed.into_iter().collect(),
            rebuilt_at: Some(now),
        };
        write_json_atomic(&self.status_index_path(), &index)?;
        Ok(index)
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), CageError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| CageError::Internal(format!("failed to serialize {}: {e}", path.display())))?;
    let tmp = dir.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("task"),
        uuid::Uuid::new_v4()
    ));
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{AcceptanceCheck, TodoItem, TodoStatus};
    use tempfile::tempdir;

    fn new_task(id: &str) -> Task {
        Task::new(TaskId::new(id).unwrap(), "Title", "alice")
    }

    #[test]
    fn create_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        let id = TaskId::new("2025-01-01-demo").unwrap();
        store.create(new_task(id.as_str())).unwrap();
        let loaded = store.load(&id).unwrap();
        assert_eq!(loaded.title, "Title");
    }

    #[test]
    fn create_duplicate_is_conflict() {
        let dir = tempdir().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        let id = TaskId::new("2025-01-01-demo").unwrap();
        store.create(new_task(id.as_str())).unwrap();
        let err = store.create(new_task(id.as_str())).unwrap_err();
        assert!(matches!(err, CageError::TaskConflict { .. }));
    }

    #[test]
    fn load_missing_task_is_not_found() {
        let dir = tempdir().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        let id = TaskId::new("2025-01-01-missing").unwrap();
        let err = store.load(&id).unwrap_err();
        assert!(matches!(err, CageError::TaskNotFound { .. }));
    }

    #[test]
    fn update_reflects_patch_fields() {
        let dir = tempdir().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        let id = TaskId::new("2025-01-01-demo").unwrap();
        store.create(new_task(id.as_str())).unwrap();
        let patch = TaskPatch {
            summary: Some("updated summary".to_owned()),
            ..Default::default()
        };
        let updated = store.update(&id, patch, None).unwrap();
        assert_eq!(updated.summary, "updated summary");
        let reloaded = store.load(&id).unwrap();
        assert_eq!(reloaded.summary, "updated summary");
    }

    #[test]
    fn update_recomputes_progress_from_todo() {
        let dir = tempdir().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        let id = TaskId::new("2025-01-01-demo").unwrap();
        store.create(new_task(id.as_str())).unwrap();
        let patch = TaskPatch {
            todo: Some(vec![
                TodoItem {
                    text: "a".into(),
                    status: TodoStatus::Done,
                    date_started: None,
                    date_stopped: None,
                },
                TodoItem {
                    text: "b".into(),
                    status: TodoStatus::NotStarted,
                    date_started: None,
                    date_stopped: None,
                },
            ]),
            ..Default::default()
        };
        let updated = store.update(&id, patch, None).unwrap();
        assert_eq!(updated.progress_percent, 50);
    }

    #[test]
    fn update_with_stale_if_unchanged_is_conflict() {
        let dir = tempdir().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        let id = TaskId::new("2025-01-01-demo").unwrap();
        let created = store.create(new_task(id.as_str())).unwrap();
        store
            .update(
                &id,
                TaskPatch {
                    summary: Some("first".into()),
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        let stale = created.updated_at;
        let err = store
            .update(
                &id,
                TaskPatch {
                    summary: Some("second".into()),
                    ..Default::default()
                },
                Some(stale),
            )
            .unwrap_err();
        assert!(matches!(err, CageError::TaskConflict { .. }));
    }

    #[test]
    fn update_to_done_requires_success_criteria_checked() {
        let dir = tempdir().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        let id = TaskId::new("2025-01-01-demo").unwrap();
        let mut task = new_task(id.as_str());
        task.success_criteria.push(AcceptanceCheck {
            text: "works".into(),
            checked: false,
        });
        store.create(task).unwrap();
        let err = store
            .update(
                &id,
                TaskPatch {
                    status: Some(TaskStatus::Done),
                    ..Default::default()
                },
                None,
            )
            .unwrap_err();
        assert!(matches!(err, CageError::TaskSchemaViolation { .. }));
    }

    #[test]
    fn append_changelog_persists_and_is_append_only() {
        let dir = tempdir().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        let id = TaskId::new("2025-01-01-demo").unwrap();
        store.create(new_task(id.as_str())).unwrap();
        store.append_changelog(&id, "did a thing", None).unwrap();
        store.append_changelog(&id, "did another", None).unwrap();
        let loaded = store.load(&id).unwrap();
        assert_eq!(loaded.changelog.len(), 2);
        assert_eq!(loaded.changelog[0].text, "did a thing");
    }

    #[test]
    fn list_filters_by_status_and_tag() {
        let dir = tempdir().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        let mut t1 = new_task("2025-01-01-first");
        t1.tags.push("backend".into());
        let mut t2 = new_task("2025-01-02-second");
        t2.tags.push("frontend".into());
        store.create(t1).unwrap();
        store.create(t2).unwrap();

        let backend_only = store
            .list(&TaskFilter {
                tag: Some("backend".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(backend_only.len(), 1);
        assert_eq!(backend_only[0].id.as_str(), "2025-01-01-first");
    }

    #[test]
    fn delete_removes_file() {
        let dir = tempdir().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        let id = TaskId::new("2025-01-01-demo").unwrap();
        store.create(new_task(id.as_str())).unwrap();
        store.delete(&id).unwrap();
        assert!(matches!(store.load(&id).unwrap_err(), CageError::TaskNotFound { .. }));
    }

    #[test]
    fn rebuild_status_index_partitions_active_and_done() {
        let dir = tempdir().unwrap();
        let store = TaskStore::open(dir.path()).unwrap();
        let active_id = TaskId::new("2025-01-01-active").unwrap();
        store.create(new_task(active_id.as_str())).unwrap();

        let done_id = TaskId::new("2025-01-02-done").unwrap();
        let mut done_task = new_task(done_id.as_str());
        done_task.status = TaskStatus::Done;
        store.create(done_task).unwrap();

        let index = store.rebuild_status_index().unwrap();
        assert!(index.active.contains(&active_id));
        assert!(index.recently_completed.contains(&done_id));
    }
}
