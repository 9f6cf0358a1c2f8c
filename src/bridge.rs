//! Git Bridge (C5): the porcelain surface a run's Committer phase (and the
//! gateway, indirectly) uses to turn working-tree edits into commits.
//!
//! Built on [`cage_git::GitRepo`], the narrow object-safe trait that is the
//! single point of contact with git: no caller here ever shells out directly
//! or passes a raw command string (spec.md §4.5).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cage_git::{ChangeType, DiffEntry, EntryMode, FileStatus, GitError, GitOid, GitRepo, RefName, TreeEdit};
use chrono::{DateTime, Utc};
use similar::TextDiff;

use crate::error::CageError;
use crate::model::CommitMeta;

/// Working-tree and index status, as surfaced to agents via the gateway.
#[derive(Debug, Clone)]
pub struct RepoStatus {
    pub branch: Option<String>,
    pub staged: Vec<String>,
    pub unstaged: Vec<String>,
    pub untracked: Vec<String>,
    pub ahead: u32,
    pub behind: u32,
}

/// One entry in `history()`'s result.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub sha: String,
    pub title: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

/// The Git Bridge: commits, branches, pushes and merges against one working
/// tree, through a [`GitRepo`] backend.
pub struct GitBridge {
    repo: Arc<dyn GitRepo + Send + Sync>,
    workdir: PathBuf,
}

impl GitBridge {
    #[must_use]
    pub fn new(repo: Arc<dyn GitRepo + Send + Sync>, workdir: PathBuf) -> Self {
        Self { repo, workdir }
    }

    /// Open the git repository at `workdir` using the gix-backed implementation.
    pub fn open(workdir: &Path) -> Result<Self, CageError> {
        let repo = cage_git::GixRepo::open(workdir)?;
        Ok(Self::new(Arc::new(repo), workdir.to_path_buf()))
    }

    /// Working tree + index status (spec.md §4.5).
    pub fn status(&self) -> Result<RepoStatus, CageError> {
        let branch = self
            .repo
            .head_ref()?
            .map(|r| branch_short_name(&r));

        let entries = self.repo.status()?;
        let index = self.repo.read_index()?;
        let indexed_paths: std::collections::BTreeSet<&str> =
            index.iter().map(|e| e.path.as_str()).collect();

        let mut staged = Vec::new();
        let mut unstaged = Vec::new();
        let mut untracked = Vec::new();
        for entry in entries {
            match entry.status {
                FileStatus::Untracked => untracked.push(entry.path),
                _ if indexed_paths.contains(entry.path.as_str()) => staged.push(entry.path),
                _ => unstaged.push(entry.path),
            }
        }
        staged.sort();
        unstaged.sort();
        untracked.sort();

        let (ahead, behind) = self.ahead_behind(branch.as_deref())?;

        Ok(RepoStatus {
            branch,
            staged,
            unstaged,
            untracked,
            ahead,
            behind,
        })
    }

    fn ahead_behind(&self, branch: Option<&str>) -> Result<(u32, u32), CageError> {
        let Some(branch) = branch else {
            return Ok((0, 0));
        };
        let local = self.repo.rev_parse_opt(&format!("refs/heads/{branch}"))?;
        let upstream = self
            .repo
            .rev_parse_opt(&format!("refs/remotes/origin/{branch}"))?;
        let (Some(local), Some(upstream)) = (local, upstream) else {
            return Ok((0, 0));
        };
        if local == upstream {
            return Ok((0, 0));
        }
        let base = self.repo.merge_base(local, upstream)?;
        let ahead = u32::from(base != Some(upstream)) * self.commit_distance(base, local)?;
        let behind = u32::from(base != Some(local)) * self.commit_distance(base, upstream)?;
        Ok((ahead, behind))
    }

    /// Number of commits between `base` (exclusive) and `tip` (inclusive),
    /// following first-parent only — a conservative approximation good
    /// enough for the `ahead`/`behind` counters surfaced to agents.
    fn commit_distance(&self, base: Option<GitOid>, tip: GitOid) -> Result<u32, CageError> {
        let mut count = 0u32;
        let mut cur = Some(tip);
        while let Some(oid) = cur {
            if Some(oid) == base {
                break;
            }
            let commit = self.repo.read_commit(oid)?;
            count += 1;
            cur = commit.parents.first().copied();
            if count > 10_000 {
                break;
            }
        }
        Ok(count)
    }

    /// Create a branch pointing at `from` (or the current `HEAD` if `None`).
    pub fn create_branch(&self, name: &str, from: Option<&str>) -> Result<GitOid, CageError> {
        let target = match from {
            Some(spec) => self.repo.rev_parse(spec)?,
            None => self.repo.rev_parse("HEAD")?,
        };
        let ref_name = RefName::new(&format!("refs/heads/{name}"))
            .map_err(|e| CageError::InvalidParams { detail: e.to_string() })?;
        self.repo.write_ref(&ref_name, target, "cage: create_branch")?;
        Ok(target)
    }

    /// Stage everything, commit, and record the result (spec.md §4.5).
    ///
    /// If the index is empty but the working tree is dirty, all changes are
    /// staged automatically before committing — mirroring `git commit -a`
    /// without the `-a` flag's refusal to add new (untracked) files, since
    /// agents under cage have no separate "please track this file" step.
    pub fn commit(
        &self,
        message: &str,
        author: &str,
        coauthors: &[String],
    ) -> Result<CommitMeta, CageError> {
        let index_before = self.repo.read_index()?;
        if index_before.is_empty() && self.repo.is_dirty()? {
            self.auto_stage_all()?;
        }

        let index = self.repo.read_index()?;
        if index.is_empty() {
            return Err(CageError::Internal("nothing to commit: working tree is clean".to_string()));
        }

        let empty_tree = self.repo.write_tree(&[])?;
        let edits: Vec<TreeEdit> = index
            .iter()
            .map(|e| TreeEdit::Upsert {
                path: e.path.clone(),
                mode: e.mode,
                oid: e.oid,
            })
            .collect();
        let tree = self.repo.edit_tree(empty_tree, &edits)?;

        let parent = self.repo.rev_parse_opt("HEAD")?;
        let parents: Vec<GitOid> = parent.into_iter().collect();

        let full_message = compose_message(message, author, coauthors);

        let update_ref = match self.repo.head_ref()? {
            Some(r) => Some(r),
            None => Some(
                RefName::new("refs/heads/main")
                    .map_err(|e| CageError::InvalidParams { detail: e.to_string() })?,
            ),
        };
        let sha = self
            .repo
            .create_commit(tree, &parents, &full_message, update_ref.as_ref())?;

        let diff = self.repo.diff_trees(parent, tree)?;
        let files_changed: Vec<String> = diff.iter().map(|d| d.path.clone()).collect();
        let (insertions, deletions) = self.count_line_changes(&diff)?;

        Ok(CommitMeta {
            sha: sha.to_string(),
            title: message.to_string(),
            files_changed,
            insertions,
            deletions,
            timestamp: Utc::now(),
        })
    }

    /// Line-level insertions/deletions across `diff`, numstat-style: each
    /// file's old/new blob is diffed with [`TextDiff::from_lines`] and its
    /// `+`/`-` line counts are summed across the commit.
    fn count_line_changes(&self, diff: &[DiffEntry]) -> Result<(u64, u64), CageError> {
        let mut insertions = 0u64;
        let mut deletions = 0u64;
        for entry in diff {
            let old_text = if entry.old_oid.is_zero() {
                String::new()
            } else {
                String::from_utf8_lossy(&self.repo.read_blob(entry.old_oid)?).into_owned()
            };
            let new_text = if entry.new_oid.is_zero() {
                String::new()
            } else {
                String::from_utf8_lossy(&self.repo.read_blob(entry.new_oid)?).into_owned()
            };
            let file_diff = TextDiff::from_lines(&old_text, &new_text);
            insertions += file_diff.iter_all_changes().filter(|c| c.tag() == similar::ChangeTag::Insert).count() as u64;
            deletions += file_diff.iter_all_changes().filter(|c| c.tag() == similar::ChangeTag::Delete).count() as u64;
        }
        Ok((insertions, deletions))
    }

    fn auto_stage_all(&self) -> Result<(), CageError> {
        let status = self.repo.status()?;
        let mut index = self.repo.read_index()?;

        for entry in status {
            index.retain(|e| e.path != entry.path);
            if entry.status == FileStatus::Deleted {
                continue;
            }
            let file_path = self.workdir.join(&entry.path);
            let bytes = std::fs::read(&file_path)?;
            let oid = self.repo.write_blob(&bytes)?;
            let mode = executable_mode(&file_path)?;
            index.push(cage_git::IndexEntry {
                path: entry.path,
                mode,
                oid,
            });
        }
        self.repo.write_index(&index)?;
        Ok(())
    }

    /// Push `branch` to `remote`.
    pub fn push(&self, remote: &str, branch: &str) -> Result<(), CageError> {
        let local_ref = format!("refs/heads/{branch}");
        let remote_ref = format!("refs/heads/{branch}");
        self.repo.push_branch(remote, &local_ref, &remote_ref, false)?;
        Ok(())
    }

    /// Fetch `branch` from `remote` and fast-forward the local branch if
    /// it's a strict ancestor of the fetched tip; otherwise leave the local
    /// branch untouched and return the fetched OID for the caller to merge.
    pub fn pull(&self, remote: &str, branch: &str) -> Result<GitOid, CageError> {
        let fetched = self.repo.fetch_ref(remote, branch)?;
        let local_ref = RefName::new(&format!("refs/heads/{branch}"))
            .map_err(|e| CageError::InvalidParams { detail: e.to_string() })?;

        match self.repo.read_ref(&local_ref)? {
            Some(local) if local == fetched => {}
            Some(local) if self.repo.is_ancestor(local, fetched)? => {
                self.repo.write_ref(&local_ref, fetched, "cage: pull fast-forward")?;
                if self.repo.head_ref()?.as_ref() == Some(&local_ref) {
                    self.repo.checkout_tree(fetched, &self.workdir)?;
                }
            }
            Some(_) => {
                return Err(CageError::GitConflict {
                    conflicts: vec![format!(
                        "local branch '{branch}' has diverged from {remote}/{branch}; merge explicitly"
                    )],
                });
            }
            None => {
                self.repo.write_ref(&local_ref, fetched, "cage: pull (new branch)")?;
            }
        }
        Ok(fetched)
    }

    /// Merge `source` into `target`: fast-forward when possible, otherwise a
    /// deterministic `Merge <source> into <target>` commit. No partial merge
    /// is ever left on disk — on conflict the operation aborts and the
    /// conflicting paths are surfaced via `CageError::GitConflict`.
    pub fn merge(&self, source: &str, target: &str) -> Result<GitOid, CageError> {
        let source_oid = self.repo.rev_parse(source)?;
        let target_ref = RefName::new(&format!("refs/heads/{target}"))
            .map_err(|e| CageError::InvalidParams { detail: e.to_string() })?;
        let target_oid = self
            .repo
            .read_ref(&target_ref)?
            .ok_or_else(|| CageError::NotFound { path: format!("refs/heads/{target}") })?;

        if target_oid == source_oid {
            return Ok(target_oid);
        }
        if self.repo.is_ancestor(target_oid, source_oid)? {
            self.repo
                .write_ref(&target_ref, source_oid, "cage: merge (fast-forward)")?;
            if self.repo.head_ref()?.as_ref() == Some(&target_ref) {
                self.repo.checkout_tree(source_oid, &self.workdir)?;
            }
            return Ok(source_oid);
        }

        let base = self.repo.merge_base(target_oid, source_oid)?;
        let target_diff = self.repo.diff_trees(base, target_oid)?;
        let source_diff = self.repo.diff_trees(base, source_oid)?;
        let target_paths: std::collections::BTreeSet<&str> =
            target_diff.iter().map(|d| d.path.as_str()).collect();
        let conflicts: Vec<String> = source_diff
            .iter()
            .filter(|d| target_paths.contains(d.path.as_str()))
            .map(|d| d.path.clone())
            .collect();
        if !conflicts.is_empty() {
            return Err(CageError::GitConflict { conflicts });
        }

        let mut edits = Vec::new();
        for d in &source_diff {
            match d.change_type {
                ChangeType::Deleted => edits.push(TreeEdit::Remove { path: d.path.clone() }),
                _ => edits.push(TreeEdit::Upsert {
                    path: d.path.clone(),
                    mode: d.new_mode.unwrap_or(EntryMode::Blob),
                    oid: d.new_oid,
                }),
            }
        }
        let tree_target = self.repo.read_commit(target_oid)?.tree_oid;
        let merged_tree = self.repo.edit_tree(tree_target, &edits)?;

        let message = format!("Merge {source} into {target}");
        let merge_commit = self.repo.create_commit(
            merged_tree,
            &[target_oid, source_oid],
            &message,
            Some(&target_ref),
        )?;
        if self.repo.head_ref()?.as_ref() == Some(&target_ref) {
            self.repo.checkout_tree(merge_commit, &self.workdir)?;
        }
        Ok(merge_commit)
    }

    /// Commit history reachable from `HEAD`, newest first, capped at `limit`.
    pub fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>, CageError> {
        let mut out = Vec::new();
        let mut cur = self.repo.rev_parse_opt("HEAD")?;
        while let Some(oid) = cur {
            if out.len() >= limit {
                break;
            }
            let commit = self.repo.read_commit(oid)?;
            let title = commit.message.lines().next().unwrap_or_default().to_string();
            out.push(HistoryEntry {
                sha: oid.to_string(),
                title,
                author: commit.author.clone(),
                timestamp: Utc::now(),
            });
            cur = commit.parents.first().copied();
        }
        Ok(out)
    }
}

fn compose_message(message: &str, author: &str, coauthors: &[String]) -> String {
    let mut full = message.to_string();
    full.push_str("\n\nAuthored-by: ");
    full.push_str(author);
    for co in coauthors {
        full.push_str("\nCo-authored-by: ");
        full.push_str(co);
    }
    full
}

fn branch_short_name(r: &RefName) -> String {
    r.as_str()
        .strip_prefix("refs/heads/")
        .unwrap_or_else(|| r.as_str())
        .to_string()
}

#[cfg(unix)]
fn executable_mode(path: &Path) -> Result<EntryMode, CageError> {
    use std::os::unix::fs::PermissionsExt;
    let meta = std::fs::metadata(path)?;
    Ok(if meta.permissions().mode() & 0o111 != 0 {
        EntryMode::BlobExecutable
    } else {
        EntryMode::Blob
    })
}

#[cfg(not(unix))]
fn executable_mode(_path: &Path) -> Result<EntryMode, CageError> {
    Ok(EntryMode::Blob)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge() -> (GitBridge, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        std::process::Command::new("git").arg("init").arg("-q").arg(dir.path()).status().unwrap();
        (GitBridge::open(dir.path()).unwrap(), dir)
    }

    #[test]
    fn line_changes_count_lines_not_files_on_modify() {
        let (bridge, _dir) = bridge();
        let old_oid = bridge.repo.write_blob(b"def old_foo():\n    pass\n").unwrap();
        let new_oid = bridge.repo.write_blob(b"def new_foo():\n    pass\n").unwrap();
        let diff = vec![DiffEntry {
            path: "bar.py".to_owned(),
            change_type: ChangeType::Modified,
            old_oid,
            new_oid,
            old_mode: Some(EntryMode::Blob),
            new_mode: Some(EntryMode::Blob),
        }];

        let (insertions, deletions) = bridge.count_line_changes(&diff).unwrap();
        assert_eq!(insertions, 1);
        assert_eq!(deletions, 1);
        assert!(insertions + deletions >= 2);
    }

    #[test]
    fn line_changes_count_whole_file_on_add_and_delete() {
        let (bridge, _dir) = bridge();
        let oid = bridge.repo.write_blob(b"one\ntwo\nthree\n").unwrap();

        let added = vec![DiffEntry {
            path: "a.txt".to_owned(),
            change_type: ChangeType::Added,
            old_oid: GitOid::ZERO,
            new_oid: oid,
            old_mode: None,
            new_mode: Some(EntryMode::Blob),
        }];
        let (insertions, deletions) = bridge.count_line_changes(&added).unwrap();
        assert_eq!(insertions, 3);
        assert_eq!(deletions, 0);

        let deleted = vec![DiffEntry {
            path: "a.txt".to_owned(),
            change_type: ChangeType::Deleted,
            old_oid: oid,
            new_oid: GitOid::ZERO,
            old_mode: Some(EntryMode::Blob),
            new_mode: None,
        }];
        let (insertions, deletions) = bridge.count_line_changes(&deleted).unwrap();
        assert_eq!(insertions, 0);
        assert_eq!(deletions, 3);
    }
}

impl From<GitError> for CageError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::NotFound { message } => CageError::NotFound { path: message },
            GitError::RefConflict { ref_name, message } => CageError::GitError {
                command: format!("ref-update {ref_name}"),
                detail: message,
            },
            GitError::DirtyWorktree { path, message } => CageError::GitError {
                command: format!("checkout {path}"),
                detail: message,
            },
            GitError::InvalidOid { value, reason } => CageError::InvalidParams {
                detail: format!("invalid object id {value:?}: {reason}"),
            },
            GitError::IoError(e) => CageError::Io(e),
            GitError::PushFailed { remote, message } => CageError::GitError {
                command: format!("push {remote}"),
                detail: message,
            },
            GitError::MergeConflict { message } => CageError::GitConflict {
                conflicts: vec![message],
            },
            GitError::BackendError { message } => CageError::GitError {
                command: "git".to_string(),
                detail: message,
            },
        }
    }
}
