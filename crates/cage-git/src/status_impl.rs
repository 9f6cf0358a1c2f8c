//! gix-backed status and dirty detection.

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::types::*;

pub fn is_dirty(repo: &GixRepo) -> Result<bool, GitError> {
    Ok(!status(repo)?.is_empty())
}

pub fn status(repo: &GixRepo) -> Result<Vec<StatusEntry>, GitError> {
    let platform = repo
        .repo
        .status(gix::progress::Discard)
        .map_err(|e| GitError::BackendError {
            message: format!("failed to start status scan: {e}"),
        })?;

    let iter = platform
        .into_iter(None)
        .map_err(|e| GitError::BackendError {
            message: format!("failed to iterate status: {e}"),
        })?;

    let mut out = Vec::new();
    for item in iter {
        let item = item.map_err(|e| GitError::BackendError {
            message: format!("failed to read a status entry: {e}"),
        })?;

        let (path, file_status) = match item {
            gix::status::Item::IndexWorktree(change) => {
                use gix::status::index_worktree::Item;
                match change {
                    Item::Modification { rela_path, .. } => {
                        (rela_path.to_string(), FileStatus::Modified)
                    }
                    Item::DirectoryContents { entry, .. } => {
                        (entry.rela_path.to_string(), FileStatus::Untracked)
                    }
                    Item::Rewrite { dirwalk_entry, .. } => {
                        (dirwalk_entry.rela_path.to_string(), FileStatus::Renamed)
                    }
                }
            }
            gix::status::Item::TreeIndex(change) => {
                use gix::diff::index::Change;
                match change {
                    Change::Addition { location, .. } => {
                        (location.to_string(), FileStatus::Added)
                    }
                    Change::Deletion { location, .. } => {
                        (location.to_string(), FileStatus::Deleted)
                    }
                    Change::Modification { location, .. } => {
                        (location.to_string(), FileStatus::Modified)
                    }
                    Change::Rewrite { location, .. } => {
                        (location.to_string(), FileStatus::Renamed)
                    }
                }
            }
        };

        out.push(StatusEntry {
            path,
            status: file_status,
        });
    }

    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}
