//! gix-backed tree-to-tree diff.

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::types::*;

fn to_gix_oid(oid: GitOid) -> gix::ObjectId {
    gix::ObjectId::from_bytes_or_panic(oid.as_bytes())
}

fn from_gix_oid(oid: gix::ObjectId) -> GitOid {
    let bytes: [u8; 20] = oid.as_bytes().try_into().expect("SHA1 is 20 bytes");
    GitOid::from_bytes(bytes)
}

fn entry_mode_of(mode: gix::object::tree::EntryKind) -> EntryMode {
    match mode {
        gix::object::tree::EntryKind::Tree => EntryMode::Tree,
        gix::object::tree::EntryKind::Blob => EntryMode::Blob,
        gix::object::tree::EntryKind::BlobExecutable => EntryMode::BlobExecutable,
        gix::object::tree::EntryKind::Link => EntryMode::Link,
        gix::object::tree::EntryKind::Commit => EntryMode::Commit,
    }
}

pub fn diff_trees(
    repo: &GixRepo,
    old: Option<GitOid>,
    new: GitOid,
) -> Result<Vec<DiffEntry>, GitError> {
    let new_tree = repo
        .repo
        .find_tree(to_gix_oid(new))
        .map_err(|e| GitError::NotFound {
            message: format!("tree {new}: {e}"),
        })?;

    let old_tree = match old {
        Some(oid) => Some(
            repo.repo
                .find_tree(to_gix_oid(oid))
                .map_err(|e| GitError::NotFound {
                    message: format!("tree {oid}: {e}"),
                })?,
        ),
        None => None,
    };

    let mut out = Vec::new();
    let mut changes_platform = match &old_tree {
        Some(t) => t.changes().map_err(|e| GitError::BackendError {
            message: format!("failed to prepare diff: {e}"),
        })?,
        None => repo
            .repo
            .empty_tree()
            .changes()
            .map_err(|e| GitError::BackendError {
                message: format!("failed to prepare diff against empty tree: {e}"),
            })?,
    };

    changes_platform
        .for_each_to_obtain_tree(&new_tree, |change| {
            use gix::object::tree::diff::Change;
            let entry = match &change {
                Change::Addition {
                    location,
                    entry_mode,
                    id,
                    ..
                } => DiffEntry {
                    path: location.to_string(),
                    change_type: ChangeType::Added,
                    old_oid: GitOid::ZERO,
                    new_oid: from_gix_oid(id.detach()),
                    old_mode: None,
                    new_mode: Some(entry_mode_of(entry_mode.kind())),
                },
                Change::Deletion {
                    location,
                    entry_mode,
                    id,
                    ..
                } => DiffEntry {
                    path: location.to_string(),
                    change_type: ChangeType::Deleted,
                    old_oid: from_gix_oid(id.detach()),
                    new_oid: GitOid::ZERO,
                    old_mode: Some(entry_mode_of(entry_mode.kind())),
                    new_mode: None,
                },
                Change::Modification {
                    location,
                    previous_entry_mode,
                    previous_id,
                    entry_mode,
                    id,
                    ..
                } => DiffEntry {
                    path: location.to_string(),
                    change_type: ChangeType::Modified,
                    old_oid: from_gix_oid(previous_id.detach()),
                    new_oid: from_gix_oid(id.detach()),
                    old_mode: Some(entry_mode_of(previous_entry_mode.kind())),
                    new_mode: Some(entry_mode_of(entry_mode.kind())),
                },
                Change::Rewrite {
                    source_location,
                    source_entry_mode,
                    source_id,
                    entry_mode,
                    id,
                    ..
                } => DiffEntry {
                    path: source_location.to_string(),
                    change_type: ChangeType::Renamed {
                        from: source_location.to_string(),
                    },
                    old_oid: from_gix_oid(source_id.detach()),
                    new_oid: from_gix_oid(id.detach()),
                    old_mode: Some(entry_mode_of(source_entry_mode.kind())),
                    new_mode: Some(entry_mode_of(entry_mode.kind())),
                },
            };
            out.push(entry);
            Ok::<_, std::convert::Infallible>(gix::object::tree::diff::Action::Continue)
        })
        .map_err(|e| GitError::BackendError {
            message: format!("diff traversal failed: {e}"),
        })?;

    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}
