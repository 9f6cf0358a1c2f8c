//! Stash create/apply built from tree, index, and commit primitives.
//!
//! gix does not provide a high-level stash API. A stash here is a single
//! commit whose tree captures the current index (there is no separate
//! untracked/worktree parent the way `git stash` builds one) and whose sole
//! parent is HEAD; nothing is written under `refs/stash` since the Lock
//! Manager and Task Store, not stash refs, are cage's concurrency story.

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

pub fn stash_create(repo: &GixRepo) -> Result<Option<GitOid>, GitError> {
    if !crate::status_impl::is_dirty(repo)? {
        return Ok(None);
    }

    let head_oid = repo
        .repo
        .head_id()
        .map_err(|e| GitError::BackendError {
            message: format!("failed to resolve HEAD: {e}"),
        })?
        .detach();

    let index = repo.repo.open_index().map_err(|e| GitError::BackendError {
        message: format!("failed to open index: {e}"),
    })?;

    let tree_oid = index
        .state()
        .to_object_in(
            &repo.repo.objects,
            &mut gix::object::tree::EditorKeep::default(),
        )
        .map_err(|e| GitError::BackendError {
            message: format!("failed to build a tree from the index: {e}"),
        })?;

    let author_sig = repo
        .repo
        .author()
        .ok_or_else(|| GitError::BackendError {
            message: "no author identity configured".to_string(),
        })?
        .map_err(|e| GitError::BackendError {
            message: format!("failed to read author identity: {e}"),
        })?;

    let commit = gix::objs::Commit {
        message: "cage: stash".into(),
        tree: tree_oid.into(),
        author: author_sig.clone().into(),
        committer: author_sig.into(),
        encoding: None,
        parents: vec![head_oid].into(),
        extra_headers: Default::default(),
    };
    let id = repo
        .repo
        .write_object(&commit)
        .map_err(|e| GitError::BackendError {
            message: format!("failed to write stash commit: {e}"),
        })?;
    Ok(Some(from_gix_oid(id.detach())))
}

pub fn stash_apply(repo: &GixRepo, oid: GitOid) -> Result<(), GitError> {
    let workdir = repo.workdir.as_deref().ok_or_else(|| GitError::BackendError {
        message: "stash apply requires a working tree".to_string(),
    })?;
    crate::checkout_impl::checkout_tree(repo, oid, workdir)?;

    let commit = repo
        .repo
        .find_commit(to_gix_oid(oid))
        .map_err(|e| GitError::NotFound {
            message: format!("stash commit {oid}: {e}"),
        })?;
    let tree_id = commit.tree_id().map_err(|e| GitError::BackendError {
        message: format!("failed to read stash tree: {e}"),
    })?;
    let state = gix::index::State::from_tree(&tree_id.detach(), &repo.repo.objects, Default::default())
        .map_err(|e| GitError::BackendError {
            message: format!("failed to rebuild index from stash: {e}"),
        })?;
    let mut index_file = gix::index::File::from_state(state, repo.repo.index_path());
    index_file.write(Default::default()).map_err(|e| GitError::BackendError {
        message: format!("failed to write index after stash apply: {e}"),
    })?;
    Ok(())
}
