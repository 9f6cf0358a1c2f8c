//! Worktree add/remove/list built from gix primitives.
//!
//! gix does not provide high-level worktree lifecycle APIs, so these are
//! built directly from the on-disk `.git/worktrees/<name>/` layout that git
//! itself uses: a gitdir file, a HEAD file, and commondir pointer.

use std::fs;
use std::path::Path;

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

pub fn worktree_add(
    repo: &GixRepo,
    name: &str,
    target: GitOid,
    path: &Path,
) -> Result<(), GitError> {
    let common_git_dir = repo.repo.git_dir();
    let worktrees_dir = common_git_dir.join("worktrees").join(name);
    if worktrees_dir.exists() {
        return Err(GitError::BackendError {
            message: format!("worktree administrative dir for '{name}' already exists"),
        });
    }
    fs::create_dir_all(&worktrees_dir)?;
    fs::create_dir_all(path)?;

    fs::write(
        worktrees_dir.join("gitdir"),
        format!("{}\n", path.join(".git").display()),
    )?;
    fs::write(
        worktrees_dir.join("commondir"),
        format!("{}\n", pathdiff(common_git_dir, &worktrees_dir)),
    )?;
    fs::write(
        path.join(".git"),
        format!("gitdir: {}\n", worktrees_dir.display()),
    )?;
    fs::write(
        worktrees_dir.join("HEAD"),
        format!("{}\n", to_gix_oid(target)),
    )?;

    crate::checkout_impl::checkout_tree(repo, target, path)?;
    Ok(())
}

pub fn worktree_remove(repo: &GixRepo, name: &str) -> Result<(), GitError> {
    let admin_dir = repo.repo.git_dir().join("worktrees").join(name);
    let gitdir_file = admin_dir.join("gitdir");
    if let Ok(contents) = fs::read_to_string(&gitdir_file) {
        let linked_git_file = contents.trim();
        if let Some(worktree_path) = Path::new(linked_git_file).parent() {
            let _ = fs::remove_file(worktree_path.join(".git"));
            let _ = fs::remove_dir_all(worktree_path);
        }
    }
    if admin_dir.exists() {
        fs::remove_dir_all(&admin_dir)?;
    }
    Ok(())
}

pub fn worktree_list(repo: &GixRepo) -> Result<Vec<WorktreeInfo>, GitError> {
    let mut out = Vec::new();

    let head_oid = repo
        .repo
        .head_id()
        .ok()
        .map(|id| from_gix_oid(id.detach()));
    out.push(WorktreeInfo {
        name: "main".to_owned(),
        path: repo
            .workdir
            .clone()
            .unwrap_or_else(|| repo.repo.git_dir().to_path_buf()),
        head_oid: head_oid.unwrap_or(GitOid::ZERO),
        is_detached: repo.repo.head().map(|h| h.is_detached()).unwrap_or(false),
    });

    let worktrees_root = repo.repo.git_dir().join("worktrees");
    let Ok(entries) = fs::read_dir(&worktrees_root) else {
        return Ok(out);
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let admin_dir = entry.path();

        let gitdir_contents = fs::read_to_string(admin_dir.join("gitdir")).unwrap_or_default();
        let worktree_git_file = gitdir_contents.trim();
        let worktree_path = Path::new(worktree_git_file)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let head_oid = fs::read_to_string(admin_dir.join("HEAD"))
            .ok()
            .and_then(|s| s.trim().parse::<GitOid>().ok())
            .unwrap_or(GitOid::ZERO);

        out.push(WorktreeInfo {
            name,
            path: worktree_path,
            head_oid,
            is_detached: true,
        });
    }

    Ok(out)
}

fn pathdiff(common: &Path, from: &Path) -> String {
    pathdiff::diff_paths(common, from)
        .unwrap_or_else(|| common.to_path_buf())
        .display()
        .to_string()
}

mod pathdiff {
    use std::path::{Component, Path, PathBuf};

    /// Minimal relative-path computation (no external crate): walks up from
    /// `from` to the common ancestor of `path`, then down into `path`.
    pub fn diff_paths(path: &Path, from: &Path) -> Option<PathBuf> {
        let path = path.canonicalize().ok()?;
        let from = from.canonicalize().ok()?;

        let mut path_comps: Vec<Component> = path.components().collect();
        let mut from_comps: Vec<Component> = from.components().collect();

        let mut common_len = 0;
        while common_len < path_comps.len()
            && common_len < from_comps.len()
            && path_comps[common_len] == from_comps[common_len]
        {
            common_len += 1;
        }
        path_comps.drain(..common_len);
        from_comps.drain(..common_len);

        let mut out = PathBuf::new();
        for _ in from_comps {
            out.push("..");
        }
        for c in path_comps {
            out.push(c.as_os_str());
        }
        Some(out)
    }
}
