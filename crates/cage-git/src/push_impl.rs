//! Push operations via git CLI fallback.
//!
//! Push (and fetch, see [`crate::fetch_impl`]) are kept as CLI subprocesses
//! because gix does not yet provide a high-level transport API for them.
//! The command line is assembled from validated arguments only — callers
//! never pass an arbitrary shell string through.

use std::process::Command;

use crate::error::GitError;
use crate::gix_repo::GixRepo;

fn run_git(repo: &GixRepo, remote: &str, args: &[&str]) -> Result<(), GitError> {
    let workdir = repo.workdir.as_deref().unwrap_or_else(|| repo.repo.git_dir());
    let output = Command::new("git")
        .arg("-C")
        .arg(workdir)
        .args(args)
        .output()
        .map_err(|e| GitError::BackendError {
            message: format!("failed to spawn git {}: {e}", args.join(" ")),
        })?;

    if output.status.success() {
        return Ok(());
    }
    Err(GitError::PushFailed {
        remote: remote.to_owned(),
        message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

pub fn push_branch(
    repo: &GixRepo,
    remote: &str,
    local_ref: &str,
    remote_ref: &str,
    force: bool,
) -> Result<(), GitError> {
    let refspec = format!("{local_ref}:{remote_ref}");
    let mut args = vec!["push"];
    if force {
        args.push("--force");
    }
    args.push(remote);
    args.push(&refspec);
    run_git(repo, remote, &args)
}

pub fn push_tag(repo: &GixRepo, remote: &str, tag: &str) -> Result<(), GitError> {
    run_git(repo, remote, &["push", remote, tag])
}
