//! Fetch via git CLI fallback, mirroring [`crate::push_impl`].
//!
//! Updates `refs/remotes/<remote>/<remote_ref>` and returns the OID it now
//! points to; never touches the working tree or a local branch.

use std::process::Command;

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::types::GitOid;

pub fn fetch_ref(repo: &GixRepo, remote: &str, remote_ref: &str) -> Result<GitOid, GitError> {
    let workdir = repo.workdir.as_deref().unwrap_or_else(|| repo.repo.git_dir());
    let refspec = format!("{remote_ref}:refs/remotes/{remote}/{remote_ref}");

    let output = Command::new("git")
        .arg("-C")
        .arg(workdir)
        .args(["fetch", remote, &refspec])
        .output()
        .map_err(|e| GitError::BackendError {
            message: format!("failed to spawn git fetch: {e}"),
        })?;

    if !output.status.success() {
        return Err(GitError::BackendError {
            message: format!(
                "git fetch {remote} {refspec} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    let tracking = format!("refs/remotes/{remote}/{remote_ref}");
    crate::refs_impl::rev_parse(repo, &tracking)
}
