//! gix-backed config read/write.
//!
//! Writes go straight to the repository's local config file (`.git/config`);
//! gix's config snapshot is read-only, so a write re-opens the file section
//! directly rather than going through the snapshot API.

use std::io::Write;

use crate::error::GitError;
use crate::gix_repo::GixRepo;

pub fn read_config(repo: &GixRepo, key: &str) -> Result<Option<String>, GitError> {
    let snapshot = repo.repo.config_snapshot();
    Ok(snapshot.string(key).map(|v| v.to_string()))
}

pub fn write_config(repo: &GixRepo, key: &str, value: &str) -> Result<(), GitError> {
    let (section, subsection, name) = split_key(key)?;
    let config_path = repo.repo.git_dir().join("config");

    let mut file = gix::config::File::from_path_no_includes(
        config_path.clone(),
        gix::config::Source::Local,
    )
    .map_err(|e| GitError::BackendError {
        message: format!("failed to open config file: {e}"),
    })?;

    let mut sect = match subsection {
        Some(sub) => file
            .section_mut_or_create_new(section.as_str(), Some(sub.as_str().into()))
            .map_err(|e| GitError::BackendError {
                message: format!("failed to create config section '{section}.{sub}': {e}"),
            })?,
        None => file
            .section_mut_or_create_new(section.as_str(), None)
            .map_err(|e| GitError::BackendError {
                message: format!("failed to create config section '{section}': {e}"),
            })?,
    };
    sect.set(name.as_str().into(), value.into());

    let mut out = Vec::new();
    file.write_to(&mut out).map_err(|e| GitError::BackendError {
        message: format!("failed to serialize config: {e}"),
    })?;
    let mut f = std::fs::File::create(&config_path)?;
    f.write_all(&out)?;
    Ok(())
}

/// Split a dotted config key like `"user.name"` or `"branch.main.remote"`
/// into `(section, subsection, name)`.
fn split_key(key: &str) -> Result<(String, Option<String>, String), GitError> {
    let mut parts: Vec<&str> = key.split('.').collect();
    if parts.len() < 2 {
        return Err(GitError::BackendError {
            message: format!("invalid config key '{key}': expected at least 'section.name'"),
        });
    }
    let name = parts.pop().unwrap().to_owned();
    let section = parts.remove(0).to_owned();
    let subsection = if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    };
    Ok((section, subsection, name))
}
