//! gix-backed ref, rev-parse, and ancestry operations.

use gix::refs::transaction::{Change, LogChange, PreviousValue, RefEdit as GixRefEdit, RefLog};
use gix::refs::Target;

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

pub fn read_ref(repo: &GixRepo, name: &RefName) -> Result<Option<GitOid>, GitError> {
    let mut reference = match repo.repo.try_find_reference(name.as_str()) {
        Ok(Some(r)) => r,
        Ok(None) => return Ok(None),
        Err(e) => {
            return Err(GitError::BackendError {
                message: format!("failed to look up ref '{name}': {e}"),
            })
        }
    };
    let id = reference.peel_to_id_in_place().map_err(|e| GitError::BackendError {
        message: format!("failed to peel ref '{name}': {e}"),
    })?;
    Ok(Some(from_gix_oid(id.detach())))
}

pub fn write_ref(repo: &GixRepo, name: &RefName, oid: GitOid, log_message: &str) -> Result<(), GitError> {
    repo.repo
        .reference(
            name.as_str(),
            to_gix_oid(oid),
            PreviousValue::Any,
            log_message,
        )
        .map_err(|e| GitError::BackendError {
            message: format!("failed to write ref '{name}': {e}"),
        })?;
    Ok(())
}

pub fn delete_ref(repo: &GixRepo, name: &RefName) -> Result<(), GitError> {
    match repo.repo.try_find_reference(name.as_str()) {
        Ok(Some(reference)) => reference.delete().map_err(|e| GitError::BackendError {
            message: format!("failed to delete ref '{name}': {e}"),
        }),
        Ok(None) => Ok(()),
        Err(e) => Err(GitError::BackendError {
            message: format!("failed to look up ref '{name}' for deletion: {e}"),
        }),
    }
}

pub fn atomic_ref_update(repo: &GixRepo, edits: &[RefEdit]) -> Result<(), GitError> {
    for edit in edits {
        let current = read_ref(repo, &edit.name)?;
        let expects_absent = edit.expected_old_oid.is_zero();
        let matches = if expects_absent {
            current.is_none()
        } else {
            current == Some(edit.expected_old_oid)
        };
        if !matches {
            return Err(GitError::RefConflict {
                ref_name: edit.name.to_string(),
                message: format!(
                    "expected {}, found {}",
                    if expects_absent { "<absent>".to_string() } else { edit.expected_old_oid.to_string() },
                    current.map(|o| o.to_string()).unwrap_or_else(|| "<missing>".to_string())
                ),
            });
        }
    }

    let gix_edits: Vec<GixRefEdit> = edits
        .iter()
        .map(|edit| {
            let expected = if edit.expected_old_oid.is_zero() {
                PreviousValue::MustNotExist
            } else {
                PreviousValue::MustExistAndMatch(Target::Object(to_gix_oid(edit.expected_old_oid)))
            };
            Ok(GixRefEdit {
                change: Change::Update {
                    log: LogChange {
                        mode: RefLog::AndReference,
                        force_create_reflog: false,
                        message: "cage: atomic ref update".into(),
                    },
                    expected,
                    new: Target::Object(to_gix_oid(edit.new_oid)),
                },
                name: edit.name.as_str().try_into().map_err(|e| GitError::RefConflict {
                    ref_name: edit.name.to_string(),
                    message: format!("invalid ref name: {e}"),
                })?,
                deref: false,
            })
        })
        .collect::<Result<_, GitError>>()?;

    repo.repo
        .edit_references(gix_edits)
        .map_err(|e| GitError::RefConflict {
            ref_name: edits.first().map(|e| e.name.to_string()).unwrap_or_default(),
            message: e.to_string(),
        })?;
    Ok(())
}

pub fn list_refs(repo: &GixRepo, prefix: &str) -> Result<Vec<(RefName, GitOid)>, GitError> {
    let platform = repo.repo.references().map_err(|e| GitError::BackendError {
        message: format!("failed to open references: {e}"),
    })?;

    let iter = platform.prefixed(prefix).map_err(|e| GitError::BackendError {
        message: format!("failed to list refs under '{prefix}': {e}"),
    })?;

    let mut out = Vec::new();
    for item in iter {
        let mut r = item.map_err(|e| GitError::BackendError {
            message: format!("failed to read a ref under '{prefix}': {e}"),
        })?;
        let id = r.peel_to_id_in_place().map_err(|e| GitError::BackendError {
            message: format!("failed to peel ref: {e}"),
        })?;
        let name_str = r.name().as_bstr().to_string();
        let name = RefName::new(&name_str).map_err(|e| GitError::BackendError {
            message: format!("backend returned an invalid ref name: {e}"),
        })?;
        out.push((name, from_gix_oid(id.detach())));
    }
    out.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
    Ok(out)
}

pub fn head_ref(repo: &GixRepo) -> Result<Option<RefName>, GitError> {
    let head = repo.repo.head().map_err(|e| GitError::BackendError {
        message: format!("failed to read HEAD: {e}"),
    })?;
    match head.referent_name() {
        Some(name) => {
            let name_str = name.as_bstr().to_string();
            RefName::new(&name_str)
                .map(Some)
                .map_err(|e| GitError::BackendError {
                    message: format!("HEAD points at an invalid ref name: {e}"),
                })
        }
        None => Ok(None),
    }
}

pub fn rev_parse(repo: &GixRepo, spec: &str) -> Result<GitOid, GitError> {
    let id = repo.repo.rev_parse_single(spec).map_err(|e| GitError::NotFound {
        message: format!("could not resolve '{spec}': {e}"),
    })?;
    Ok(from_gix_oid(id.detach()))
}

pub fn rev_parse_opt(repo: &GixRepo, spec: &str) -> Result<Option<GitOid>, GitError> {
    match repo.repo.rev_parse_single(spec) {
        Ok(id) => Ok(Some(from_gix_oid(id.detach()))),
        Err(_) => Ok(None),
    }
}

pub fn is_ancestor(repo: &GixRepo, ancestor: GitOid, descendant: GitOid) -> Result<bool, GitError> {
    if ancestor == descendant {
        return Ok(true);
    }
    Ok(merge_base(repo, ancestor, descendant)? == Some(ancestor))
}

pub fn merge_base(repo: &GixRepo, a: GitOid, b: GitOid) -> Result<Option<GitOid>, GitError> {
    let a_id = to_gix_oid(a);
    let b_id = to_gix_oid(b);
    match repo.repo.merge_base(a_id, b_id) {
        Ok(id) => Ok(Some(from_gix_oid(id.detach()))),
        Err(gix::repository::merge_base::Error::NotFound { .. }) => Ok(None),
        Err(e) => Err(GitError::BackendError {
            message: format!("merge-base({a}, {b}) failed: {e}"),
        }),
    }
}
