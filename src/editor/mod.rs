//! Editor Tool (C3): structured file mutation with preimage checks.
//!
//! `Editor::execute` is the single public entry point; it performs every
//! step of spec.md §4.3 in order: path normalization, selector resolution
//! (C1), lock acquisition (C2), preimage check, mutation, atomic write,
//! diff generation, lock release, and changelog appension.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use sha2::{Digest, Sha256};
use similar::TextDiff;

use crate::error::CageError;
use crate::lock::LockManager;
use crate::model::ids::TaskId;
use crate::model::lock::LineRange;
use crate::model::operation::{
    EditPayload, EditorErrorKind, FileOperation, FileOperationResult, OpKind, Selector,
};
use crate::selector::{self, Intent, Span};

/// Something the Editor Tool can append a changelog entry to when an
/// operation names a `correlation_id`. Implemented by the Task Store; kept
/// as a trait here so the editor has no compile-time dependency on it.
pub trait ChangelogSink: Send + Sync {
    fn append_changelog(&self, task_id: &TaskId, text: &str, lock_id: Option<String>);
}

/// The Editor Tool.
pub struct Editor {
    repo_root: PathBuf,
    locks: Arc<LockManager>,
    default_lock_ttl_s: i64,
}

impl Editor {
    /// Create a new editor rooted at `repo_root`, sharing `locks` with the
    /// rest of the process.
    #[must_use]
    pub fn new(repo_root: PathBuf, locks: Arc<LockManager>, default_lock_ttl_s: i64) -> Self {
        Self {
            repo_root,
            locks,
            default_lock_ttl_s,
        }
    }

    /// Execute a single file operation.
    ///
    /// # Errors
    /// Returns the Editor's failure taxonomy wrapped as a `CageError`:
    /// `NotFound`, `SelectorInvalid`, `SelectorNotFound`, `LockConflict`,
    /// `StalePreimage`, `PathEscape`, or `Io`. On error, no partial write
    /// has occurred and no lock remains held.
    pub fn execute(
        &self,
        op: &FileOperation,
        changelog: Option<&dyn ChangelogSink>,
    ) -> Result<FileOperationResult, CageError> {
        let abs_path = normalize_path(&self.repo_root, &op.path)?;

        let existed = abs_path.is_file();
        let before = if existed {
            std::fs::read(&abs_path)?
        } else {
            Vec::new()
        };
        let pre_hash = hex_sha256(&before);

        if matches!(op.op, OpKind::Get(_)) && !existed {
            return Err(CageError::NotFound {
                path: op.path.clone(),
            });
        }

        let intent = match &op.op {
            OpKind::Get(_) => Intent::Read,
            OpKind::Insert(_) => Intent::Insert,
            OpKind::Update(_) | OpKind::Delete(_) => Intent::Mutate,
        };
        let spans = selector::resolve(&before, op.selector.as_ref(), intent)?;

        if let Some(expected) = op.op.pre_hash() {
            if expected != pre_hash {
                return Err(CageError::StalePreimage {
                    path: op.path.clone(),
                    current_pre_hash: pre_hash,
                });
            }
        }

        if !op.dry_run && op.op.is_mutating() {
            let ranges = lock_ranges(&before, op.selector.as_ref());
            let lock_id = self.locks.acquire(
                &op.path,
                &op.author,
                ranges,
                self.default_lock_ttl_s,
                Some(op.intent.clone()),
            )?;

            let result = self.apply_and_finish(op, &abs_path, &before, &pre_hash, spans, changelog);

            if op.op.keep_lock() {
                if let Ok(ref r) = result {
                    let mut r = r.clone();
                    r.lock_id = Some(lock_id);
                    return Ok(r);
                }
            }
            let _ = self.locks.release(lock_id);
            return result;
        }

        self.apply_and_finish(op, &abs_path, &before, &pre_hash, spans, changelog)
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_and_finish(
        &self,
        op: &FileOperation,
        abs_path: &Path,
        before: &[u8],
        pre_hash: &str,
        spans: Vec<Span>,
        changelog: Option<&dyn ChangelogSink>,
    ) -> Result<FileOperationResult, CageError> {
        let (after, diff_text, deletes_file) = apply_operation(&op.op, op.selector.as_ref(), before, &spans)?;

        if op.dry_run {
            return Ok(FileOperationResult {
                ok: true,
                path: op.path.clone(),
                operation: op.op.name().to_owned(),
                lock_id: None,
                pre_hash: pre_hash.to_owned(),
                post_hash: hex_sha256(&after),
                diff: diff_text,
                warnings: Vec::new(),
                conflicts: Vec::new(),
                error: None,
            });
        }

        if deletes_file {
            if abs_path.is_file() {
                std::fs::remove_file(abs_path)?;
            }
        } else {
            atomic_write(abs_path, &after)?;
        }
        let post_hash = hex_sha256(&after);

        if let (Some(sink), Some(task_id)) = (changelog, op.correlation_id.as_ref()) {
            let text = format!(
                "{} {} by {}: {}",
                op.op.name(),
                op.path,
                op.author,
                op.intent
            );
            sink.append_changelog(task_id, &text, None);
        }

        Ok(FileOperationResult {
            ok: true,
            path: op.path.clone(),
            operation: op.op.name().to_owned(),
            lock_id: None,
            pre_hash: pre_hash.to_owned(),
            post_hash,
            diff: diff_text,
            warnings: Vec::new(),
            conflicts: Vec::new(),
            error: None,
        })
    }
}

/// Reject paths escaping the repository root; never follows symlinks
/// outside it (checked via component inspection, not filesystem
/// resolution, since the target path may not exist yet).
fn normalize_path(repo_root: &Path, rel: &str) -> Result<PathBuf, CageError> {
    let rel_path = Path::new(rel);
    if rel_path.is_absolute() {
        return Err(CageError::PathEscape {
            path: rel.to_owned(),
        });
    }
    for component in rel_path.components() {
        match component {
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(CageError::PathEscape {
                    path: rel.to_owned(),
                });
            }
            _ => {}
        }
    }
    Ok(repo_root.join(rel_path))
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), CageError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let tmp = dir.join(format!(
        ".{}.tmp-{}",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("cage-edit"),
        uuid::Uuid::new_v4()
    ));
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Ranges to lock for a mutating operation: whole-file for regex/no
/// selector, otherwise the region's own line bounds.
fn lock_ranges(content: &[u8], selector: Option<&Selector>) -> Vec<LineRange> {
    match selector {
        Some(Selector::Region { start, end }) => {
            LineRange::new((*start).max(1) as u32, *end)
                .ok()
                .map(|r| vec![r])
                .unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

/// Apply the operation's spans to `before`, producing `(after, diff,
/// deletes_file)`. Spans are applied in reverse document order so earlier
/// offsets stay valid.
fn apply_operation(
    op: &OpKind,
    selector: Option<&Selector>,
    before: &[u8],
    spans: &[Span],
) -> Result<(Vec<u8>, String, bool), CageError> {
    match op {
        OpKind::Get(_) => {
            let mut selected = Vec::new();
            for span in spans {
                selected.extend_from_slice(&before[span.start..span.end]);
            }
            let text = String::from_utf8_lossy(&selected).into_owned();
            Ok((before.to_vec(), text, false))
        }
        OpKind::Insert(payload) => {
            let mut after = before.to_vec();
            for span in spans.iter().rev() {
                after.splice(span.start..span.end, payload.content.bytes());
            }
            let diff = unified_diff(before, &after);
            Ok((after, diff, false))
        }
        OpKind::Update(payload) => {
            let mut after = before.to_vec();
            if let Some(Selector::Regex { .. }) = selector {
                let text = std::str::from_utf8(before).map_err(|e| CageError::SelectorInvalid {
                    reason: format!("file is not valid UTF-8: {e}"),
                })?;
                let replaced = regex_replace_all(text, selector, &payload.content)?;
                after = replaced.into_bytes();
            } else {
                for span in spans.iter().rev() {
                    after.splice(span.start..span.end, payload.content.bytes());
                }
            }
            let diff = unified_diff(before, &after);
            Ok((after, diff, false))
        }
        OpKind::Delete(_) => {
            if selector.is_none() {
                return Ok((Vec::new(), unified_diff(before, &[]), true));
            }
            let mut after = before.to_vec();
            for span in spans.iter().rev() {
                after.splice(span.start..span.end, std::iter::empty());
            }
            let diff = unified_diff(before, &after);
            Ok((after, diff, false))
        }
    }
}

/// Replace every regex match with `template`, supporting `\1`..`\9`
/// capture-group references (spec.md §9: pinned escape convention).
fn regex_replace_all(
    text: &str,
    selector: Option<&Selector>,
    template: &str,
) -> Result<String, CageError> {
    let Some(Selector::Regex { pattern, flags }) = selector else {
        unreachable!("regex_replace_all called without a regex selector");
    };
    let mut pattern_str = pattern.clone();
    if flags.contains('i') {
        pattern_str = format!("(?i){pattern_str}");
    }
    if flags.contains('m') {
        pattern_str = format!("(?m){pattern_str}");
    }
    if flags.contains('s') {
        pattern_str = format!("(?s){pattern_str}");
    }
    let re = Regex::new(&pattern_str).map_err(|e| CageError::SelectorInvalid {
        reason: format!("invalid regex {pattern:?}: {e}"),
    })?;
    // `regex` uses `$1`; translate the spec's chosen `\1`..`\9` convention.
    let translated = translate_backreferences(template);
    Ok(re.replace_all(text, translated.as_str()).into_owned())
}

fn translate_backreferences(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(d) = chars.peek() {
                if d.is_ascii_digit() && *d != '0' {
                    out.push('$');
                    out.push(*d);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn unified_diff(before: &[u8], after: &[u8]) -> String {
    let before_text = String::from_utf8_lossy(before);
    let after_text = String::from_utf8_lossy(after);
    TextDiff::from_lines(&before_text, &after_text)
        .unified_diff()
        .header("before", "after")
        .to_string()
}
