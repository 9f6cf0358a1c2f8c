//! Editor Tool request/response types (C3).
//!
//! The source system passed operations and selectors around as untyped
//! dictionaries; here both are closed, tagged enums so every variant's
//! payload is checked at the deserialization boundary rather than at
//! match-time deep in the editor.

use serde::{Deserialize, Serialize};

use super::ids::{LockId, TaskId};

/// How a selector identifies the span(s) of a file an operation applies to.
///
/// Region selectors use 1-based inclusive line numbers; `end = -1` means
/// "through end of file". Regex selectors match in document order against
/// the file treated as UTF-8 text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Selector {
    Region { start: i64, end: i64 },
    Regex { pattern: String, flags: String },
}

impl Selector {
    /// Sentinel for `end` meaning "through end of file".
    pub const EOF: i64 = -1;
}

/// The mutating payload shared by INSERT and UPDATE.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EditPayload {
    /// Literal content, or (for regex UPDATE) a replacement template using
    /// `\1`..`\9` capture-group references.
    pub content: String,
    /// Caller-supplied expected `pre_hash`; mismatch fails with
    /// `StalePreimage` so the caller can retry against the current state.
    #[serde(default)]
    pub pre_hash: Option<String>,
    /// If true, the lock acquired for this operation is returned to the
    /// caller instead of being released at the end of `execute`.
    #[serde(default)]
    pub keep_lock: bool,
}

/// The payload shared by operations with no new content (GET, DELETE).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReadPayload {
    #[serde(default)]
    pub pre_hash: Option<String>,
    #[serde(default)]
    pub keep_lock: bool,
}

/// A closed, tagged operation kind — `Operation = Get | Insert{..} |
/// Update{..} | Delete{..}` per the dictionary-to-enum redesign.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "UPPERCASE")]
pub enum OpKind {
    Get(ReadPayload),
    Insert(EditPayload),
    Update(EditPayload),
    Delete(ReadPayload),
}

impl OpKind {
    /// Short uppercase name, as used in changelog text and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Get(_) => "GET",
            Self::Insert(_) => "INSERT",
            Self::Update(_) => "UPDATE",
            Self::Delete(_) => "DELETE",
        }
    }

    /// Whether this operation kind mutates file content.
    #[must_use]
    pub const fn is_mutating(&self) -> bool {
        !matches!(self, Self::Get(_))
    }

    /// The caller-supplied expected pre-hash, if any, common to all kinds.
    #[must_use]
    pub fn pre_hash(&self) -> Option<&str> {
        match self {
            Self::Get(p) | Self::Delete(p) => p.pre_hash.as_deref(),
            Self::Insert(p) | Self::Update(p) => p.pre_hash.as_deref(),
        }
    }

    /// Whether the caller asked to keep the acquired lock past completion.
    #[must_use]
    pub const fn keep_lock(&self) -> bool {
        match self {
            Self::Get(p) | Self::Delete(p) => p.keep_lock,
            Self::Insert(p) | Self::Update(p) => p.keep_lock,
        }
    }
}

/// A request to the Editor Tool.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileOperation {
    #[serde(flatten)]
    pub op: OpKind,
    pub path: String,
    #[serde(default)]
    pub selector: Option<Selector>,
    pub intent: String,
    #[serde(default)]
    pub dry_run: bool,
    pub author: String,
    #[serde(default)]
    pub correlation_id: Option<TaskId>,
}

/// The Editor Tool's failure taxonomy (spec.md §4.3).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "PascalCase")]
pub enum EditorErrorKind {
    NotFound,
    SelectorInvalid { reason: String },
    SelectorNotFound,
    LockConflict { retry_after_ms: u64 },
    StalePreimage { current_pre_hash: String },
    PathEscape,
    IoError { message: String },
}

/// The result of executing a `FileOperation`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileOperationResult {
    pub ok: bool,
    pub path: String,
    pub operation: String,
    #[serde(default)]
    pub lock_id: Option<LockId>,
    pub pre_hash: String,
    pub post_hash: String,
    pub diff: String,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub error: Option<EditorErrorKind>,
}
