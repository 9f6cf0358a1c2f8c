//! Unified error type for Cage.
//!
//! Defines [`CageError`], the error type threaded through every subsystem.
//! Messages are agent-friendly: each variant describes what went wrong and
//! what to do about it, since the primary caller is an external agent
//! driving the gateway rather than a human reading a terminal.

use std::fmt;

use crate::model::ids::ValidationError;

// ---------------------------------------------------------------------------
// CageError
// ---------------------------------------------------------------------------

/// Unified error type for Cage operations, spanning the editor, lock
/// manager, task store, git bridge, orchestrator and gateway.
#[derive(Debug)]
pub enum CageError {
    /// The requested path does not exist in the working tree.
    NotFound {
        path: String,
    },

    /// A selector's shape is invalid (bad region bounds, bad regex, or
    /// INSERT used with a regex selector).
    SelectorInvalid {
        reason: String,
    },

    /// A selector matched nothing (empty regex result set).
    SelectorNotFound {
        path: String,
    },

    /// A path attempted to escape the repository root.
    PathEscape {
        path: String,
    },

    /// A lock acquisition conflicted with an existing active lock.
    LockConflict {
        path: String,
        retry_after_ms: u64,
    },

    /// A lock id was not found among active locks (already released, or
    /// never issued).
    LockUnknown {
        lock_id: String,
    },

    /// A lock id was found but has already passed its TTL.
    LockExpired {
        lock_id: String,
    },

    /// A caller-supplied `pre_hash` did not match the file's current hash.
    StalePreimage {
        path: String,
        current_pre_hash: String,
    },

    /// The requested task does not exist.
    TaskNotFound {
        id: String,
    },

    /// An `if_unchanged` token did not match the task's current
    /// `updated_at`, or a patch attempted to mutate an append-only field.
    TaskConflict {
        id: String,
        reason: String,
    },

    /// A task patch would violate the §3 schema or invariants.
    TaskSchemaViolation {
        id: String,
        detail: String,
    },

    /// The requested run does not exist.
    RunNotFound {
        run_id: String,
    },

    /// A requested agent or crew does not exist.
    NotRegistered {
        kind: &'static str,
        id: String,
    },

    /// A crew definition referenced an unknown agent id, or had empty roles.
    InvalidCrew {
        reason: String,
    },

/// A run's wall-clock timeout elapsed before it reached a terminal state.
    Timeout {
        run_id: String,
    },

    /// A run was cancelled (cooperatively, at a phase boundary).
    Cancelled {
        run_id: String,
    },

    /// A run is already in a terminal state; it cannot be mutated further.
    RunTerminal {
        run_id: String,
        status: String,
    },

    /// The reviewer phase rejected the implementer's work.
    ReviewerRejected {
        findings: Vec<String>,
    },

    /// A merge produced conflicts; no partial merge was left on disk.
    GitConflict {
        conflicts: Vec<String>,
    },

    /// A git operation failed.
    GitError {
        command: String,
        detail: String,
    },

    /// The gateway's bearer token was missing or did not match.
    Unauthorized,

    /// A truly unexpected internal failure, constructed only by the
    /// gateway's translation layer and never by C1-C7 themselves. Always
    /// maps to JSON-RPC `-32603`.
    Internal(String),

    /// A JSON-RPC request was malformed or referenced an unknown method.
    InvalidRequest {
        detail: String,
    },

    /// A JSON-RPC request's params failed validation.
    InvalidParams {
        detail: String,
    },

    /// A configuration value was missing or malformed.
    ConfigError {
        variable: String,
        detail: String,
    },

    /// An I/O error occurred during a Cage operation.
    Io(std::io::Error),
}

// ---------------------------------------------------------------------------
// JSON-RPC error-code mapping (spec.md §6, §7)
// ---------------------------------------------------------------------------

impl CageError {
    /// The JSON-RPC 2.0 error code this error maps to at the gateway
    /// boundary (spec.md §7): validation-shaped errors become `-32602`,
    /// everything else becomes the generic `-32603`.
    #[must_use]
    pub const fn rpc_code(&self) -> i32 {
        match self {
            Self::InvalidRequest { .. } => -32600,
            Self::SelectorInvalid { .. }
            | Self::SelectorNotFound { .. }
            | Self::PathEscape { .. }
            | Self::TaskSchemaViolation { .. }
            | Self::InvalidCrew { .. }
            | Self::InvalidParams { .. } => -32602,
            _ => -32603,
        }
    }

    /// A stable, short machine-readable kind string, echoed back to callers
    /// alongside `message` (spec.md §7: "every error response carries
    /// `kind`, `message`...").
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::SelectorInvalid { .. } => "SelectorInvalid",
            Self::SelectorNotFound { .. } => "SelectorNotFound",
            Self::PathEscape { .. } => "PathEscape",
            Self::LockConflict { .. } => "LockConflict",
            Self::LockUnknown { .. } => "LockUnknown",
            Self::LockExpired { .. } => "LockExpired",
            Self::StalePreimage { .. } => "StalePreimage",
            Self::TaskNotFound { .. } => "TaskNotFound",
            Self::TaskConflict { .. } => "TaskConflict",
            Self::TaskSchemaViolation { .. } => "TaskSchemaViolation",
            Self::RunNotFound { .. } => "RunNotFound",
            Self::NotRegistered { .. } => "NotRegistered",
            Self::InvalidCrew { .. } => "InvalidCrew",
            Self::Timeout { .. } => "Timeout",
            Self::Cancelled { .. } => "Cancelled",
            Self::RunTerminal { .. } => "RunTerminal",
            Self::ReviewerRejected { .. } => "ReviewerRejected",
            Self::GitConflict { .. } => "GitConflict",
            Self::GitError { .. } => "GitError",
            Self::Unauthorized => "Unauthorized",
            Self::Internal(_) => "Internal",
            Self::InvalidRequest { .. } => "InvalidRequest",
            Self::InvalidParams { .. } => "InvalidParams",
            Self::ConfigError { .. } => "ConfigError",
            Self::Io(_) => "IoError",
        }
    }

    /// Milliseconds after which a `LockConflict` caller should retry, if any.
    #[must_use]
    pub const fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::LockConflict { retry_after_ms, .. } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Display — agent-friendly error messages
// ---------------------------------------------------------------------------

impl fmt::Display for CageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { path } => {
                write!(
                    f,
                    "'{path}' not found.\n  To fix: check the path is correct and relative to the repository root."
                )
            }
            Self::SelectorInvalid { reason } => {
                write!(
                    f,
                    "invalid selector: {reason}\n  To fix: region selectors use 1-based inclusive lines (end=-1 for EOF); regex selectors need a valid pattern."
                )
            }
            Self::SelectorNotFound { path } => {
                write!(
                    f,
                    "selector matched nothing in '{path}'.\n  To fix: GET the file first to confirm current content, then retry with an adjusted selector."
                )
            }
            Self::PathEscape { path } => {
                write!(
                    f,
                    "path '{path}' escapes the repository root.\n  To fix: use a path relative to the repository root with no `..` components."
                )
            }
            Self::LockConflict { path, retry_after_ms } => {
                write!(
                    f,
                    "could not acquire a lock on '{path}': an overlapping lock is already held.\n  To fix: retry after {retry_after_ms}ms, or narrow the selector to a disjoint range."
                )
            }
            Self::LockUnknown { lock_id } => {
                write!(
                    f,
                    "lock '{lock_id}' is unknown.\n  To fix: it may have already been released; re-acquire a new lock for the operation."
                )
            }
            Self::LockExpired { lock_id } => {
                write!(
                    f,
                    "lock '{lock_id}' has expired.\n  To fix: re-acquire the lock before retrying the mutation."
                )
            }
            Self::StalePreimage {
                path,
                current_pre_hash,
            } => {
                write!(
                    f,
                    "preimage mismatch on '{path}': the file changed since it was read.\n  To fix: re-GET the file (current pre_hash: {current_pre_hash}) and retry with the new hash."
                )
            }
            Self::TaskNotFound { id } => {
                write!(
                    f,
                    "task '{id}' not found.\n  To fix: check the task id, or create it first."
                )
            }
            Self::TaskConflict { id, reason } => {
                write!(
                    f,
                    "update to task '{id}' rejected: {reason}\n  To fix: reload the task and reapply your change against its current state."
                )
            }
            Self::TaskSchemaViolation { id, detail } => {
                write!(
                    f,
                    "patch to task '{id}' violates the task schema: {detail}\n  To fix: adjust the patch to satisfy the task's invariants and retry."
                )
            }
            Self::RunNotFound { run_id } => {
                write!(
                    f,
                    "run '{run_id}' not found.\n  To fix: check the run id via run_list."
                )
            }
            Self::NotRegistered { kind, id } => {
                write!(
                    f,
                    "{kind} '{id}' is not registered.\n  To fix: create it first, or check the id via the corresponding list tool."
                )
            }
            Self::InvalidCrew { reason } => {
                write!(
                    f,
                    "invalid crew definition: {reason}\n  To fix: crews must have at least one role, and every role must reference a registered agent."
                )
            }
            Self::Timeout { run_id } => {
                write!(
                    f,
                    "run '{run_id}' exceeded its wall-clock timeout.\n  To fix: increase RUN_DEFAULT_TIMEOUT_S or the run's timeout_s and retry."
                )
            }
            Self::Cancelled { run_id } => {
                write!(f, "run '{run_id}' was cancelled.")
            }
            Self::RunTerminal { run_id, status } => {
                write!(
                    f,
                    "run '{run_id}' is already in the terminal state '{status}' and cannot be mutated further."
                )
            }
            Self::ReviewerRejected { findings } => {
                write!(f, "reviewer rejected the change with {} finding(s):", findings.len())?;
                for finding in findings {
                    write!(f, "\n  - {finding}")?;
                }
                write!(f, "\n  To fix: address the findings and resubmit for review.")
            }
            Self::GitConflict { conflicts } => {
                write!(f, "merge produced conflicts in {} file(s):", conflicts.len())?;
                for c in conflicts {
                    write!(f, "\n  - {c}")?;
                }
                write!(f, "\n  To fix: resolve conflicts manually; no partial merge was left on disk.")
            }
            Self::GitError { command, detail } => {
                write!(
                    f,
                    "git operation failed: {command}\n  detail: {detail}\n  To fix: inspect repository state and retry."
                )
            }
            Self::Unauthorized => {
                write!(
                    f,
                    "unauthorized: missing or invalid bearer token.\n  To fix: supply a valid token in the Authorization header."
                )
            }
            Self::Internal(detail) => {
                write!(f, "internal error: {detail}")
            }
            Self::InvalidRequest { detail } => {
                write!(f, "invalid JSON-RPC request: {detail}")
            }
            Self::InvalidParams { detail } => {
                write!(f, "invalid params: {detail}")
            }
            Self::ConfigError { variable, detail } => {
                write!(
                    f,
                    "configuration error for '{variable}': {detail}\n  To fix: set the environment variable correctly and restart."
                )
            }
            Self::Io(err) => {
                write!(
                    f,
                    "I/O error: {err}\n  To fix: check file permissions and disk space."
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// std::error::Error
// ---------------------------------------------------------------------------

impl std::error::Error for CageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// From impls
// ---------------------------------------------------------------------------

impl From<std::io::Error> for CageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ValidationError> for CageError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidParams {
            detail: err.to_string(),
        }
    }
}

impl From<crate::config::ConfigError> for CageError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::ConfigError {
            variable: err.variable,
            detail: err.message,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
