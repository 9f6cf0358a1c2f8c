//! Validated identifier newtypes used throughout Cage.
//!
//! Each identifier validates its format at construction, following the same
//! pattern as the teacher's `WorkspaceId`/`GitOid`: a private inner `String`,
//! a fallible constructor, `Display`, `FromStr`, and serde via
//! `try_from`/`into` so malformed identifiers never survive deserialization.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// A validation error for one of Cage's identifier newtypes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    /// Name of the type being validated (e.g. `"TaskId"`).
    pub kind: &'static str,
    /// The invalid value.
    pub value: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {:?} — {}", self.kind, self.value, self.reason)
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// TaskId
// ---------------------------------------------------------------------------

/// A task identifier: a slug of the form `YYYY-MM-DD-<kebab>` (spec.md §3).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    /// Create a new `TaskId`, validating the `YYYY-MM-DD-<kebab>` shape.
    ///
    /// # Errors
    /// Returns an error if the date prefix is malformed or the kebab suffix
    /// is empty or contains invalid characters.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the slug as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        let err = |reason: &str| ValidationError {
            kind: "TaskId",
            value: s.to_owned(),
            reason: reason.to_owned(),
        };

        let mut parts = s.splitn(4, '-');
        let (Some(y), Some(m), Some(d), Some(rest)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(err(
                "expected the form YYYY-MM-DD-<kebab>, e.g. 2025-01-01-demo",
            ));
        };

        if y.len() != 4 || !y.chars().all(|c| c.is_ascii_digit()) {
            return Err(err("year component must be 4 digits"));
        }
        let month: u32 = m
            .parse()
            .map_err(|_| err("month component must be 2 digits"))?;
        if m.len() != 2 || !(1..=12).contains(&month) {
            return Err(err("month component must be 01-12"));
        }
        let day: u32 = d
            .parse()
            .map_err(|_| err("day component must be 2 digits"))?;
        if d.len() != 2 || !(1..=31).contains(&day) {
            return Err(err("day component must be 01-31"));
        }
        if rest.is_empty() {
            return Err(err("kebab suffix must not be empty"));
        }
        if !rest
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(err(
                "kebab suffix must contain only lowercase letters, digits and hyphens",
            ));
        }
        if rest.starts_with('-') || rest.ends_with('-') || rest.contains("--") {
            return Err(err(
                "kebab suffix must not start/end with a hyphen or contain consecutive hyphens",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TaskId {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TaskId {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// RunId — UUIDv4, per spec.md §3
// ---------------------------------------------------------------------------

/// A run identifier: a UUIDv4 (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Generate a fresh random run id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a run id from its string form.
    ///
    /// # Errors
    /// Returns an error if `s` is not a valid UUID.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| ValidationError {
                kind: "RunId",
                value: s.to_owned(),
                reason: e.to_string(),
            })
    }

    /// Return the inner UUID.
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for RunId {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// LockId — opaque, server-issued
// ---------------------------------------------------------------------------

/// An opaque lock identifier issued by the Lock Manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockId(Uuid);

impl LockId {
    /// Generate a fresh lock id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LockId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for LockId {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| ValidationError {
                kind: "LockId",
                value: s.to_owned(),
                reason: e.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// AgentId / CrewId — free-form slugs
// ---------------------------------------------------------------------------

macro_rules! slug_id {
    ($name:ident, $kind:literal) => {
        #[doc = concat!("A validated ", $kind, " identifier (lowercase alphanumeric + hyphens).")]
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier, validating its shape.
            ///
            /// # Errors
            /// Returns an error if the value is empty or contains characters
            /// other than lowercase letters, digits and hyphens.
            pub fn new(s: &str) -> Result<Self, ValidationError> {
                Self::validate(s)?;
                Ok(Self(s.to_owned()))
            }

            /// Return the identifier as a string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            fn validate(s: &str) -> Result<(), ValidationError> {
                if s.is_empty() {
                    return Err(ValidationError {
                        kind: $kind,
                        value: s.to_owned(),
                        reason: "must not be empty".to_owned(),
                    });
                }
                if !s
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
                {
                    return Err(ValidationError {
                        kind: $kind,
                        value: s.to_owned(),
                        reason: "must contain only lowercase letters, digits, hyphens and underscores".to_owned(),
                    });
                }
                Ok(())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;
            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::validate(&s)?;
                Ok(Self(s))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

slug_id!(AgentId, "AgentId");
slug_id!(CrewId, "CrewId");

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_valid() {
        assert!(TaskId::new("2025-01-01-demo").is_ok());
        assert!(TaskId::new("2025-12-31-fix-auth-bug-2").is_ok());
    }

    #[test]
    fn task_id_rejects_bad_month() {
        assert!(TaskId::new("2025-13-01-demo").is_err());
    }

    #[test]
    fn task_id_rejects_bad_day() {
        assert!(TaskId::new("2025-01-32-demo").is_err());
    }

    #[test]
    fn task_id_rejects_missing_kebab() {
        assert!(TaskId::new("2025-01-01-").is_err());
        assert!(TaskId::new("2025-01-01").is_err());
    }

    #[test]
    fn task_id_rejects_uppercase_kebab() {
        assert!(TaskId::new("2025-01-01-Demo").is_err());
    }

    #[test]
    fn task_id_rejects_double_hyphen() {
        assert!(TaskId::new("2025-01-01-demo--x").is_err());
    }

    #[test]
    fn task_id_display_roundtrip() {
        let id = TaskId::new("2025-06-15-ship-it").unwrap();
        assert_eq!(format!("{id}"), "2025-06-15-ship-it");
        let json = serde_json::to_string(&id).unwrap();
        let back: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn task_id_serde_rejects_invalid() {
        assert!(serde_json::from_str::<TaskId>("\"not-a-task-id\"").is_err());
    }

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let s = id.to_string();
        let parsed: RunId = s.parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn run_id_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn lock_id_parse() {
        let id = LockId::new();
        let s = id.to_string();
        let parsed: LockId = s.parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn agent_id_valid() {
        assert!(AgentId::new("planner-1").is_ok());
    }

    #[test]
    fn agent_id_rejects_uppercase() {
        assert!(AgentId::new("Planner").is_err());
    }

    #[test]
    fn crew_id_valid() {
        assert!(CrewId::new("crew_alpha").is_ok());
    }
}
