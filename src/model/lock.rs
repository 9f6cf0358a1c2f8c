//! Lock records issued by the Lock Manager (C2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::LockId;

/// A 1-based inclusive line range, following the same convention as the
/// Selector Engine. `end_line = -1` means "through end of file".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start_line: u32,
    pub end_line: i64,
}

impl LineRange {
    /// Sentinel meaning "through end of file".
    pub const EOF: i64 = -1;

    /// Construct a range, rejecting the impossible shapes up front.
    ///
    /// # Errors
    /// Returns an error string if `start_line` is zero, or if `end_line` is
    /// neither `EOF` nor `>= start_line`.
    pub fn new(start_line: u32, end_line: i64) -> Result<Self, String> {
        if start_line == 0 {
            return Err("start_line must be >= 1".to_owned());
        }
        if end_line != Self::EOF && end_line < i64::from(start_line) {
            return Err("end_line must be >= start_line or -1 (EOF)".to_owned());
        }
        Ok(Self {
            start_line,
            end_line,
        })
    }

    /// Whether this range overlaps `other`. A range whose `end_line` is
    /// `EOF` is treated as extending to infinity for this comparison.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let self_end = if self.end_line == Self::EOF {
            i64::MAX
        } else {
            self.end_line
        };
        let other_end = if other.end_line == Self::EOF {
            i64::MAX
        } else {
            other.end_line
        };
        i64::from(self.start_line) <= other_end && i64::from(other.start_line) <= self_end
    }
}

/// A cooperative, range-aware, TTL-bounded file lock.
///
/// An empty `ranges` sequence denotes a whole-file lock, which conflicts
/// with every other lock on the same path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileLock {
    pub lock_id: LockId,
    pub path: String,
    pub owner: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ranges: Vec<LineRange>,
    pub description: Option<String>,
}

impl FileLock {
    /// Whether this lock covers the entire file.
    #[must_use]
    pub fn is_whole_file(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Whether this lock has passed its TTL as of `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether this lock conflicts with a prospective acquisition over
    /// `ranges` on the same path (whole-file lock conflicts with anything).
    #[must_use]
    pub fn conflicts_with(&self, ranges: &[LineRange]) -> bool {
        if self.is_whole_file() || ranges.is_empty() {
            return true;
        }
        self.ranges
            .iter()
            .any(|mine| ranges.iter().any(|theirs| mine.overlaps(theirs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_reject_zero_start() {
        assert!(LineRange::new(0, 5).is_err());
    }

    #[test]
    fn ranges_reject_end_before_start() {
        assert!(LineRange::new(10, 5).is_err());
    }

    #[test]
    fn ranges_allow_eof() {
        assert!(LineRange::new(10, LineRange::EOF).is_ok());
    }

    #[test]
    fn overlap_detects_touching_ranges() {
        let a = LineRange::new(1, 10).unwrap();
        let b = LineRange::new(10, 20).unwrap();
        assert!(a.overlaps(&b));
    }

    #[test]
    fn overlap_false_for_disjoint_ranges() {
        let a = LineRange::new(1, 5).unwrap();
        let b = LineRange::new(6, 10).unwrap();
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn eof_range_overlaps_anything_after_start() {
        let a = LineRange::new(1, LineRange::EOF).unwrap();
        let b = LineRange::new(1000, 1005).unwrap();
        assert!(a.overlaps(&b));
    }

    #[test]
    fn whole_file_lock_conflicts_with_any_range() {
        let lock = FileLock {
            lock_id: LockId::new(),
            path: "a.rs".to_owned(),
            owner: "agent-1".to_owned(),
            acquired_at: Utc::now(),
            expires_at: Utc::now(),
            ranges: vec![],
            description: None,
        };
        assert!(lock.conflicts_with(&[LineRange::new(1, 2).unwrap()]));
    }
}
