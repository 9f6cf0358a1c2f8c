//! Lock Manager (C2): cooperative, range-aware, TTL-bounded file locks.
//!
//! In-memory only — on process restart all locks are lost, which is fine:
//! filesystem writes made through the Editor Tool are atomic at the OS
//! level (§4.3), so losing lock bookkeeping never corrupts the working
//! tree. Acquisition is first-come-first-served within this process; there
//! is no waiting queue, conflicts fail fast and callers retry out-of-band.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::error::CageError;
use crate::model::{FileLock, LineRange, LockId};

/// Default lock TTL, used when a caller doesn't pass one (spec.md §4.2).
pub const DEFAULT_TTL_S: i64 = 300;

/// How long a released lock id is remembered so a retried `release` call
/// on the same id is treated as success rather than `LockUnknown`.
const RELEASE_GRACE_S: i64 = 30;

/// The Lock Manager: a single owner of all active locks, guarded by a
/// synchronous mutex since critical sections are short and never held
/// across an `.await`.
pub struct LockManager {
    inner: Mutex<State>,
}

struct State {
    locks: HashMap<LockId, FileLock>,
    recently_released: HashMap<LockId, DateTime<Utc>>,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager {
    /// Create an empty lock manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(State {
                locks: HashMap::new(),
                recently_released: HashMap::new(),
            }),
        }
    }

    /// Acquire a lock on `path` covering `ranges` (empty = whole-file).
    ///
    /// # Errors
    /// Returns `SelectorInvalid` if `ttl_s` isn't positive, or
    /// `LockConflict` if an active, unexpired lock on the same path
    /// overlaps the requested ranges.
    pub fn acquire(
        &self,
        path: &str,
        owner: &str,
        ranges: Vec<LineRange>,
        ttl_s: i64,
        description: Option<String>,
    ) -> Result<LockId, CageError> {
        if ttl_s <= 0 {
            return Err(CageError::SelectorInvalid {
                reason: "ttl must be greater than zero".to_owned(),
            });
        }
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        gc_expired_locked(&mut state);

        if let Some(_conflict) = state
            .locks
            .values()
            .filter(|l| l.path == path)
            .find(|l| l.conflicts_with(&ranges))
        {
            return Err(CageError::LockConflict {
                path: path.to_owned(),
                retry_after_ms: 250,
            });
        }

        let now = Utc::now();
        let lock = FileLock {
            lock_id: LockId::new(),
            path: path.to_owned(),
            owner: owner.to_owned(),
            acquired_at: now,
            expires_at: now + ChronoDuration::seconds(ttl_s),
            ranges,
            description,
        };
        let id = lock.lock_id;
        state.locks.insert(id, lock);
        Ok(id)
    }

    /// Extend a lock's TTL from now.
    ///
    /// # Errors
    /// `LockUnknown` if the id isn't active; `LockExpired` if it was active
    /// but has already passed its TTL.
    pub fn renew(&self, lock_id: LockId, ttl_s: i64) -> Result<(), CageError> {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        gc_expired_locked(&mut state);

        match state.locks.get_mut(&lock_id) {
            Some(lock) => {
                lock.expires_at = Utc::now() + ChronoDuration::seconds(ttl_s);
                Ok(())
            }
            None => Err(CageError::LockUnknown {
                lock_id: lock_id.to_string(),
            }),
        }
    }

    /// Release a lock. Idempotent: releasing an id that was already
    /// released within the last 30s succeeds silently.
    ///
    /// # Errors
    /// `LockUnknown` if the id was never issued, or was released more than
    /// 30s ago.
    pub fn release(&self, lock_id: LockId) -> Result<(), CageError> {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        gc_expired_locked(&mut state);

        if state.locks.remove(&lock_id).is_some() {
            state.recently_released.insert(lock_id, Utc::now());
            return Ok(());
        }
        if state.recently_released.contains_key(&lock_id) {
            return Ok(());
        }
        Err(CageError::LockUnknown {
            lock_id: lock_id.to_string(),
        })
    }

    /// Whether `path` currently has any active lock overlapping `ranges`
    /// (or any lock at all, when `ranges` is `None`).
    #[must_use]
    pub fn is_locked(&self, path: &str, ranges: Option<&[LineRange]>) -> bool {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        gc_expired_locked(&mut state);

        state.locks.values().filter(|l| l.path == path).any(|l| {
            match ranges {
                Some(r) => l.conflicts_with(r),
                None => true,
            }
        })
    }

    /// Remove every lock whose TTL has elapsed. Called lazily by every
    /// other public method; exposed for callers that want to force a
    /// sweep (e.g. a periodic background task).
    pub fn gc_expired(&self) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        gc_expired_locked(&mut state);
    }

    /// Number of currently active (unexpired) locks. Test/diagnostic use.
    #[must_use]
    pub fn active_count(&self) -> usize {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        gc_expired_locked(&mut state);
        state.locks.len()
    }
}

fn gc_expired_locked(state: &mut State) {
    let now = Utc::now();
    state.locks.retain(|_, lock| !lock.is_expired(now));
    let grace = ChronoDuration::seconds(RELEASE_GRACE_S);
    state
        .recently_released
        .retain(|_, released_at| now - *released_at < grace);
}
