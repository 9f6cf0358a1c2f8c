//! Cage service configuration, loaded from the process environment.
//!
//! Unlike a repository-local `.manifold/config.toml`, Cage's configuration
//! is entirely environment-driven (spec.md §6): the process is expected to
//! run as a single-repo service, typically inside a container, with
//! operational knobs supplied by the orchestrator that launches it.

use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// CageConfig
// ---------------------------------------------------------------------------

/// Top-level Cage service configuration.
///
/// Loaded once at startup via [`CageConfig::from_env`]. `repo_path` and
/// `pod_token` are required; every other field has a documented default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CageConfig {
    /// Absolute path of the working tree Cage operates on.
    pub repo_path: PathBuf,
    /// Bearer token the gateway requires on every request.
    pub pod_token: String,
    /// Default lock TTL in seconds, used when a caller doesn't specify one.
    pub lock_default_ttl_s: u64,
    /// Maximum number of crew runs executing concurrently.
    pub run_max_concurrent: usize,
    /// Default run wall-clock timeout in seconds.
    pub run_default_timeout_s: u64,
    /// Implementer retry policy.
    pub retry: RetryPolicy,
}

/// Exponential-backoff-with-jitter policy for the implementer's retry loop
/// on `LockConflict` / `StalePreimage` (spec.md §4.7).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_ms: u64,
    pub cap_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_max(),
            base_ms: default_retry_base_ms(),
            cap_ms: default_retry_cap_ms(),
        }
    }
}

const fn default_lock_ttl_s() -> u64 {
    300
}

const fn default_run_max_concurrent() -> usize {
    16
}

const fn default_run_timeout_s() -> u64 {
    1200
}

const fn default_retry_max() -> u32 {
    5
}

const fn default_retry_base_ms() -> u64 {
    100
}

const fn default_retry_cap_ms() -> u64 {
    5_000
}

impl CageConfig {
    /// Load configuration from the process environment.
    ///
    /// `REPO_PATH` and `POD_TOKEN` are required; every other recognized
    /// variable falls back to its documented default when unset or empty.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if a required variable is missing, or if a
    /// numeric variable is set but fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let repo_path = require_env("REPO_PATH")?;
        let pod_token = require_env("POD_TOKEN")?;

        Ok(Self {
            repo_path: PathBuf::from(repo_path),
            pod_token,
            lock_default_ttl_s: parse_env_or("LOCK_DEFAULT_TTL_S", default_lock_ttl_s())?,
            run_max_concurrent: parse_env_or("RUN_MAX_CONCURRENT", default_run_max_concurrent())?,
            run_default_timeout_s: parse_env_or(
                "RUN_DEFAULT_TIMEOUT_S",
                default_run_timeout_s(),
            )?,
            retry: RetryPolicy {
                max_attempts: parse_env_or("RETRY_MAX", default_retry_max())?,
                base_ms: parse_env_or("RETRY_BASE_MS", default_retry_base_ms())?,
                cap_ms: parse_env_or("RETRY_CAP_MS", default_retry_cap_ms())?,
            },
        })
    }

    /// Build a config directly, bypassing the environment. Used by tests
    /// and by any embedder that wants to wire Cage up programmatically.
    #[must_use]
    pub fn new(repo_path: PathBuf, pod_token: impl Into<String>) -> Self {
        Self {
            repo_path,
            pod_token: pod_token.into(),
            lock_default_ttl_s: default_lock_ttl_s(),
            run_max_concurrent: default_run_max_concurrent(),
            run_default_timeout_s: default_run_timeout_s(),
            retry: RetryPolicy::default(),
        }
    }
}

fn require_env(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        Ok(_) => Err(ConfigError {
            variable: name.to_owned(),
            message: "must not be empty".to_owned(),
        }),
        Err(_) => Err(ConfigError {
            variable: name.to_owned(),
            message: "required but not set".to_owned(),
        }),
    }
}

fn parse_env_or<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(name) {
        Ok(v) if v.is_empty() => Ok(default),
        Ok(v) => v.parse().map_err(|e: T::Err| ConfigError {
            variable: name.to_owned(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error loading Cage's configuration from the environment.
#[derive(Debug)]
pub struct ConfigError {
    /// The environment variable that was being read.
    pub variable: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.variable, self.message)
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_all() {
        for var in [
            "REPO_PATH",
            "POD_TOKEN",
            "LOCK_DEFAULT_TTL_S",
            "RUN_MAX_CONCURRENT",
            "RUN_DEFAULT_TIMEOUT_S",
            "RETRY_MAX",
            "RETRY_BASE_MS",
            "RETRY_CAP_MS",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn from_env_requires_repo_path() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var("POD_TOKEN", "secret");
        let err = CageConfig::from_env().unwrap_err();
        assert_eq!(err.variable, "REPO_PATH");
        clear_all();
    }

    #[test]
    fn from_env_requires_pod_token() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var("REPO_PATH", "/repo");
        let err = CageConfig::from_env().unwrap_err();
        assert_eq!(err.variable, "POD_TOKEN");
        clear_all();
    }

    #[test]
    fn from_env_applies_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var("REPO_PATH", "/repo");
        std::env::set_var("POD_TOKEN", "secret");
        let cfg = CageConfig::from_env().unwrap();
        assert_eq!(cfg.repo_path, PathBuf::from("/repo"));
        assert_eq!(cfg.lock_default_ttl_s, 300);
        assert_eq!(cfg.run_max_concurrent, 16);
        assert_eq!(cfg.run_default_timeout_s, 1200);
        assert_eq!(cfg.retry.max_attempts, 5);
        clear_all();
    }

    #[test]
    fn from_env_overrides_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var("REPO_PATH", "/repo");
        std::env::set_var("POD_TOKEN", "secret");
        std::env::set_var("LOCK_DEFAULT_TTL_S", "60");
        std::env::set_var("RUN_MAX_CONCURRENT", "4");
        let cfg = CageConfig::from_env().unwrap();
        assert_eq!(cfg.lock_default_ttl_s, 60);
        assert_eq!(cfg.run_max_concurrent, 4);
        clear_all();
    }

    #[test]
    fn from_env_rejects_unparseable_numeric() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        std::env::set_var("REPO_PATH", "/repo");
        std::env::set_var("POD_TOKEN", "secret");
        std::env::set_var("RUN_MAX_CONCURRENT", "not-a-number");
        let err = CageConfig::from_env().unwrap_err();
        assert_eq!(err.variable, "RUN_MAX_CONCURRENT");
        clear_all();
    }

    #[test]
    fn new_uses_defaults() {
        let cfg = CageConfig::new(PathBuf::from("/repo"), "tok");
        assert_eq!(cfg.run_default_timeout_s, 1200);
    }
}
