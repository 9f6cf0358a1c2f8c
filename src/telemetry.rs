//! Structured logging initialization.
//!
//! Cage emits one JSON object per line to stderr, with fields matching
//! spec.md §6 (`ts, level, service, request_id, run_id?, task_id?, path?,
//! msg`). Log level is controlled by `RUST_LOG`, falling back to
//! `CAGE_LOG`, defaulting to `info` when neither is set.
//!
//! There is no distributed-tracing/OTLP export here: the gateway is a
//! single-process service with no downstream trace collector to export to.
//! Callers that need request correlation pass `request_id` explicitly as a
//! structured field on each event (see [`crate::gateway`]).

use tracing_subscriber::EnvFilter;

/// Opaque guard returned by [`init`]; holding it alive for the process
/// lifetime is a no-op today, but keeps the call site future-proof if a
/// flushable exporter is added later.
pub struct TelemetryGuard(());

/// Initialize the global `tracing` subscriber for JSON-lines logging to
/// stderr. Must be called once, near the start of `main`.
pub fn init() -> TelemetryGuard {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(std::env::var("CAGE_LOG").unwrap_or_default()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .json()
        .flatten_event(true)
        .with_current_span(false)
        .with_span_list(false)
        .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    TelemetryGuard(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_does_not_panic_when_called_once() {
        // `try_init` swallows the "already set" error on repeat test runs
        // within the same process, so this is safe to call unconditionally.
        let _guard = init();
    }
}
