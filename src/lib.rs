//! `cage` — multi-agent repository orchestration core.
//!
//! External AI agents drive structured edits to a Git working tree through a
//! controlled gateway, with crews of role-specialized agents collaboratively
//! planning, implementing, reviewing and committing changes. The repository
//! working tree is the single source of truth; everything under `.cage/` is
//! rebuildable bookkeeping around it.
//!
//! # Crate layout
//!
//! - [`model`] — shared data types (task, run, lock, operation, crew/agent).
//! - [`selector`] — pure region/regex selector resolution (C1).
//! - [`lock`] — cooperative TTL-bounded range locks (C2).
//! - [`editor`] — structured file mutation with preimage checks (C3).
//! - [`taskstore`] — persisted task records with invariant enforcement (C4).
//! - [`bridge`] — commit/push/pull/merge porcelain over `cage-git` (C5).
//! - [`runstore`] — persisted crew run state, logs and artefacts (C6).
//! - [`orchestrator`] — the planner/implementer/reviewer/committer workflow (C7).
//! - [`gateway`] — the external MCP-style JSON-RPC surface (C8), behind the
//!   `gateway` feature.
//! - [`config`] — environment-driven service configuration.
//! - [`error`] — the unified [`error::CageError`] type.
//! - [`telemetry`] — structured logging initialization.

pub mod bridge;
pub mod config;
pub mod editor;
pub mod error;
pub mod lock;
pub mod model;
pub mod orchestrator;
pub mod runstore;
pub mod selector;
pub mod taskstore;
pub mod telemetry;

#[cfg(feature = "gateway")]
pub mod gateway;
