//! Crew, agent and run types (C6, C7).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AgentId, CrewId, RunId, TaskId};

/// The role a single agent plays within a crew (spec.md §3, "Crew / Agent").
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Planner,
    Implementer,
    Reviewer,
    Committer,
}

impl AgentRole {
    /// All roles, in workflow order.
    #[must_use]
    pub const fn workflow_order() -> [Self; 4] {
        [Self::Planner, Self::Implementer, Self::Reviewer, Self::Committer]
    }
}

/// A registered agent: a named, role-typed, independently configured
/// participant a crew's `roles` map points at.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub role: AgentRole,
    #[serde(default)]
    pub config: serde_json::Value,
}

/// A named group of role assignments driven together by the orchestrator.
///
/// `roles` must be non-empty and every value must name a registered agent;
/// enforcement lives in the orchestrator/gateway boundary, not here. A crew
/// with no committer can still plan and implement but never reaches the
/// committing phase.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Crew {
    pub id: CrewId,
    pub name: String,
    pub roles: BTreeMap<String, AgentId>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Crew {
    /// Whether this crew has an agent assigned to the `committer` role.
    #[must_use]
    pub fn has_committer(&self) -> bool {
        self.roles.contains_key("committer")
    }
}

/// The input to a crew run — what the crew is being asked to do.
///
/// `acceptance` must be non-empty; callers (`CrewOrchestrator::run_crew`,
/// the gateway's `agent_invoke`) reject an empty list before queueing work.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskSpec {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub acceptance: Vec<String>,
}

/// The orchestration strategy a run follows (spec.md §4.7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStrategy {
    PlanOnly,
    ImplThenVerify,
    ImplThenVerifyAndCommit,
}

impl Default for RunStrategy {
    fn default() -> Self {
        Self::ImplThenVerifyAndCommit
    }
}

/// A run's lifecycle status. Terminal states (`succeeded`, `failed`,
/// `cancelled`) are final; a run reaches exactly one of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Whether this status is terminal (no further transitions allowed).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// One execution of a crew against a `TaskSpec`.
///
/// Stored under `.cage/runs/<run_id>/status.json`; mutated only by the
/// orchestrator. `logs` is append-only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Run {
    pub run_id: RunId,
    pub task_id: TaskId,
    pub crew_id: CrewId,
    pub strategy: RunStrategy,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub logs: Vec<RunLogEntry>,
    #[serde(default)]
    pub artefacts: BTreeSet<String>,
    #[serde(default)]
    pub cancel_requested: bool,
    /// Wall-clock timeout in seconds; exceeding it is a cancellation with
    /// terminal state `failed(error="timeout")`. Defaults per
    /// `RUN_DEFAULT_TIMEOUT_S` (1200s) when not set by the caller.
    pub timeout_s: u64,
}

impl Run {
    /// Start a new run in the `queued` state.
    #[must_use]
    pub fn queued(task_id: TaskId, crew_id: CrewId, strategy: RunStrategy, timeout_s: u64) -> Self {
        Self {
            run_id: RunId::new(),
            task_id,
            crew_id,
            strategy,
            status: RunStatus::Queued,
            started_at: Utc::now(),
            ended_at: None,
            error: None,
            logs: Vec::new(),
            artefacts: BTreeSet::new(),
            cancel_requested: false,
            timeout_s,
        }
    }

    /// Append a log entry; `logs` is append-only by convention.
    pub fn log(&mut self, phase: impl Into<String>, message: impl Into<String>) {
        self.logs.push(RunLogEntry {
            timestamp: Utc::now(),
            phase: phase.into(),
            message: message.into(),
        });
    }

    /// Transition to a terminal state, recording the end time and error.
    ///
    /// No-op if already terminal: terminal states are final.
    pub fn finish(&mut self, status: RunStatus, error: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.ended_at = Some(Utc::now());
        self.error = error;
    }
}

/// One append-only line in a run's `logs.jsonl`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub timestamp: DateTime<Utc>,
    pub phase: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (TaskId, CrewId) {
        (
            TaskId::new("2025-01-01-demo").unwrap(),
            CrewId::new("crew-a").unwrap(),
        )
    }

    #[test]
    fn new_run_is_queued() {
        let (t, c) = ids();
        let run = Run::queued(t, c, RunStrategy::ImplThenVerifyAndCommit, 1200);
        assert_eq!(run.status, RunStatus::Queued);
        assert!(!run.status.is_terminal());
    }

    #[test]
    fn finish_is_idempotent_once_terminal() {
        let (t, c) = ids();
        let mut run = Run::queued(t, c, RunStrategy::ImplThenVerifyAndCommit, 1200);
        run.finish(RunStatus::Succeeded, None);
        run.finish(RunStatus::Failed, Some("late error".to_owned()));
        assert_eq!(run.status, RunStatus::Succeeded);
        assert!(run.error.is_none());
    }

    #[test]
    fn log_appends() {
        let (t, c) = ids();
        let mut run = Run::queued(t, c, RunStrategy::PlanOnly, 1200);
        run.log("plan", "starting");
        run.log("plan", "done");
        assert_eq!(run.logs.len(), 2);
    }

    #[test]
    fn crew_requires_committer_for_commit_phase() {
        let mut roles = BTreeMap::new();
        roles.insert("planner".to_owned(), AgentId::new("planner-1").unwrap());
        let crew = Crew {
            id: CrewId::new("crew-a").unwrap(),
            name: "Alpha".to_owned(),
            roles,
            labels: vec![],
        };
        assert!(!crew.has_committer());
    }
}
