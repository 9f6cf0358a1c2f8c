//! Crew Orchestrator (C7): drives a registered crew's agents through the
//! planner/implementer/reviewer/committer workflow for one run (spec.md
//! §4.7).
//!
//! The orchestrator never edits files itself. Planner, Implementer and
//! Reviewer are external agents reached through an [`AgentInvoker`]; the
//! Implementer is expected to make its changes through the gateway's editor
//! tool (C3) during its own invocation, not through anything the
//! orchestrator calls directly. Only the Committer phase is mechanical:
//! composing a commit message and calling the Git Bridge (C5) is judgment-free
//! enough that the orchestrator does it inline rather than delegating to an
//! agent.
//!
//! Run state transitions are persisted to the Run Store (C6) *before* the
//! work of a phase begins: a crash mid-phase leaves a `status.json` whose
//! `logs` show exactly how far the run got, rather than a run stuck
//! silently in `running` forever.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::bridge::GitBridge;
use crate::config::RetryPolicy;
use crate::error::CageError;
use crate::model::ids::{AgentId, CrewId, RunId, TaskId};
use crate::model::run::{Agent, AgentRole, Crew, Run, RunStatus, RunStrategy, TaskSpec};
use crate::runstore::RunStore;

// ---------------------------------------------------------------------------
// Agent invocation boundary
// ---------------------------------------------------------------------------

/// What an agent is asked to do for one phase of one run.
#[derive(Clone, Debug, Serialize)]
pub struct AgentInvocation {
    pub run_id: RunId,
    pub task: TaskSpec,
    pub role: AgentRole,
    pub agent: Agent,
    /// Role-specific context (the plan for Implementer/Reviewer, findings
    /// history for a retried Implementer, etc).
    pub context: serde_json::Value,
}

/// The boundary between the orchestrator and whatever actually runs an
/// agent (an LLM-backed process, a subprocess, a test double). Object-safe
/// so callers can hold `Arc<dyn AgentInvoker + Send + Sync>`.
///
/// Implementations are expected to surface `CageError::LockConflict` or
/// `CageError::StalePreimage` when the agent's own editor-tool calls hit
/// those conditions, so the orchestrator's retry loop can tell a
/// contention failure apart from a genuine agent failure.
#[async_trait]
pub trait AgentInvoker {
    async fn invoke(&self, invocation: AgentInvocation) -> Result<serde_json::Value, CageError>;
}

/// A deterministic [`AgentInvoker`] for tests and for crews that don't need
/// a real backend yet. Every role returns a fixed, trivially-successful
/// response.
#[derive(Default)]
pub struct NullAgentInvoker;

#[async_trait]
impl AgentInvoker for NullAgentInvoker {
    async fn invoke(&self, invocation: AgentInvocation) -> Result<serde_json::Value, CageError> {
        let response = match invocation.role {
            AgentRole::Planner => serde_json::json!({
                "steps": ["complete the task as described"],
                "notes": "",
            }),
            AgentRole::Implementer => serde_json::json!({ "files_changed": [] }),
            AgentRole::Reviewer => serde_json::json!({ "passed": true, "findings": [] }),
            AgentRole::Committer => serde_json::json!({}),
        };
        Ok(response)
    }
}

// ---------------------------------------------------------------------------
// Phase artefacts
// ---------------------------------------------------------------------------

/// Persisted as `plan.json` after the Planner phase.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanArtifact {
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

/// The Reviewer's verdict, persisted as `review.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReviewArtifact {
    pub passed: bool,
    #[serde(default)]
    pub findings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

/// In-memory agent and crew registries. Lost on restart, same as the Lock
/// Manager (spec.md §4.7 treats agents/crews as process-local configuration,
/// not durable records).
#[derive(Default)]
struct Registries {
    agents: Mutex<HashMap<AgentId, Agent>>,
    crews: Mutex<HashMap<CrewId, Crew>>,
}

// ---------------------------------------------------------------------------
// CrewOrchestrator
// ---------------------------------------------------------------------------

/// The Crew Orchestrator: owns the agent/crew registries and drives runs.
pub struct CrewOrchestrator {
    registries: Registries,
    run_store: Arc<RunStore>,
    task_store: Arc<crate::taskstore::TaskStore>,
    bridge: Arc<GitBridge>,
    invoker: Arc<dyn AgentInvoker + Send + Sync>,
    retry: RetryPolicy,
    semaphore: Arc<Semaphore>,
}

impl CrewOrchestrator {
    /// Build an orchestrator sharing `run_store`, `task_store` and `bridge`
    /// with the rest of the process, invoking agents through `invoker`,
    /// bounding concurrent runs to `max_concurrent`.
    #[must_use]
    pub fn new(
        run_store: Arc<RunStore>,
        task_store: Arc<crate::taskstore::TaskStore>,
        bridge: Arc<GitBridge>,
        invoker: Arc<dyn AgentInvoker + Send + Sync>,
        retry: RetryPolicy,
        max_concurrent: usize,
    ) -> Self {
        Self {
            registries: Registries::default(),
            run_store,
            task_store,
            bridge,
            invoker,
            retry,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    // -- Agent registry ------------------------------------------------

    /// Register (or overwrite) an agent definition.
    pub fn register_agent(&self, agent: Agent) {
        let mut agents = self.registries.agents.lock().unwrap_or_else(|e| e.into_inner());
        agents.insert(agent.id.clone(), agent);
    }

    /// Look up a registered agent.
    ///
    /// # Errors
    /// `NotRegistered` if no agent with this id exists.
    pub fn get_agent(&self, id: &AgentId) -> Result<Agent, CageError> {
        let agents = self.registries.agents.lock().unwrap_or_else(|e| e.into_inner());
        agents.get(id).cloned().ok_or_else(|| CageError::NotRegistered {
            kind: "agent",
            id: id.to_string(),
        })
    }

    /// List every registered agent, sorted by id.
    #[must_use]
    pub fn list_agents(&self) -> Vec<Agent> {
        let agents = self.registries.agents.lock().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<Agent> = agents.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    // -- Crew registry ---------------------------------------------------

    /// Register (or overwrite) a crew definition.
    ///
    /// # Errors
    /// `InvalidCrew` if `roles` is empty or names an unregistered agent.
    pub fn register_crew(&self, crew: Crew) -> Result<(), CageError> {
        if crew.roles.is_empty() {
            return Err(CageError::InvalidCrew {
                reason: "a crew must assign at least one role".to_owned(),
            });
        }
        let agents = self.registries.agents.lock().unwrap_or_else(|e| e.into_inner());
        for (role, agent_id) in &crew.roles {
            if !agents.contains_key(agent_id) {
                return Err(CageError::InvalidCrew {
                    reason: format!("role '{role}' names unregistered agent '{agent_id}'"),
                });
            }
        }
        drop(agents);
        let mut crews = self.registries.crews.lock().unwrap_or_else(|e| e.into_inner());
        crews.insert(crew.id.clone(), crew);
        Ok(())
    }

    /// Look up a registered crew.
    ///
    /// # Errors
    /// `NotRegistered` if no crew with this id exists.
    pub fn get_crew(&self, id: &CrewId) -> Result<Crew, CageError> {
        let crews = self.registries.crews.lock().unwrap_or_else(|e| e.into_inner());
        crews.get(id).cloned().ok_or_else(|| CageError::NotRegistered {
            kind: "crew",
            id: id.to_string(),
        })
    }

    /// List every registered crew, sorted by id.
    #[must_use]
    pub fn list_crews(&self) -> Vec<Crew> {
        let crews = self.registries.crews.lock().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<Crew> = crews.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    fn agent_for_role(&self, crew: &Crew, role: &str) -> Result<Agent, CageError> {
        let agent_id = crew.roles.get(role).ok_or_else(|| CageError::InvalidCrew {
            reason: format!("crew has no '{role}' role assigned"),
        })?;
        self.get_agent(agent_id)
    }

    // -- Run lifecycle -----------------------------------------------------

    /// Queue a new run of `crew_id` against `task`, and start driving it in
    /// the background. Returns immediately with the run's id while the run
    /// sits in `queued`.
    ///
    /// # Errors
    /// `NotRegistered` if the crew doesn't exist; `InvalidCrew` if the
    /// strategy requires a role the crew doesn't have.
    pub fn run_crew(
        self: &Arc<Self>,
        crew_id: CrewId,
        task_id: TaskId,
        task: TaskSpec,
        strategy: RunStrategy,
        timeout_s: u64,
    ) -> Result<RunId, CageError> {
        if task.acceptance.is_empty() {
            return Err(CageError::TaskSchemaViolation {
                id: task_id.to_string(),
                detail: "at least one acceptance criterion is required".to_owned(),
            });
        }
        let crew = self.get_crew(&crew_id)?;
        require_roles_for_strategy(&crew, strategy)?;

        let run = Run::queued(task_id, crew_id, strategy, timeout_s);
        let run_id = run.run_id;
        self.run_store.create(&run)?;

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.drive_run(run_id, task).await;
        });

        Ok(run_id)
    }

    /// Request cooperative cancellation of a run. Takes effect at the next
    /// phase boundary, not mid-phase.
    ///
    /// # Errors
    /// `RunNotFound` if the run doesn't exist; `RunTerminal` if it has
    /// already finished.
    pub fn cancel_run(&self, run_id: RunId) -> Result<(), CageError> {
        let mut run = self.run_store.get(run_id)?;
        if run.status.is_terminal() {
            return Err(CageError::RunTerminal {
                run_id: run_id.to_string(),
                status: format!("{:?}", run.status),
            });
        }
        run.cancel_requested = true;
        self.run_store.set_status(&run)
    }

    /// Fetch a single run's current state, including its logs.
    ///
    /// # Errors
    /// `RunNotFound` if the run doesn't exist.
    pub fn get_run(&self, run_id: RunId) -> Result<Run, CageError> {
        self.run_store.get(run_id)
    }

    /// List runs matching `filter`.
    ///
    /// # Errors
    /// Bubbles up any I/O error hit while scanning the run store.
    pub fn list_runs(&self, filter: &crate::runstore::RunFilter) -> Result<Vec<Run>, CageError> {
        self.run_store.list(filter)
    }

    /// Invoke a single registered agent directly, outside of any crew run
    /// (spec.md §4.8 `agent_invoke`). Not tracked in the run store: this is
    /// a one-shot call, not a multi-phase run.
    ///
    /// # Errors
    /// `NotRegistered` if the agent doesn't exist; whatever the invoker
    /// itself returns otherwise.
    pub async fn invoke_agent(
        &self,
        agent_id: &AgentId,
        task: TaskSpec,
        context: serde_json::Value,
    ) -> Result<serde_json::Value, CageError> {
        let agent = self.get_agent(agent_id)?;
        let role = agent.role;
        self.invoker
            .invoke(AgentInvocation {
                run_id: RunId::new(),
                task,
                role,
                agent,
                context,
            })
            .await
    }

    async fn drive_run(self: Arc<Self>, run_id: RunId, task: TaskSpec) {
        let _permit = self.semaphore.acquire().await;

        let Ok(mut run) = self.run_store.get(run_id) else {
            return;
        };
        run.status = RunStatus::Running;
        run.log("orchestrator", "run started");
        if self.run_store.set_status(&run).is_err() {
            return;
        }

        let timeout = Duration::from_secs(run.timeout_s.max(1));
        let outcome = tokio::time::timeout(timeout, self.execute_phases(run_id, &task)).await;

        let Ok(mut run) = self.run_store.get(run_id) else {
            return;
        };
        match outcome {
            Ok(Ok(())) => {
                run.log("orchestrator", "run succeeded");
                run.finish(RunStatus::Succeeded, None);
            }
            Ok(Err(CageError::Cancelled { .. })) => {
                run.log("orchestrator", "run cancelled");
                run.finish(RunStatus::Cancelled, Some("cancelled".to_owned()));
            }
            Ok(Err(e)) => {
                run.log("orchestrator", format!("run failed: {e}"));
                run.finish(RunStatus::Failed, Some(e.to_string()));
            }
            Err(_elapsed) => {
                run.log("orchestrator", "run timed out");
                run.finish(RunStatus::Failed, Some("timeout".to_owned()));
            }
        }
        let _ = self.run_store.set_status(&run);
    }

    /// Run the phases appropriate to `run.strategy` in order, returning as
    /// soon as any phase fails. Each phase checks `cancel_requested` before
    /// starting any work.
    async fn execute_phases(&self, run_id: RunId, task: &TaskSpec) -> Result<(), CageError> {
        let run = self.run_store.get(run_id)?;
        let crew = self.get_crew(&run.crew_id)?;

        self.check_cancelled(run_id)?;
        let plan = self.run_planner(run_id, &crew, task).await?;

        if run.strategy == RunStrategy::PlanOnly {
            return Ok(());
        }

        self.check_cancelled(run_id)?;
        self.run_implementer_with_retry(run_id, &crew, task, &plan).await?;

        self.check_cancelled(run_id)?;
        self.run_reviewer(run_id, &crew, task).await?;

        if run.strategy == RunStrategy::ImplThenVerifyAndCommit {
            self.check_cancelled(run_id)?;
            self.run_committer(run_id, &crew, task).await?;
        }

        Ok(())
    }

    fn check_cancelled(&self, run_id: RunId) -> Result<(), CageError> {
        let run = self.run_store.get(run_id)?;
        if run.cancel_requested {
            return Err(CageError::Cancelled {
                run_id: run_id.to_string(),
            });
        }
        Ok(())
    }

    async fn run_planner(
        &self,
        run_id: RunId,
        crew: &Crew,
        task: &TaskSpec,
    ) -> Result<PlanArtifact, CageError> {
        self.run_store.append_log(run_id, "plan", "invoking planner")?;
        let agent = self.agent_for_role(crew, "planner")?;
        let response = self
            .invoker
            .invoke(AgentInvocation {
                run_id,
                task: task.clone(),
                role: AgentRole::Planner,
                agent,
                context: serde_json::Value::Null,
            })
            .await?;
        let plan: PlanArtifact = serde_json::from_value(response)
            .map_err(|e| CageError::Internal(format!("planner returned malformed output: {e}")))?;
        let bytes = serde_json::to_vec_pretty(&plan)
            .map_err(|e| CageError::Internal(format!("failed to serialize plan: {e}")))?;
        self.run_store.write_phase_output(run_id, "plan.json", &bytes)?;
        self.run_store.append_log(run_id, "plan", "plan recorded")?;
        Ok(plan)
    }

    async fn run_implementer_with_retry(
        &self,
        run_id: RunId,
        crew: &Crew,
        task: &TaskSpec,
        plan: &PlanArtifact,
    ) -> Result<(), CageError> {
        let agent = self.agent_for_role(crew, "implementer")?;
        let context = serde_json::json!({ "plan": plan });

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.run_store.append_log(
                run_id,
                "implement",
                format!("invoking implementer (attempt {attempt})"),
            )?;

            let result = self
                .invoker
                .invoke(AgentInvocation {
                    run_id,
                    task: task.clone(),
                    role: AgentRole::Implementer,
                    agent: agent.clone(),
                    context: context.clone(),
                })
                .await;

            match result {
                Ok(_response) => {
                    self.run_store.append_log(run_id, "implement", "implementer finished")?;
                    return Ok(());
                }
                Err(e @ (CageError::LockConflict { .. } | CageError::StalePreimage { .. }))
                    if attempt < self.retry.max_attempts =>
                {
                    let delay = backoff_delay(&self.retry, attempt);
                    self.run_store.append_log(
                        run_id,
                        "implement",
                        format!("retryable failure ({e}), retrying in {delay:?}"),
                    )?;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    self.run_store
                        .append_log(run_id, "implement", format!("implementer failed: {e}"))?;
                    return Err(e);
                }
            }
        }
    }

    async fn run_reviewer(&self, run_id: RunId, crew: &Crew, task: &TaskSpec) -> Result<(), CageError> {
        self.run_store.append_log(run_id, "review", "invoking reviewer")?;
        let agent = self.agent_for_role(crew, "reviewer")?;
        let response = self
            .invoker
            .invoke(AgentInvocation {
                run_id,
                task: task.clone(),
                role: AgentRole::Reviewer,
                agent,
                context: serde_json::Value::Null,
            })
            .await?;
        let review: ReviewArtifact = serde_json::from_value(response)
            .map_err(|e| CageError::Internal(format!("reviewer returned malformed output: {e}")))?;
        let bytes = serde_json::to_vec_pretty(&review)
            .map_err(|e| CageError::Internal(format!("failed to serialize review: {e}")))?;
        self.run_store.write_phase_output(run_id, "review.json", &bytes)?;

        if !review.passed {
            self.run_store
                .append_log(run_id, "review", "reviewer rejected the implementation")?;
            return Err(CageError::ReviewerRejected {
                findings: review.findings,
            });
        }
        self.run_store.append_log(run_id, "review", "reviewer passed")?;
        Ok(())
    }

    async fn run_committer(&self, run_id: RunId, crew: &Crew, task: &TaskSpec) -> Result<(), CageError> {
        if !crew.has_committer() {
            return Err(CageError::InvalidCrew {
                reason: "strategy requires a committer but the crew has none".to_owned(),
            });
        }
        self.run_store.append_log(run_id, "commit", "committing changes")?;

        let message = task.title.clone();
        let author = self.agent_for_role(crew, "committer")?.name;
        let meta = self.bridge.commit(&message, &author, &[])?;

        self.run_store.append_log(
            run_id,
            "commit",
            format!("committed {} ({} files changed)", meta.sha, meta.files_changed.len()),
        )?;

        let run = self.run_store.get(run_id)?;
        self.task_store.append_commit(&run.task_id, meta)?;
        Ok(())
    }
}

/// Which roles a strategy needs present in the crew before a run starts,
/// so a missing role fails fast at `run_crew` rather than mid-run.
fn require_roles_for_strategy(crew: &Crew, strategy: RunStrategy) -> Result<(), CageError> {
    let required: &[&str] = match strategy {
        RunStrategy::PlanOnly => &["planner"],
        RunStrategy::ImplThenVerify => &["planner", "implementer", "reviewer"],
        RunStrategy::ImplThenVerifyAndCommit => {
            &["planner", "implementer", "reviewer", "committer"]
        }
    };
    for role in required {
        if !crew.roles.contains_key(*role) {
            return Err(CageError::InvalidCrew {
                reason: format!("strategy requires a '{role}' role but the crew has none"),
            });
        }
    }
    Ok(())
}

/// Exponential backoff with a cap, per spec.md §4.7. No jitter source is
/// wired in yet (`SPEC_FULL.md` open question — see `DESIGN.md`); the delay
/// is deterministic given `attempt`.
fn backoff_delay(retry: &RetryPolicy, attempt: u32) -> Duration {
    let exp = retry.base_ms.saturating_mul(1u64 << attempt.min(16).saturating_sub(1));
    Duration::from_millis(exp.min(retry.cap_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::{AgentId, CrewId, TaskId};
    use crate::model::run::AgentRole;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn planner_agent() -> Agent {
        Agent {
            id: AgentId::new("planner-1").unwrap(),
            name: "Planner One".to_owned(),
            role: AgentRole::Planner,
            config: serde_json::Value::Null,
        }
    }

    fn make_crew(roles: &[(&str, &str)]) -> Crew {
        let mut map = BTreeMap::new();
        for (role, agent) in roles {
            map.insert((*role).to_owned(), AgentId::new(agent).unwrap());
        }
        Crew {
            id: CrewId::new("crew-a").unwrap(),
            name: "Alpha".to_owned(),
            roles: map,
            labels: vec![],
        }
    }

    fn orchestrator() -> (Arc<CrewOrchestrator>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let run_store = Arc::new(RunStore::open(dir.path()).unwrap());
        std::process::Command::new("git")
            .arg("init")
            .arg("-q")
            .arg(dir.path())
            .status()
            .unwrap();
        let bridge = Arc::new(GitBridge::open(dir.path()).unwrap());
        let task_store = Arc::new(crate::taskstore::TaskStore::open(dir.path()).unwrap());
        let orch = Arc::new(CrewOrchestrator::new(
            run_store,
            task_store,
            bridge,
            Arc::new(NullAgentInvoker),
            RetryPolicy {
                max_attempts: 3,
                base_ms: 1,
                cap_ms: 10,
            },
            4,
        ));
        (orch, dir)
    }

    #[test]
    fn register_crew_rejects_unregistered_agent() {
        let (orch, _dir) = orchestrator();
        let crew = make_crew(&[("planner", "ghost")]);
        let err = orch.register_crew(crew).unwrap_err();
        assert!(matches!(err, CageError::InvalidCrew { .. }));
    }

    #[test]
    fn register_crew_succeeds_with_known_agents() {
        let (orch, _dir) = orchestrator();
        orch.register_agent(planner_agent());
        let crew = make_crew(&[("planner", "planner-1")]);
        orch.register_crew(crew.clone()).unwrap();
        assert_eq!(orch.get_crew(&crew.id).unwrap().id, crew.id);
    }

    #[test]
    fn require_roles_rejects_missing_committer() {
        let crew = make_crew(&[("planner", "a"), ("implementer", "b"), ("reviewer", "c")]);
        let err = require_roles_for_strategy(&crew, RunStrategy::ImplThenVerifyAndCommit)
            .unwrap_err();
        assert!(matches!(err, CageError::InvalidCrew { .. }));
    }

    #[test]
    fn require_roles_plan_only_needs_just_planner() {
        let crew = make_crew(&[("planner", "a")]);
        require_roles_for_strategy(&crew, RunStrategy::PlanOnly).unwrap();
    }

    #[test]
    fn backoff_delay_grows_then_caps() {
        let retry = RetryPolicy {
            max_attempts: 5,
            base_ms: 100,
            cap_ms: 500,
        };
        assert_eq!(backoff_delay(&retry, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(&retry, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(&retry, 3), Duration::from_millis(400));
        assert_eq!(backoff_delay(&retry, 4), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn plan_only_run_succeeds_without_committer() {
        let (orch, _dir) = orchestrator();
        orch.register_agent(planner_agent());
        let crew = make_crew(&[("planner", "planner-1")]);
        orch.register_crew(crew.clone()).unwrap();

        let task_id = TaskId::new("2025-01-01-demo").unwrap();
        let task = TaskSpec {
            title: "Demo task".to_owned(),
            description: "do the thing".to_owned(),
            acceptance: vec!["it works".to_owned()],
        };
        let run_id = orch
            .run_crew(crew.id, task_id, task, RunStrategy::PlanOnly, 30)
            .unwrap();

        for _ in 0..50 {
            let run = orch.run_store.get(run_id).unwrap();
            if run.status.is_terminal() {
                assert_eq!(run.status, RunStatus::Succeeded);
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("run did not reach a terminal state in time");
    }

    #[test]
    fn cancel_unknown_run_is_not_found() {
        let (orch, _dir) = orchestrator();
        let err = orch.cancel_run(RunId::new()).unwrap_err();
        assert!(matches!(err, CageError::RunNotFound { .. }));
    }

    #[test]
    fn run_crew_with_empty_acceptance_is_rejected() {
        let (orch, _dir) = orchestrator();
        orch.register_agent(planner_agent());
        let crew = make_crew(&[("planner", "planner-1")]);
        orch.register_crew(crew.clone()).unwrap();

        let task_id = TaskId::new("2025-01-01-no-acceptance").unwrap();
        let task = TaskSpec {
            title: "Demo task".to_owned(),
            description: "do the thing".to_owned(),
            acceptance: vec![],
        };
        let err = orch
            .run_crew(crew.id, task_id, task, RunStrategy::PlanOnly, 30)
            .unwrap_err();
        assert!(matches!(err, CageError::TaskSchemaViolation { .. }));
        assert_eq!(err.rpc_code(), -32602);
    }
}
