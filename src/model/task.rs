//! The Task record and its append-only provenance trail (C4).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{LockId, TaskId};

/// Current schema version written by this build. Bumped when the on-disk
/// task shape changes in a way older readers can't ignore.
pub const TASK_SCHEMA_VERSION: u32 = 1;

/// A task's lifecycle status (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Planned,
    InProgress,
    Blocked,
    Review,
    Done,
    Abandoned,
}

/// The status of a single todo-list entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TodoStatus {
    NotStarted,
    InProgress,
    Done,
    Blocked,
    Failed,
}

/// One item in a task's todo list; `progress_percent` (I1) is derived from
/// the fraction of these with `status = done`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TodoItem {
    pub text: String,
    pub status: TodoStatus,
    #[serde(default)]
    pub date_started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_stopped: Option<DateTime<Utc>>,
}

/// A single success-criterion or acceptance-check line item.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AcceptanceCheck {
    pub text: String,
    pub checked: bool,
}

/// One append-only changelog entry, written by the Editor Tool or directly
/// through the Task Store API.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    #[serde(default)]
    pub lock_id: Option<LockId>,
}

/// One recorded commit, appended to `Provenance.commits` by the Git Bridge
/// after a successful `commit` (spec.md §4.5).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommitMeta {
    pub sha: String,
    pub title: String,
    pub files_changed: Vec<String>,
    pub insertions: u64,
    pub deletions: u64,
    pub timestamp: DateTime<Utc>,
}

/// The subset of a task record attributable to work done under that task:
/// commits, artefact paths and indexed content hashes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(default)]
    pub commits: Vec<CommitMeta>,
    #[serde(default)]
    pub artefacts: BTreeSet<String>,
    #[serde(default)]
    pub blobs_indexed: BTreeSet<String>,
}

/// A single inbound request recorded for audit, as received by the task
/// (e.g. a gateway tool call or an editor operation's `intent`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PromptRecord {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

/// A persisted task record — the unit of work orchestrated by Cage.
///
/// Created on first write via the Task Store; mutated only through its
/// APIs; never destroyed implicitly. See spec.md §3 for invariants I1-I5,
/// enforced by [`Task::recompute_progress`] and the Task Store's `update`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub id: TaskId,
    pub title: String,
    pub owner: String,
    pub status: TaskStatus,
    pub progress_percent: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub success_criteria: Vec<AcceptanceCheck>,
    #[serde(default)]
    pub acceptance_checks: Vec<AcceptanceCheck>,
    #[serde(default)]
    pub subtasks: Vec<String>,
    #[serde(default)]
    pub todo: Vec<TodoItem>,
    #[serde(default)]
    pub changelog: Vec<ChangelogEntry>,
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub lessons_learned: Vec<String>,
    #[serde(default)]
    pub issues_risks: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub prompts: Vec<PromptRecord>,
    #[serde(default)]
    pub locks: Vec<LockId>,
    #[serde(default)]
    pub provenance: Provenance,
}

fn default_schema_version() -> u32 {
    TASK_SCHEMA_VERSION
}

impl Task {
    /// Create a brand-new task in the `planned` state.
    #[must_use]
    pub fn new(id: TaskId, title: impl Into<String>, owner: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            schema_version: TASK_SCHEMA_VERSION,
            id,
            title: title.into(),
            owner: owner.into(),
            status: TaskStatus::Planned,
            progress_percent: 0,
            created_at: now,
            updated_at: now,
            summary: String::new(),
            tags: Vec::new(),
            success_criteria: Vec::new(),
            acceptance_checks: Vec::new(),
            subtasks: Vec::new(),
            todo: Vec::new(),
            changelog: Vec::new(),
            decisions: Vec::new(),
            lessons_learned: Vec::new(),
            issues_risks: Vec::new(),
            next_steps: Vec::new(),
            references: Vec::new(),
            prompts: Vec::new(),
            locks: Vec::new(),
            provenance: Provenance::default(),
        }
    }

    /// Recompute `progress_percent` from `todo` (I1). A no-op when `todo`
    /// is empty — the field then reflects whatever was last recorded.
    pub fn recompute_progress(&mut self) {
        if self.todo.is_empty() {
            return;
        }
        let done = self
            .todo
            .iter()
            .filter(|t| matches!(t.status, TodoStatus::Done))
            .count();
        #[allow(clippy::cast_precision_loss)]
        let pct = (100.0 * done as f64 / self.todo.len() as f64).round();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            self.progress_percent = pct as u8;
        }
    }

    /// Whether this task may transition to `done` right now (I2): every
    /// success criterion is checked, or there are none.
    #[must_use]
    pub fn satisfies_done_gate(&self) -> bool {
        self.success_criteria.iter().all(|c| c.checked)
    }

    /// Append a changelog entry and bump `updated_at` (I3, I4).
    pub fn append_changelog(&mut self, text: impl Into<String>, lock_id: Option<LockId>) {
        self.changelog.push(ChangelogEntry {
            timestamp: Utc::now(),
            text: text.into(),
            lock_id,
        });
        self.touch();
    }

    /// Append a commit record to provenance (I5) and bump `updated_at`.
    pub fn append_commit(&mut self, commit: CommitMeta) {
        self.provenance.commits.push(commit);
        self.touch();
    }

    fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            // Monotonic even if the wall clock hasn't visibly advanced (I3).
            self.updated_at + chrono::Duration::nanoseconds(1)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new(TaskId::new("2025-01-01-demo").unwrap(), "Demo", "alice")
    }

    #[test]
    fn new_task_is_planned_with_zero_progress() {
        let t = task();
        assert!(matches!(t.status, TaskStatus::Planned));
        assert_eq!(t.progress_percent, 0);
        assert_eq!(t.updated_at, t.created_at);
    }

    #[test]
    fn progress_percent_follows_todo_fraction() {
        let mut t = task();
        t.todo = vec![
            TodoItem {
                text: "a".into(),
                status: TodoStatus::Done,
                date_started: None,
                date_stopped: None,
            },
            TodoItem {
                text: "b".into(),
                status: TodoStatus::NotStarted,
                date_started: None,
                date_stopped: None,
            },
            TodoItem {
                text: "c".into(),
                status: TodoStatus::Done,
                date_started: None,
                date_stopped: None,
            },
        ];
        t.recompute_progress();
        assert_eq!(t.progress_percent, 67);
    }

    #[test]
    fn progress_percent_unchanged_when_todo_empty() {
        let mut t = task();
        t.progress_percent = 42;
        t.recompute_progress();
        assert_eq!(t.progress_percent, 42);
    }

    #[test]
    fn done_gate_requires_all_criteria_checked() {
        let mut t = task();
        t.success_criteria.push(AcceptanceCheck {
            text: "works".into(),
            checked: false,
        });
        assert!(!t.satisfies_done_gate());
        t.success_criteria[0].checked = true;
        assert!(t.satisfies_done_gate());
    }

    #[test]
    fn done_gate_vacuously_true_with_no_criteria() {
        assert!(task().satisfies_done_gate());
    }

    #[test]
    fn append_changelog_bumps_updated_at_and_is_monotone() {
        let mut t = task();
        let before = t.updated_at;
        t.append_changelog("did a thing", None);
        assert!(t.updated_at >= before);
        assert_eq!(t.changelog.len(), 1);
    }

    #[test]
    fn append_commit_is_append_only() {
        let mut t = task();
        t.append_commit(CommitMeta {
            sha: "abc123".into(),
            title: "Initial".into(),
            files_changed: vec!["a.rs".into()],
            insertions: 1,
            deletions: 0,
            timestamp: Utc::now(),
        });
        assert_eq!(t.provenance.commits.len(), 1);
    }
}
