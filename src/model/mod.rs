//! Cage data model — core types shared across every subsystem.

pub mod ids;
pub mod lock;
pub mod operation;
pub mod run;
pub mod task;

pub use ids::{AgentId, CrewId, LockId, RunId, TaskId, ValidationError};
pub use lock::{FileLock, LineRange};
pub use operation::{
    EditPayload, EditorErrorKind, FileOperation, FileOperationResult, OpKind, ReadPayload,
    Selector,
};
pub use run::{Agent, AgentRole, Crew, Run, RunLogEntry, RunStatus, RunStrategy, TaskSpec};
pub use task::{
    AcceptanceCheck, ChangelogEntry, CommitMeta, PromptRecord, Provenance, Task, TaskStatus,
    TodoItem, TodoStatus, TASK_SCHEMA_VERSION,
};
