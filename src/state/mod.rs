// src/state/mod.rs

//! Per-tick run state and the scheduling/status engine.
//!
//! Everything here is rebuilt from authoritative input on every
//! reconciliation tick and discarded afterwards:
//!
//! - [`execution`] holds read-only snapshots of task executions and
//!   condition-check results.
//! - [`resolved`] joins a declaration with its execution (`ResolvedTask`).
//! - [`run_state`] is the ordered collection of resolved tasks.
//! - [`facts`] combines the run state with the main and finally graphs and
//!   computes launch queues, skips and the aggregate condition.
//! - [`condition`] defines the run-level condition and its reasons.
//! - [`status`] defines the per-task status projection written back into
//!   the run's status block.

pub mod condition;
pub mod execution;
pub mod facts;
pub mod resolved;
pub mod run_state;
pub mod status;

use serde::Serialize;

pub use condition::{Condition, PipelineRunMeta, RunReason};
pub use execution::{ConditionCheck, ConditionChecks, TaskRun, TaskRunStatus};
pub use facts::RunFacts;
pub use resolved::ResolvedTask;
pub use run_state::RunState;
pub use status::{ConditionCheckStatus, PipelineRunTaskRunStatus, SkippedTask};

/// Outcome of a single task as seen by the scheduler.
///
/// Derived on demand from the current snapshot and never stored on the
/// task itself. `Skipped` is only produced by [`RunFacts::task_state`],
/// since skipping depends on the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    /// No execution exists yet.
    Unstarted,
    /// An execution exists and has not finished.
    Running,
    Successful,
    Cancelled,
    /// The execution failed. `retryable` is true while attempts remain.
    Failure { retryable: bool },
    /// A condition check failed, so the task itself must not run.
    ConditionCheckFailed,
    Skipped,
}

impl TaskState {
    /// The task will not be launched or relaunched again.
    pub fn is_done(self) -> bool {
        matches!(
            self,
            TaskState::Successful
                | TaskState::Cancelled
                | TaskState::Failure { retryable: false }
                | TaskState::ConditionCheckFailed
                | TaskState::Skipped
        )
    }
}

/// Why a task is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    ConditionCheckFailed,
    WhenExpressionsFalse,
    ParentSkipped,
    RunStopping,
}
