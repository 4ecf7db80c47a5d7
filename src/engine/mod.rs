// src/engine/mod.rs

//! Reconciler for a single run.
//!
//! This module ties together:
//! - the authoritative execution store (what the cluster reported)
//! - the per-tick `RunFacts` snapshot and the decisions derived from it
//! - the runtime event loop that reacts to:
//!   - task-run completions
//!   - condition-check completions
//!   - cancellation requests
//!   - periodic resyncs and shutdown signals
//!
//! The pure reconciler lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::collections::BTreeMap;

use serde::Serialize;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Terminal outcome reported for a task execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRunOutcome {
    Succeeded { results: BTreeMap<String, String> },
    Failed { message: String },
    Cancelled,
}

/// Events flowing into the runtime from launchers, signals and timers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// An execution reached a terminal status.
    TaskRunCompleted {
        task: TaskName,
        outcome: TaskRunOutcome,
    },
    /// A condition check finished.
    ConditionCheckCompleted {
        task: TaskName,
        check: String,
        succeeded: bool,
    },
    /// The run as a whole should be cancelled.
    CancelRequested,
    /// Periodic re-tick without an observed change.
    Resync,
    /// Stop the runtime without finishing the run (second Ctrl-C).
    ShutdownRequested,
}

/// A condition check to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionCheckLaunch {
    pub name: String,
    pub condition_name: String,
}

/// What the launcher has to create for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LaunchKind {
    /// Create the task's pending condition checks.
    ConditionChecks(Vec<ConditionCheckLaunch>),
    /// Create (attempt 0) or recreate (attempt n > 0) the task's execution.
    TaskRun { attempt: u32 },
}

/// Request handed to the launcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchRequest {
    pub task: TaskName,
    pub task_run_name: String,
    pub kind: LaunchKind,
}

pub mod core;
pub mod runtime;
pub mod store;

pub use self::core::{CoreCommand, CoreStep, Reconciler, RunReport, TickPlan};
pub use runtime::Runtime;
pub use store::ExecutionStore;
