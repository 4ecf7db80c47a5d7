// src/state/execution.rs

//! Read-only snapshots of task executions and condition checks.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::model::ObservedTaskRun;
use crate::types::{ConditionStatus, ObservedStatus};

/// Reason reported by an execution that was cancelled.
pub const TASK_RUN_REASON_CANCELLED: &str = "TaskRunCancelled";

/// Terminal-status block of an execution.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TaskRunStatus {
    pub succeeded: ConditionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Length of the retry history: how many earlier attempts failed.
    pub retries_used: u32,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub results: BTreeMap<String, String>,
}

/// Snapshot of a launched execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRun {
    pub name: String,
    /// Explicit cancel signal set on the execution.
    pub cancel_requested: bool,
    pub status: TaskRunStatus,
}

impl TaskRun {
    /// A freshly launched execution with an unknown terminal status.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cancel_requested: false,
            status: TaskRunStatus::default(),
        }
    }

    /// Snapshot of an observed execution; `None` if the task has not been
    /// started.
    pub fn from_observed(name: impl Into<String>, observed: &ObservedTaskRun) -> Option<Self> {
        let observed_status = observed.status?;
        let succeeded = match observed_status {
            ObservedStatus::Running => ConditionStatus::Unknown,
            ObservedStatus::Succeeded => ConditionStatus::True,
            ObservedStatus::Failed | ObservedStatus::Cancelled => ConditionStatus::False,
        };
        let reason = match (observed_status, observed.reason.as_ref()) {
            (_, Some(reason)) => Some(reason.clone()),
            (ObservedStatus::Cancelled, None) => Some(TASK_RUN_REASON_CANCELLED.to_string()),
            _ => None,
        };

        Some(Self {
            name: name.into(),
            cancel_requested: observed.cancelled,
            status: TaskRunStatus {
                succeeded,
                reason,
                message: None,
                retries_used: observed.retries_used,
                results: observed.results.clone(),
            },
        })
    }

    pub fn succeeded(&self) -> ConditionStatus {
        self.status.succeeded
    }

    pub fn retries_used(&self) -> u32 {
        self.status.retries_used
    }

    /// Finished unsuccessfully because of a cancel signal.
    pub fn is_cancelled(&self) -> bool {
        self.status.succeeded.is_false()
            && (self.cancel_requested
                || self.status.reason.as_deref() == Some(TASK_RUN_REASON_CANCELLED))
    }
}

/// One condition-check result for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionCheck {
    /// Name of the check execution.
    pub name: String,
    /// Name of the declared condition it evaluates.
    pub condition_name: String,
    /// `None` until the check execution has been created.
    pub status: Option<ConditionStatus>,
}

impl ConditionCheck {
    pub fn is_done(&self) -> bool {
        matches!(
            self.status,
            Some(ConditionStatus::True) | Some(ConditionStatus::False)
        )
    }

    pub fn is_successful(&self) -> bool {
        self.status == Some(ConditionStatus::True)
    }

    pub fn is_failed(&self) -> bool {
        self.status == Some(ConditionStatus::False)
    }
}

/// The condition checks of a single task.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ConditionChecks(pub Vec<ConditionCheck>);

impl ConditionChecks {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConditionCheck> {
        self.0.iter()
    }

    /// All checks finished (vacuously true without checks).
    pub fn is_done(&self) -> bool {
        self.0.iter().all(ConditionCheck::is_done)
    }

    /// All checks succeeded (vacuously true without checks).
    pub fn is_success(&self) -> bool {
        self.0.iter().all(ConditionCheck::is_successful)
    }

    /// Some finished check reported failure.
    pub fn has_failed(&self) -> bool {
        self.0.iter().any(ConditionCheck::is_failed)
    }

    /// Checks whose execution has not been created yet.
    pub fn not_created(&self) -> impl Iterator<Item = &ConditionCheck> {
        self.0.iter().filter(|c| c.status.is_none())
    }
}
