// src/state/condition.rs

//! Run-level `Succeeded` condition.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::config::duration::format_duration;
use crate::types::ConditionStatus;

/// Reason attached to the run condition.
///
/// The string forms are part of the status-reporting contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RunReason {
    /// Every task succeeded.
    Succeeded,
    /// Every task succeeded or was skipped, and at least one was skipped.
    Completed,
    /// At least one task failed.
    Failed,
    /// At least one task was cancelled and none failed.
    Cancelled,
    #[serde(rename = "PipelineRunTimedOut")]
    TimedOut,
    /// Draining in-flight tasks before reporting a failure.
    #[serde(rename = "PipelineRunStopping")]
    Stopping,
    #[serde(rename = "PipelineRunRunning")]
    Running,
}

impl RunReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "Succeeded",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
            Self::TimedOut => "PipelineRunTimedOut",
            Self::Stopping => "PipelineRunStopping",
            Self::Running => "PipelineRunRunning",
        }
    }
}

impl fmt::Display for RunReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition type; runs only carry `Succeeded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConditionType {
    Succeeded,
}

/// The aggregate run condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionType,
    pub status: ConditionStatus,
    pub reason: RunReason,
    pub message: String,
}

impl Condition {
    pub fn new(status: ConditionStatus, reason: RunReason, message: impl Into<String>) -> Self {
        Self {
            kind: ConditionType::Succeeded,
            status,
            reason,
            message: message.into(),
        }
    }

    /// The run has finished (successfully or not).
    pub fn is_terminal(&self) -> bool {
        !self.status.is_unknown()
    }
}

/// Run-level metadata needed to derive the condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRunMeta {
    pub name: String,
    /// `None` or zero means no timeout.
    pub timeout: Option<Duration>,
    pub elapsed: Duration,
}

impl PipelineRunMeta {
    pub fn new(name: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            name: name.into(),
            timeout,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        match self.timeout {
            Some(timeout) if !timeout.is_zero() => self.elapsed > timeout,
            _ => false,
        }
    }

    pub(crate) fn timed_out_condition(&self) -> Condition {
        let timeout = self.timeout.map(format_duration).unwrap_or_default();
        Condition::new(
            ConditionStatus::False,
            RunReason::TimedOut,
            format!(
                "PipelineRun {:?} failed to finish within {:?}",
                self.name, timeout
            ),
        )
    }
}
