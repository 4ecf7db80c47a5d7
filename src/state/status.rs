// src/state/status.rs

//! Status projection persisted into the run's status block.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::state::execution::TaskRunStatus;
use crate::types::ConditionStatus;

/// Reason set on a task's status when its condition checks failed.
pub const REASON_CONDITION_CHECK_FAILED: &str = "ConditionCheckFailed";

/// Entry of the skipped-task list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTask {
    pub name: String,
}

/// Status of one condition check as reported in the run status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionCheckStatus {
    pub condition_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ConditionStatus>,
}

/// Status of one task execution as reported in the run status, keyed by
/// the execution's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineRunTaskRunStatus {
    pub pipeline_task_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskRunStatus>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub condition_checks: BTreeMap<String, ConditionCheckStatus>,
}
