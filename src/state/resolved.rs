// src/state/resolved.rs

use crate::dag::PipelineTask;
use crate::state::TaskState;
use crate::state::execution::{ConditionChecks, TaskRun};
use crate::types::ConditionStatus;

/// A task declaration joined with its (possibly absent) execution and its
/// condition-check results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTask {
    pub task: PipelineTask,
    /// Name the execution has (or will have once launched).
    pub task_run_name: String,
    pub task_run: Option<TaskRun>,
    pub condition_checks: ConditionChecks,
}

impl ResolvedTask {
    pub fn new(task: PipelineTask, task_run_name: impl Into<String>) -> Self {
        Self {
            task,
            task_run_name: task_run_name.into(),
            task_run: None,
            condition_checks: ConditionChecks::default(),
        }
    }

    pub fn with_task_run(mut self, task_run: TaskRun) -> Self {
        self.task_run = Some(task_run);
        self
    }

    pub fn with_condition_checks(mut self, checks: ConditionChecks) -> Self {
        self.condition_checks = checks;
        self
    }

    pub fn name(&self) -> &str {
        &self.task.name
    }

    /// An execution has been created for this task.
    pub fn is_started(&self) -> bool {
        self.task_run.is_some()
    }

    /// State of this task on its own, ignoring the rest of the run.
    ///
    /// Never returns [`TaskState::Skipped`].
    pub fn execution_state(&self) -> TaskState {
        let Some(run) = self.task_run.as_ref() else {
            if self.condition_checks.has_failed() {
                return TaskState::ConditionCheckFailed;
            }
            return TaskState::Unstarted;
        };

        match run.succeeded() {
            ConditionStatus::Unknown => TaskState::Running,
            ConditionStatus::True => TaskState::Successful,
            ConditionStatus::False if run.is_cancelled() => TaskState::Cancelled,
            ConditionStatus::False if self.condition_checks.has_failed() => {
                TaskState::ConditionCheckFailed
            }
            ConditionStatus::False => TaskState::Failure {
                retryable: run.retries_used() < self.task.retries,
            },
        }
    }

    pub fn is_successful(&self) -> bool {
        self.execution_state() == TaskState::Successful
    }

    pub fn is_cancelled(&self) -> bool {
        self.execution_state() == TaskState::Cancelled
    }

    pub fn is_condition_check_failed(&self) -> bool {
        self.execution_state() == TaskState::ConditionCheckFailed
    }

    /// Failed with no retries left.
    pub fn is_failure(&self) -> bool {
        self.execution_state() == TaskState::Failure { retryable: false }
    }

    /// Failed, but the retry budget allows another attempt.
    pub fn is_retryable_failure(&self) -> bool {
        self.execution_state() == TaskState::Failure { retryable: true }
    }

    pub fn is_done(&self) -> bool {
        self.execution_state().is_done()
    }

    /// Result value produced by a successful execution.
    pub fn result(&self, name: &str) -> Option<&str> {
        self.task_run
            .as_ref()
            .and_then(|run| run.status.results.get(name))
            .map(String::as_str)
    }
}
