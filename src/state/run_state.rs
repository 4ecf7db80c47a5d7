// src/state/run_state.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::state::TaskState;
use crate::state::resolved::ResolvedTask;
use crate::state::status::{
    ConditionCheckStatus, PipelineRunTaskRunStatus, REASON_CONDITION_CHECK_FAILED,
};
use crate::types::ConditionStatus;

/// Resolved tasks of a run, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    tasks: Vec<ResolvedTask>,
}

impl RunState {
    pub fn new(tasks: Vec<ResolvedTask>) -> Self {
        Self { tasks }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedTask> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedTask> {
        self.tasks.iter().find(|t| t.name() == name)
    }

    /// Name → entry lookup.
    pub fn to_map(&self) -> HashMap<&str, &ResolvedTask> {
        self.tasks.iter().map(|t| (t.name(), t)).collect()
    }

    /// No task has an execution yet.
    pub fn is_before_first_task_run(&self) -> bool {
        self.tasks.iter().all(|t| t.task_run.is_none())
    }

    /// Of the `candidates`, the tasks to launch now: unstarted ones plus
    /// failures that still have retry budget.
    ///
    /// Cancelled tasks and tasks whose condition checks failed are never
    /// returned.
    pub fn next_tasks(&self, candidates: &BTreeSet<String>) -> Vec<&ResolvedTask> {
        self.tasks
            .iter()
            .filter(|t| candidates.contains(t.name()))
            .filter(|t| {
                matches!(
                    t.execution_state(),
                    TaskState::Unstarted | TaskState::Failure { retryable: true }
                )
            })
            .collect()
    }

    /// Per-execution status projection for the run's status block.
    ///
    /// Tasks with neither an execution nor condition checks are left out.
    pub fn task_runs_status(&self, run_name: &str) -> BTreeMap<String, PipelineRunTaskRunStatus> {
        let mut status = BTreeMap::new();

        for rt in self.tasks.iter() {
            if rt.task_run.is_none() && rt.condition_checks.is_empty() {
                continue;
            }

            let mut entry = PipelineRunTaskRunStatus {
                pipeline_task_name: rt.name().to_string(),
                status: rt.task_run.as_ref().map(|run| run.status.clone()),
                condition_checks: BTreeMap::new(),
            };

            if !rt.condition_checks.is_empty() {
                for check in rt.condition_checks.iter() {
                    entry.condition_checks.insert(
                        check.name.clone(),
                        ConditionCheckStatus {
                            condition_name: check.condition_name.clone(),
                            status: check.status,
                        },
                    );
                }

                if rt.condition_checks.is_done() && !rt.condition_checks.is_success() {
                    let task_status = entry.status.get_or_insert_with(Default::default);
                    task_status.succeeded = ConditionStatus::False;
                    task_status.reason = Some(REASON_CONDITION_CHECK_FAILED.to_string());
                    task_status.message = Some(format!(
                        "ConditionChecks failed for Task {} in PipelineRun {}",
                        rt.task_run_name, run_name
                    ));
                }
            }

            status.insert(rt.task_run_name.clone(), entry);
        }

        status
    }
}

impl FromIterator<ResolvedTask> for RunState {
    fn from_iter<I: IntoIterator<Item = ResolvedTask>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
