// src/engine/store.rs

//! Authoritative execution store for one run.
//!
//! Stands in for the cluster store: it holds what has been launched and
//! what the launcher reported, and is the only input from which `RunFacts`
//! are rebuilt on every tick.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::config::model::PipelineFile;
use crate::engine::{ConditionCheckLaunch, LaunchKind, LaunchRequest, TaskName, TaskRunOutcome};
use crate::state::execution::TASK_RUN_REASON_CANCELLED;
use crate::state::{ConditionCheck, ConditionChecks, ResolvedTask, RunState, TaskRun};
use crate::types::{ConditionStatus, ObservedStatus};

/// Name of the check execution for the `index`-th condition of a task.
pub fn condition_check_name(task_run_name: &str, condition_ref: &str, index: usize) -> String {
    format!("{task_run_name}-{condition_ref}-{index}")
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionStore {
    task_runs: HashMap<TaskName, TaskRun>,
    /// Created checks per task, keyed by check name.
    condition_checks: HashMap<TaskName, BTreeMap<String, ConditionStatus>>,
}

impl ExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from the `[[observed]]` snapshots of a pipeline file.
    pub fn from_observed(pipeline: &PipelineFile) -> Self {
        let mut store = Self::new();

        for observed in pipeline.observed.iter() {
            let task_run_name = pipeline.task_run_name(&observed.task);

            if let Some(run) = TaskRun::from_observed(task_run_name.clone(), observed) {
                store.task_runs.insert(observed.task.clone(), run);
            }

            let Some(task) = pipeline.find_task(&observed.task) else {
                continue;
            };
            for check in observed.condition_checks.iter() {
                let Some(index) = task
                    .conditions
                    .iter()
                    .position(|c| c.condition_ref == check.condition)
                else {
                    continue;
                };
                let status = match check.status {
                    ObservedStatus::Succeeded => ConditionStatus::True,
                    ObservedStatus::Failed | ObservedStatus::Cancelled => ConditionStatus::False,
                    ObservedStatus::Running => ConditionStatus::Unknown,
                };
                store
                    .condition_checks
                    .entry(observed.task.clone())
                    .or_default()
                    .insert(
                        condition_check_name(&task_run_name, &check.condition, index),
                        status,
                    );
            }
        }

        store
    }

    pub fn task_run(&self, task: &str) -> Option<&TaskRun> {
        self.task_runs.get(task)
    }

    /// Rebuild the resolved tasks of the run, in declaration order.
    pub fn resolve(&self, pipeline: &PipelineFile) -> RunState {
        pipeline
            .all_tasks()
            .map(|task| {
                let task_run_name = pipeline.task_run_name(&task.name);
                let created = self.condition_checks.get(&task.name);
                let checks = task
                    .conditions
                    .iter()
                    .enumerate()
                    .map(|(index, condition)| {
                        let name =
                            condition_check_name(&task_run_name, &condition.condition_ref, index);
                        let status = created.and_then(|c| c.get(&name)).copied();
                        ConditionCheck {
                            name,
                            condition_name: condition.condition_ref.clone(),
                            status,
                        }
                    })
                    .collect();

                let mut rt = ResolvedTask::new(task.clone(), task_run_name)
                    .with_condition_checks(ConditionChecks(checks));
                rt.task_run = self.task_runs.get(&task.name).cloned();
                rt
            })
            .collect()
    }

    /// Record the launch of a task picked by the scheduler and describe what
    /// the launcher has to create.
    ///
    /// Returns `None` when there is nothing to create (checks still running,
    /// or the task was launched already).
    pub fn record_launch(&mut self, rt: &ResolvedTask) -> Option<LaunchRequest> {
        let task = rt.name().to_string();

        if !rt.condition_checks.is_success() {
            if rt.condition_checks.has_failed() {
                return None;
            }

            let pending: Vec<ConditionCheckLaunch> = rt
                .condition_checks
                .not_created()
                .map(|c| ConditionCheckLaunch {
                    name: c.name.clone(),
                    condition_name: c.condition_name.clone(),
                })
                .collect();
            if pending.is_empty() {
                debug!(task = %task, "condition checks still running; nothing to launch");
                return None;
            }

            let created = self.condition_checks.entry(task.clone()).or_default();
            for check in pending.iter() {
                created.insert(check.name.clone(), ConditionStatus::Unknown);
            }
            debug!(task = %task, checks = pending.len(), "creating condition checks");

            return Some(LaunchRequest {
                task,
                task_run_name: rt.task_run_name.clone(),
                kind: LaunchKind::ConditionChecks(pending),
            });
        }

        match self.task_runs.get_mut(&task) {
            None => {
                debug!(task = %task, task_run = %rt.task_run_name, "creating task run");
                self.task_runs
                    .insert(task.clone(), TaskRun::new(rt.task_run_name.clone()));
                Some(LaunchRequest {
                    task,
                    task_run_name: rt.task_run_name.clone(),
                    kind: LaunchKind::TaskRun { attempt: 0 },
                })
            }
            Some(run)
                if run.succeeded().is_false()
                    && !run.is_cancelled()
                    && run.retries_used() < rt.task.retries =>
            {
                // The failed attempt moves into the retry history.
                run.status.retries_used += 1;
                run.status.succeeded = ConditionStatus::Unknown;
                run.status.reason = None;
                run.status.message = None;
                run.status.results.clear();

                let attempt = run.status.retries_used;
                debug!(task = %task, attempt, "retrying task run");
                Some(LaunchRequest {
                    task,
                    task_run_name: run.name.clone(),
                    kind: LaunchKind::TaskRun { attempt },
                })
            }
            Some(_) => None,
        }
    }

    /// Apply a reported outcome. Reports for unknown or already finished
    /// executions are ignored; returns whether the store changed.
    pub fn record_task_run_outcome(&mut self, task: &str, outcome: TaskRunOutcome) -> bool {
        let Some(run) = self.task_runs.get_mut(task) else {
            warn!(task = %task, "completion for a task without an execution; ignoring");
            return false;
        };
        if !run.succeeded().is_unknown() {
            debug!(task = %task, "completion for a finished execution; ignoring");
            return false;
        }

        match outcome {
            TaskRunOutcome::Succeeded { results } => {
                run.status.succeeded = ConditionStatus::True;
                run.status.reason = Some("Succeeded".to_string());
                run.status.results = results;
            }
            TaskRunOutcome::Failed { message } => {
                run.status.succeeded = ConditionStatus::False;
                run.status.reason = Some("Failed".to_string());
                run.status.message = Some(message);
            }
            TaskRunOutcome::Cancelled => {
                run.status.succeeded = ConditionStatus::False;
                run.status.reason = Some(TASK_RUN_REASON_CANCELLED.to_string());
            }
        }
        true
    }

    /// Apply a condition-check result; returns whether the store changed.
    pub fn record_condition_check(&mut self, task: &str, check: &str, succeeded: bool) -> bool {
        let Some(status) = self
            .condition_checks
            .get_mut(task)
            .and_then(|checks| checks.get_mut(check))
        else {
            warn!(task = %task, check = %check, "result for an unknown condition check; ignoring");
            return false;
        };
        if !status.is_unknown() {
            return false;
        }

        *status = if succeeded {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        };
        true
    }

    /// Mark every running execution as cancelled and return their names
    /// so the launcher can stop them.
    pub fn cancel_running(&mut self, message: &str) -> Vec<String> {
        let mut cancelled: Vec<String> = self
            .task_runs
            .values_mut()
            .filter(|run| run.succeeded().is_unknown())
            .map(|run| {
                run.cancel_requested = true;
                run.status.succeeded = ConditionStatus::False;
                run.status.reason = Some(TASK_RUN_REASON_CANCELLED.to_string());
                run.status.message = Some(message.to_string());
                run.name.clone()
            })
            .collect();
        cancelled.sort();
        cancelled
    }
}
