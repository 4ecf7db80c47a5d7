// src/state/facts.rs

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use crate::dag::{DagGraph, ResultRef};
use crate::errors::Result;
use crate::state::condition::{Condition, PipelineRunMeta, RunReason};
use crate::state::resolved::ResolvedTask;
use crate::state::run_state::RunState;
use crate::state::status::SkippedTask;
use crate::state::{SkipReason, TaskState};
use crate::types::ConditionStatus;

/// Run state plus the main and finally graphs: everything needed to decide
/// what to launch next and how the run is doing.
///
/// All queries are pure and recompute from the snapshot, so calling them
/// repeatedly on the same facts always gives the same answer.
#[derive(Debug, Clone)]
pub struct RunFacts {
    pub state: RunState,
    pub tasks_graph: DagGraph,
    pub final_tasks_graph: DagGraph,
}

impl RunFacts {
    pub fn new(state: RunState, tasks_graph: DagGraph, final_tasks_graph: DagGraph) -> Self {
        Self {
            state,
            tasks_graph,
            final_tasks_graph,
        }
    }

    pub fn is_dag_task(&self, name: &str) -> bool {
        self.tasks_graph.contains(name)
    }

    pub fn is_final_task(&self, name: &str) -> bool {
        self.final_tasks_graph.contains(name)
    }

    /// State of `rt` in the context of this run, including skips.
    pub fn task_state(&self, rt: &ResolvedTask) -> TaskState {
        self.task_state_in(rt, &mut self.skip_memo())
    }

    pub fn is_skipped(&self, rt: &ResolvedTask) -> bool {
        self.skip_reason(rt).is_some()
    }

    /// Why `rt` is skipped, if it is.
    ///
    /// Finally tasks and started tasks are never skipped. Guards are only
    /// evaluated once every parent is done.
    pub fn skip_reason(&self, rt: &ResolvedTask) -> Option<SkipReason> {
        self.skip_reason_in(rt, &mut self.skip_memo())
    }

    fn skip_memo(&self) -> SkipMemo<'_> {
        SkipMemo {
            stopping: self.is_stopping(),
            reasons: HashMap::new(),
        }
    }

    fn task_state_in<'a>(&'a self, rt: &'a ResolvedTask, memo: &mut SkipMemo<'a>) -> TaskState {
        if self.skip_reason_in(rt, memo).is_some() {
            return TaskState::Skipped;
        }
        rt.execution_state()
    }

    fn skip_reason_in<'a>(
        &'a self,
        rt: &'a ResolvedTask,
        memo: &mut SkipMemo<'a>,
    ) -> Option<SkipReason> {
        if let Some(reason) = memo.reasons.get(rt.name()) {
            return *reason;
        }
        let reason = self.compute_skip_reason(rt, memo);
        memo.reasons.insert(rt.name(), reason);
        reason
    }

    fn compute_skip_reason<'a>(
        &'a self,
        rt: &'a ResolvedTask,
        memo: &mut SkipMemo<'a>,
    ) -> Option<SkipReason> {
        if self.is_final_task(rt.name()) || rt.is_started() {
            return None;
        }

        if rt.condition_checks.has_failed() {
            return Some(SkipReason::ConditionCheckFailed);
        }

        let mut parents_done = true;
        let mut parent_skipped = false;
        for parent in self
            .tasks_graph
            .dependencies_of(rt.name())
            .iter()
            .filter_map(|name| self.state.get(name))
        {
            if self.skip_reason_in(parent, memo).is_some() {
                parent_skipped = true;
            } else if !parent.execution_state().is_done() {
                parents_done = false;
            }
        }

        if parents_done && self.when_expressions_skip(rt) {
            return Some(SkipReason::WhenExpressionsFalse);
        }
        if parent_skipped {
            return Some(SkipReason::ParentSkipped);
        }
        if memo.stopping {
            return Some(SkipReason::RunStopping);
        }
        None
    }

    fn when_expressions_skip(&self, rt: &ResolvedTask) -> bool {
        rt.task
            .when
            .iter()
            .any(|expr| expr.evaluate(|r| self.lookup_result(r)) == Some(false))
    }

    /// Resolve a result reference against the current snapshot. Results of
    /// tasks that have not succeeded are not available yet.
    fn lookup_result(&self, reference: &ResultRef) -> Option<String> {
        let producer = self.state.get(&reference.task)?;
        if !producer.is_successful() {
            return None;
        }
        Some(producer.result(&reference.result).unwrap_or_default().to_string())
    }

    /// No new main tasks will be scheduled: a main task was cancelled or
    /// failed with no retries left.
    ///
    /// Running tasks are left to finish on their own.
    pub fn is_stopping(&self) -> bool {
        self.state
            .iter()
            .filter(|t| self.is_dag_task(t.name()))
            .any(|t| {
                matches!(
                    t.execution_state(),
                    TaskState::Cancelled | TaskState::Failure { retryable: false }
                )
            })
    }

    /// Main tasks to launch next.
    ///
    /// Fails only if the frontier query rejects the done set, which a
    /// validated graph never produces.
    pub fn dag_execution_queue(&self) -> Result<Vec<&ResolvedTask>> {
        if self.is_stopping() {
            debug!("run is stopping; not scheduling new main tasks");
            return Ok(Vec::new());
        }

        let done = self.successful_or_skipped_dag_tasks();
        let candidates = self.tasks_graph.get_schedulable(done.iter().copied())?;
        Ok(self.state.next_tasks(&candidates))
    }

    /// Finally tasks to launch next; empty until every main task is done.
    pub fn final_tasks(&self) -> Vec<&ResolvedTask> {
        if !self.check_dag_tasks_done() {
            return Vec::new();
        }

        let candidates: BTreeSet<String> = self
            .state
            .iter()
            .filter(|t| self.is_final_task(t.name()) && !t.is_successful())
            .map(|t| t.name().to_string())
            .collect();
        self.state.next_tasks(&candidates)
    }

    /// Aggregate run condition.
    ///
    /// In order of precedence:
    /// 1. timed out → False / `PipelineRunTimedOut`
    /// 2. every task has a final status → True or False, reason by outcome
    /// 3. something was cancelled, or something failed and the finally
    ///    tasks are done → Unknown / `PipelineRunStopping`
    /// 4. otherwise → Unknown / `PipelineRunRunning`
    pub fn pipeline_condition_status(&self, run: &PipelineRunMeta) -> Condition {
        if run.is_timed_out() {
            info!(pipeline_run = %run.name, "run exceeded its timeout");
            return run.timed_out_condition();
        }

        let mut all = 0usize;
        let mut with_status = 0usize;
        let mut skipped = 0usize;
        let mut failed = 0usize;
        let mut cancelled = 0usize;

        let mut memo = self.skip_memo();
        for rt in self.state.iter() {
            all += 1;
            match self.task_state_in(rt, &mut memo) {
                TaskState::Successful => with_status += 1,
                TaskState::Skipped => {
                    with_status += 1;
                    skipped += 1;
                }
                TaskState::Cancelled => {
                    with_status += 1;
                    cancelled += 1;
                }
                TaskState::Failure { retryable: false } | TaskState::ConditionCheckFailed => {
                    with_status += 1;
                    failed += 1;
                }
                TaskState::Unstarted | TaskState::Running | TaskState::Failure { retryable: true } => {}
            }
        }

        if with_status == all {
            let status = if failed > 0 || cancelled > 0 {
                ConditionStatus::False
            } else {
                ConditionStatus::True
            };
            let reason = if failed > 0 {
                RunReason::Failed
            } else if cancelled > 0 {
                RunReason::Cancelled
            } else if skipped > 0 {
                RunReason::Completed
            } else {
                RunReason::Succeeded
            };

            info!(
                pipeline_run = %run.name,
                %reason,
                "all task runs have finished; run has finished"
            );
            return Condition::new(
                status,
                reason,
                format!(
                    "Tasks Completed: {} (Failed: {}, Cancelled {}), Skipped: {}",
                    all - skipped,
                    failed,
                    cancelled,
                    skipped
                ),
            );
        }

        // A run with finally tasks stays Running after a main failure until
        // the finally tasks are done.
        let reason = if cancelled > 0 || (failed > 0 && self.check_final_tasks_done()) {
            RunReason::Stopping
        } else {
            RunReason::Running
        };

        Condition::new(
            ConditionStatus::Unknown,
            reason,
            format!(
                "Tasks Completed: {} (Failed: {}, Cancelled {}), Incomplete: {}, Skipped: {}",
                with_status - skipped,
                failed,
                cancelled,
                all - with_status,
                skipped
            ),
        )
    }

    /// Skipped tasks, in declaration order.
    pub fn skipped_tasks(&self) -> Vec<SkippedTask> {
        let mut memo = self.skip_memo();
        self.state
            .iter()
            .filter(|rt| self.skip_reason_in(*rt, &mut memo).is_some())
            .map(|rt| SkippedTask {
                name: rt.name().to_string(),
            })
            .collect()
    }

    /// Every main task succeeded, failed for good, was cancelled or skipped.
    pub fn check_dag_tasks_done(&self) -> bool {
        self.check_tasks_done(&self.tasks_graph)
    }

    /// Every finally task succeeded, failed for good or was cancelled.
    pub fn check_final_tasks_done(&self) -> bool {
        self.check_tasks_done(&self.final_tasks_graph)
    }

    fn check_tasks_done(&self, graph: &DagGraph) -> bool {
        let mut memo = self.skip_memo();
        self.state
            .iter()
            .filter(|t| graph.contains(t.name()))
            .all(|t| self.task_state_in(t, &mut memo).is_done())
    }

    fn successful_or_skipped_dag_tasks(&self) -> Vec<&str> {
        let mut memo = self.skip_memo();
        self.state
            .iter()
            .filter(|t| self.is_dag_task(t.name()))
            .filter(|t| t.is_successful() || self.skip_reason_in(*t, &mut memo).is_some())
            .map(|t| t.name())
            .collect()
    }
}

/// Skip decisions made while answering one query.
struct SkipMemo<'a> {
    stopping: bool,
    reasons: HashMap<&'a str, Option<SkipReason>>,
}
