// src/engine/core.rs

//! Pure reconciler state machine.
//!
//! [`Reconciler`] consumes [`RuntimeEvent`]s and produces:
//! - an updated execution store
//! - a list of commands describing what the IO shell should do next
//!
//! Every tick rebuilds `RunFacts` from the store, so no decision depends on
//! anything but the pipeline declaration and what has been observed.
//!
//! The async shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - handing launch and cancel requests to the launcher
//! - keeping track of elapsed time
//!
//! The reconciler can be unit tested without any Tokio, channels or timers.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::model::PipelineFile;
use crate::dag::DagGraph;
use crate::engine::store::ExecutionStore;
use crate::engine::{LaunchRequest, RuntimeEvent};
use crate::errors::Result;
use crate::state::{
    Condition, PipelineRunMeta, PipelineRunTaskRunStatus, RunFacts, RunReason, SkippedTask,
};
use crate::types::ConditionStatus;

/// Command produced by the reconciler, to be executed by the IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Create these condition checks or executions.
    Launch(Vec<LaunchRequest>),
    /// Stop these executions (by execution name).
    Cancel(Vec<String>),
    /// The run reached a terminal condition.
    Finish(RunReport),
}

/// Decision returned after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn stop(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: false,
        }
    }
}

/// Status block of a run, as written back after a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub pipeline_run: String,
    pub condition: Condition,
    pub skipped_tasks: Vec<SkippedTask>,
    pub task_runs: BTreeMap<String, PipelineRunTaskRunStatus>,
}

/// What a single tick would do, without doing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickPlan {
    pub pipeline_run: String,
    pub is_stopping: bool,
    /// Tasks the tick would hand to the launcher, main tasks first.
    pub launch: Vec<String>,
    pub skipped_tasks: Vec<SkippedTask>,
    pub task_runs: BTreeMap<String, PipelineRunTaskRunStatus>,
    pub condition: Condition,
}

/// Reconciler for one run.
#[derive(Debug)]
pub struct Reconciler {
    pipeline: PipelineFile,
    store: ExecutionStore,
    meta: PipelineRunMeta,
    started: bool,
    finished: bool,
}

impl Reconciler {
    /// Reconciler seeded with the pipeline's `[[observed]]` snapshots.
    pub fn new(pipeline: PipelineFile) -> Self {
        let store = ExecutionStore::from_observed(&pipeline);
        Self::with_store(pipeline, store)
    }

    pub fn with_store(pipeline: PipelineFile, store: ExecutionStore) -> Self {
        let meta = PipelineRunMeta::new(pipeline.run.name.clone(), pipeline.run.timeout);
        Self {
            pipeline,
            store,
            meta,
            started: false,
            finished: false,
        }
    }

    pub fn pipeline(&self) -> &PipelineFile {
        &self.pipeline
    }

    pub fn store(&self) -> &ExecutionStore {
        &self.store
    }

    pub fn meta(&self) -> &PipelineRunMeta {
        &self.meta
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Time since the run started, as measured by the caller.
    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.meta.elapsed = elapsed;
    }

    /// Snapshot of the run built from the current store.
    pub fn build_facts(&self) -> Result<RunFacts> {
        let tasks_graph = DagGraph::build(&self.pipeline.tasks)?;
        let final_tasks_graph = DagGraph::build_unlinked(&self.pipeline.finally)?;
        let state = self.store.resolve(&self.pipeline);
        Ok(RunFacts::new(state, tasks_graph, final_tasks_graph))
    }

    /// Current status block of the run.
    pub fn report(&self) -> Result<RunReport> {
        let facts = self.build_facts()?;
        Ok(self.report_from(&facts))
    }

    fn report_from(&self, facts: &RunFacts) -> RunReport {
        RunReport {
            pipeline_run: self.meta.name.clone(),
            condition: facts.pipeline_condition_status(&self.meta),
            skipped_tasks: facts.skipped_tasks(),
            task_runs: facts.state.task_runs_status(&self.meta.name),
        }
    }

    /// Describe the next tick without recording anything.
    pub fn plan(&self) -> Result<TickPlan> {
        let facts = self.build_facts()?;

        let mut launch: Vec<String> = facts
            .dag_execution_queue()?
            .into_iter()
            .map(|rt| rt.name().to_string())
            .collect();
        launch.extend(facts.final_tasks().into_iter().map(|rt| rt.name().to_string()));

        let report = self.report_from(&facts);
        Ok(TickPlan {
            pipeline_run: report.pipeline_run,
            is_stopping: facts.is_stopping(),
            launch,
            skipped_tasks: report.skipped_tasks,
            task_runs: report.task_runs,
            condition: report.condition,
        })
    }

    /// Handle a single runtime event, updating the store and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        if self.finished {
            debug!(?event, "run already finished; ignoring event");
            return CoreStep::stop(Vec::new());
        }

        let mut commands = Vec::new();

        match event {
            RuntimeEvent::TaskRunCompleted { task, outcome } => {
                if !self.store.record_task_run_outcome(&task, outcome) {
                    debug!(task = %task, "completion did not change the store");
                }
            }
            RuntimeEvent::ConditionCheckCompleted {
                task,
                check,
                succeeded,
            } => {
                if !self.store.record_condition_check(&task, &check, succeeded) {
                    debug!(task = %task, check = %check, "check result did not change the store");
                }
            }
            RuntimeEvent::CancelRequested => {
                info!(pipeline_run = %self.meta.name, "cancelling run");
                let cancelled = self
                    .store
                    .cancel_running(&format!("PipelineRun {} was cancelled", self.meta.name));
                if !cancelled.is_empty() {
                    commands.push(CoreCommand::Cancel(cancelled));
                }
            }
            RuntimeEvent::Resync => {}
            RuntimeEvent::ShutdownRequested => {
                info!("shutdown requested; stopping reconciler");
                return CoreStep::stop(commands);
            }
        }

        self.tick(commands)
    }

    /// One reconciliation pass over the current store.
    fn tick(&mut self, mut commands: Vec<CoreCommand>) -> CoreStep {
        let facts = match self.build_facts() {
            Ok(facts) => facts,
            Err(err) => {
                warn!(error = %err, "pipeline definition is invalid; failing run");
                return self.finish(
                    commands,
                    RunReport {
                        pipeline_run: self.meta.name.clone(),
                        condition: Condition::new(
                            ConditionStatus::False,
                            RunReason::Failed,
                            format!("pipeline definition is invalid: {err}"),
                        ),
                        skipped_tasks: Vec::new(),
                        task_runs: BTreeMap::new(),
                    },
                );
            }
        };

        if !self.started {
            self.started = true;
            if facts.state.is_before_first_task_run() {
                info!(
                    pipeline_run = %self.meta.name,
                    tasks = facts.state.len(),
                    "starting run"
                );
            }
        }

        if self.meta.is_timed_out() {
            let cancelled = self
                .store
                .cancel_running(&format!("PipelineRun {} timed out", self.meta.name));
            if !cancelled.is_empty() {
                commands.push(CoreCommand::Cancel(cancelled));
            }
            return self.finish_from_store(commands);
        }

        let mut next = match facts.dag_execution_queue() {
            Ok(queue) => queue,
            Err(err) => {
                warn!(error = %err, "could not compute schedulable tasks");
                Vec::new()
            }
        };
        next.extend(facts.final_tasks());

        let launches: Vec<LaunchRequest> = next
            .into_iter()
            .filter_map(|rt| self.store.record_launch(rt))
            .collect();
        if !launches.is_empty() {
            info!(
                tasks = ?launches.iter().map(|l| l.task.as_str()).collect::<Vec<_>>(),
                "launching tasks"
            );
            commands.push(CoreCommand::Launch(launches));
        }

        let facts = match self.build_facts() {
            Ok(facts) => facts,
            Err(_) => return self.finish_from_store(commands),
        };
        let condition = facts.pipeline_condition_status(&self.meta);
        debug!(reason = %condition.reason, message = %condition.message, "run condition");

        if condition.is_terminal() {
            let report = self.report_from(&facts);
            return self.finish(commands, report);
        }

        CoreStep {
            commands,
            keep_running: true,
        }
    }

    fn finish_from_store(&mut self, commands: Vec<CoreCommand>) -> CoreStep {
        match self.report() {
            Ok(report) => self.finish(commands, report),
            Err(err) => {
                warn!(error = %err, "could not build final report");
                self.finished = true;
                CoreStep::stop(commands)
            }
        }
    }

    fn finish(&mut self, mut commands: Vec<CoreCommand>, report: RunReport) -> CoreStep {
        info!(
            pipeline_run = %report.pipeline_run,
            reason = %report.condition.reason,
            "run finished"
        );
        self.finished = true;
        commands.push(CoreCommand::Finish(report));
        CoreStep::stop(commands)
    }
}
