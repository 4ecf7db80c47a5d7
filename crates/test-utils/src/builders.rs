#![allow(dead_code)]

use std::collections::BTreeMap;

use rundag::config::{
    ConditionConfig, ObservedConditionCheck, ObservedTaskRun, ParamConfig, PipelineFile,
    RawPipelineFile, SimulateConfig, TaskConfig, WhenConfig,
};
use rundag::engine::Reconciler;
use rundag::state::RunFacts;
use rundag::types::{ObservedStatus, ScriptedOutcome, WhenOperator};

/// Builder for `PipelineFile` to simplify test setup.
pub struct PipelineBuilder {
    raw: RawPipelineFile,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        let mut raw = RawPipelineFile::default();
        raw.run.name = "pr".to_string();
        Self { raw }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.raw.run.name = name.to_string();
        self
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.raw.run.timeout = Some(timeout.to_string());
        self
    }

    pub fn resync_interval(mut self, interval: &str) -> Self {
        self.raw.config.resync_interval = interval.to_string();
        self
    }

    pub fn task(mut self, task: TaskBuilder) -> Self {
        self.raw.task.push(task.build());
        self
    }

    pub fn finally(mut self, task: TaskBuilder) -> Self {
        self.raw.finally.push(task.build());
        self
    }

    pub fn observed(mut self, observed: ObservedBuilder) -> Self {
        self.raw.observed.push(observed.build());
        self
    }

    pub fn simulate(mut self, task: &str, script: SimulateBuilder) -> Self {
        self.raw.simulate.insert(task.to_string(), script.build());
        self
    }

    /// The raw file, for tests that exercise validation failures.
    pub fn raw(self) -> RawPipelineFile {
        self.raw
    }

    pub fn build(self) -> PipelineFile {
        PipelineFile::try_from(self.raw).expect("Failed to build valid pipeline from builder")
    }

    /// Facts for the `[[observed]]` snapshots of the built pipeline.
    pub fn facts(self) -> RunFacts {
        Reconciler::new(self.build())
            .build_facts()
            .expect("Failed to build facts from builder")
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskBuilder {
    task: TaskConfig,
}

impl TaskBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            task: TaskConfig {
                name: name.to_string(),
                run_after: vec![],
                retries: 0,
                params: vec![],
                when: vec![],
                conditions: vec![],
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.run_after.push(dep.to_string());
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.task.retries = retries;
        self
    }

    pub fn param(mut self, name: &str, value: &str) -> Self {
        self.task.params.push(ParamConfig {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn when_in(self, input: &str, values: &[&str]) -> Self {
        self.when(input, WhenOperator::In, values)
    }

    pub fn when_notin(self, input: &str, values: &[&str]) -> Self {
        self.when(input, WhenOperator::NotIn, values)
    }

    fn when(mut self, input: &str, operator: WhenOperator, values: &[&str]) -> Self {
        self.task.when.push(WhenConfig {
            input: input.to_string(),
            operator,
            values: values.iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    pub fn condition(mut self, condition_ref: &str) -> Self {
        self.task.conditions.push(ConditionConfig {
            condition_ref: condition_ref.to_string(),
        });
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Builder for `ObservedTaskRun` snapshots.
pub struct ObservedBuilder {
    observed: ObservedTaskRun,
}

impl ObservedBuilder {
    pub fn new(task: &str) -> Self {
        Self {
            observed: ObservedTaskRun {
                task: task.to_string(),
                status: None,
                retries_used: 0,
                cancelled: false,
                reason: None,
                results: BTreeMap::new(),
                condition_checks: vec![],
            },
        }
    }

    pub fn running(task: &str) -> Self {
        Self::new(task).status(ObservedStatus::Running)
    }

    pub fn succeeded(task: &str) -> Self {
        Self::new(task).status(ObservedStatus::Succeeded)
    }

    pub fn failed(task: &str) -> Self {
        Self::new(task).status(ObservedStatus::Failed)
    }

    pub fn cancelled(task: &str) -> Self {
        Self::new(task).status(ObservedStatus::Cancelled)
    }

    pub fn status(mut self, status: ObservedStatus) -> Self {
        self.observed.status = Some(status);
        self
    }

    pub fn retries_used(mut self, n: u32) -> Self {
        self.observed.retries_used = n;
        self
    }

    pub fn cancel_requested(mut self) -> Self {
        self.observed.cancelled = true;
        self
    }

    pub fn result(mut self, name: &str, value: &str) -> Self {
        self.observed
            .results
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn check(mut self, condition: &str, status: ObservedStatus) -> Self {
        self.observed.condition_checks.push(ObservedConditionCheck {
            condition: condition.to_string(),
            status,
        });
        self
    }

    pub fn build(self) -> ObservedTaskRun {
        self.observed
    }
}

/// Builder for `[simulate.<task>]` scripts.
#[derive(Default)]
pub struct SimulateBuilder {
    script: SimulateConfig,
}

impl SimulateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(mut self, outcomes: &[ScriptedOutcome]) -> Self {
        self.script.outcomes = outcomes.to_vec();
        self
    }

    pub fn result(mut self, name: &str, value: &str) -> Self {
        self.script
            .results
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn condition(mut self, condition_ref: &str, passes: bool) -> Self {
        self.script
            .conditions
            .insert(condition_ref.to_string(), passes);
        self
    }

    pub fn delay(mut self, delay: &str) -> Self {
        self.script.delay = Some(delay.to_string());
        self
    }

    pub fn build(self) -> SimulateConfig {
        self.script
    }
}
