// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::PipelineTask;
use crate::types::{ObservedStatus, ScriptedOutcome, WhenOperator};

/// Top-level pipeline file as read from TOML, before validation.
///
/// ```toml
/// [run]
/// name = "build-and-test"
/// timeout = "1h"
///
/// [[task]]
/// name = "clone"
///
/// [[task]]
/// name = "build"
/// run_after = ["clone"]
/// retries = 2
///
/// [[finally]]
/// name = "notify"
/// ```
///
/// Tasks are arrays of tables so that declaration order survives
/// deserialization and duplicate names can be reported.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPipelineFile {
    #[serde(default)]
    pub run: RunSection,

    #[serde(default)]
    pub config: ConfigSection,

    /// Main-DAG section from `[[task]]`.
    #[serde(default)]
    pub task: Vec<TaskConfig>,

    /// Finally section from `[[finally]]`.
    #[serde(default)]
    pub finally: Vec<TaskConfig>,

    /// Persisted execution snapshots from `[[observed]]`.
    #[serde(default)]
    pub observed: Vec<ObservedTaskRun>,

    /// Scripts for the simulated launcher from `[simulate.<task>]`.
    #[serde(default)]
    pub simulate: BTreeMap<String, SimulateConfig>,
}

/// `[run]` section: run-level metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    #[serde(default = "default_run_name")]
    pub name: String,

    /// Duration string; absent or zero means the run never times out.
    #[serde(default)]
    pub timeout: Option<String>,
}

fn default_run_name() -> String {
    "pipeline-run".to_string()
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            name: default_run_name(),
            timeout: None,
        }
    }
}

/// `[config]` section: reconciler behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// How often the reconciler re-ticks without an observed change.
    #[serde(default = "default_resync_interval")]
    pub resync_interval: String,
}

fn default_resync_interval() -> String {
    "30s".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            resync_interval: default_resync_interval(),
        }
    }
}

/// `[[task]]` / `[[finally]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub name: String,

    /// Explicit ordering dependencies.
    #[serde(default)]
    pub run_after: Vec<String>,

    /// How many times a failed execution may be relaunched.
    #[serde(default)]
    pub retries: u32,

    #[serde(default)]
    pub params: Vec<ParamConfig>,

    #[serde(default)]
    pub when: Vec<WhenConfig>,

    /// Legacy condition checks gating the task.
    #[serde(default)]
    pub conditions: Vec<ConditionConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParamConfig {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhenConfig {
    pub input: String,
    pub operator: WhenOperator,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionConfig {
    pub condition_ref: String,
}

/// `[[observed]]` entry: what the cluster store reported for one task.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservedTaskRun {
    pub task: String,
    /// Absent while only condition checks exist for the task.
    #[serde(default)]
    pub status: Option<ObservedStatus>,
    #[serde(default)]
    pub retries_used: u32,
    /// Explicit cancel signal on the execution.
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub results: BTreeMap<String, String>,
    #[serde(default)]
    pub condition_checks: Vec<ObservedConditionCheck>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservedConditionCheck {
    /// Name of the declared condition (`condition_ref`).
    pub condition: String,
    pub status: ObservedStatus,
}

/// `[simulate.<task>]` script.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SimulateConfig {
    /// Outcome per attempt; the last entry repeats for further attempts.
    #[serde(default)]
    pub outcomes: Vec<ScriptedOutcome>,

    /// Results reported by successful attempts.
    #[serde(default)]
    pub results: BTreeMap<String, String>,

    /// Outcome of each declared condition, keyed by `condition_ref`.
    #[serde(default)]
    pub conditions: BTreeMap<String, bool>,

    /// Simulated execution time, e.g. `"10ms"`.
    #[serde(default)]
    pub delay: Option<String>,
}

/// Validated run-level settings.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub name: String,
    pub timeout: Option<Duration>,
}

/// A validated pipeline file.
///
/// Built through `PipelineFile::try_from(RawPipelineFile)` (see
/// `config::validate`), which guarantees:
/// - unique task names across both sections
/// - every dependency refers to a declared main task
/// - the main tasks form a DAG
/// - snapshots and scripts only mention declared tasks
#[derive(Debug, Clone)]
pub struct PipelineFile {
    pub run: RunSettings,
    pub resync_interval: Duration,
    pub tasks: Vec<PipelineTask>,
    pub finally: Vec<PipelineTask>,
    pub observed: Vec<ObservedTaskRun>,
    pub simulate: BTreeMap<String, SimulateConfig>,
}

impl PipelineFile {
    /// All declarations, main tasks first, in declaration order.
    pub fn all_tasks(&self) -> impl Iterator<Item = &PipelineTask> {
        self.tasks.iter().chain(self.finally.iter())
    }

    pub fn find_task(&self, name: &str) -> Option<&PipelineTask> {
        self.all_tasks().find(|t| t.name == name)
    }

    /// Name of the execution launched for a pipeline task.
    pub fn task_run_name(&self, task: &str) -> String {
        format!("{}-{}", self.run.name, task)
    }
}
