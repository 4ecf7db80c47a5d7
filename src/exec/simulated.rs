// src/exec/simulated.rs

//! Launcher that plays back `[simulate.<task>]` scripts.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::duration::parse_duration;
use crate::config::model::SimulateConfig;
use crate::engine::{LaunchKind, LaunchRequest, RuntimeEvent, TaskRunOutcome};
use crate::errors::{Result, RundagError};
use crate::types::ScriptedOutcome;

/// Validated script for one task.
#[derive(Debug, Clone, Default)]
struct Script {
    outcomes: Vec<ScriptedOutcome>,
    results: BTreeMap<String, String>,
    conditions: BTreeMap<String, bool>,
    delay: Duration,
}

impl Script {
    fn from_config(task: &str, cfg: &SimulateConfig) -> Result<Self> {
        let delay = match cfg.delay.as_deref() {
            Some(s) => parse_duration(s).map_err(|e| {
                RundagError::ConfigError(format!("simulate.{task}: invalid delay: {e}"))
            })?,
            None => Duration::ZERO,
        };
        Ok(Self {
            outcomes: cfg.outcomes.clone(),
            results: cfg.results.clone(),
            conditions: cfg.conditions.clone(),
            delay,
        })
    }

    /// Outcome of the given attempt; the last scripted outcome repeats and
    /// unscripted tasks succeed.
    fn outcome(&self, attempt: u32) -> ScriptedOutcome {
        self.outcomes
            .get(attempt as usize)
            .or_else(|| self.outcomes.last())
            .copied()
            .unwrap_or_default()
    }

    fn task_run_outcome(&self, attempt: u32) -> TaskRunOutcome {
        match self.outcome(attempt) {
            ScriptedOutcome::Succeeded => TaskRunOutcome::Succeeded {
                results: self.results.clone(),
            },
            ScriptedOutcome::Failed => TaskRunOutcome::Failed {
                message: format!("simulated failure of attempt {attempt}"),
            },
            ScriptedOutcome::Cancelled => TaskRunOutcome::Cancelled,
        }
    }

    /// Conditions without a scripted result pass.
    fn condition(&self, condition_name: &str) -> bool {
        self.conditions.get(condition_name).copied().unwrap_or(true)
    }
}

/// Simulated launcher.
///
/// Every launch becomes a Tokio task that waits for the scripted delay and
/// then reports the scripted outcome on the runtime channel.
pub struct SimulatedLauncher {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    scripts: HashMap<String, Script>,
    /// Pending simulated executions, keyed by execution name.
    active: HashMap<String, JoinHandle<()>>,
}

impl SimulatedLauncher {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        scripts: &BTreeMap<String, SimulateConfig>,
    ) -> Result<Self> {
        let scripts = scripts
            .iter()
            .map(|(task, cfg)| Ok((task.clone(), Script::from_config(task, cfg)?)))
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self {
            runtime_tx,
            scripts,
            active: HashMap::new(),
        })
    }

    fn script(&self, task: &str) -> Script {
        self.scripts.get(task).cloned().unwrap_or_default()
    }

    fn spawn_report(&mut self, key: String, delay: Duration, event: RuntimeEvent) {
        let tx = self.runtime_tx.clone();
        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            // The runtime may already have finished and dropped its receiver.
            let _ = tx.send(event).await;
        });

        self.active.retain(|_, h| !h.is_finished());
        if let Some(previous) = self.active.insert(key, handle) {
            previous.abort();
        }
    }

    fn launch_one(&mut self, request: LaunchRequest) {
        let script = self.script(&request.task);

        match request.kind {
            LaunchKind::ConditionChecks(checks) => {
                for check in checks {
                    let succeeded = script.condition(&check.condition_name);
                    debug!(
                        task = %request.task,
                        check = %check.name,
                        succeeded,
                        "simulating condition check"
                    );
                    self.spawn_report(
                        check.name.clone(),
                        script.delay,
                        RuntimeEvent::ConditionCheckCompleted {
                            task: request.task.clone(),
                            check: check.name,
                            succeeded,
                        },
                    );
                }
            }
            LaunchKind::TaskRun { attempt } => {
                let outcome = script.task_run_outcome(attempt);
                info!(
                    task = %request.task,
                    task_run = %request.task_run_name,
                    attempt,
                    ?outcome,
                    "simulating task run"
                );
                self.spawn_report(
                    request.task_run_name,
                    script.delay,
                    RuntimeEvent::TaskRunCompleted {
                        task: request.task,
                        outcome,
                    },
                );
            }
        }
    }
}

impl super::Launcher for SimulatedLauncher {
    fn launch(
        &mut self,
        requests: Vec<LaunchRequest>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            for request in requests {
                self.launch_one(request);
            }
            Ok(())
        })
    }

    fn cancel(
        &mut self,
        task_runs: Vec<String>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            for name in task_runs {
                if let Some(handle) = self.active.remove(&name) {
                    debug!(task_run = %name, "aborting simulated task run");
                    handle.abort();
                }
            }
            Ok(())
        })
    }
}

impl Drop for SimulatedLauncher {
    fn drop(&mut self) {
        for (_, handle) in self.active.drain() {
            handle.abort();
        }
    }
}
