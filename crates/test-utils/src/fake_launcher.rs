use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use rundag::engine::{LaunchKind, LaunchRequest, RuntimeEvent, TaskRunOutcome};
use rundag::errors::Result;
use rundag::exec::Launcher;

/// A fake launcher that:
/// - records every launch request and cancel call
/// - immediately reports a completion for each launch: executions succeed
///   unless listed in `failing`, condition checks pass unless their
///   condition is listed in `failing_conditions`.
pub struct FakeLauncher {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    launched: Arc<Mutex<Vec<LaunchRequest>>>,
    cancelled: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
    failing_conditions: HashSet<String>,
    /// Tasks that are launched but never report back.
    hanging: HashSet<String>,
}

impl FakeLauncher {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        launched: Arc<Mutex<Vec<LaunchRequest>>>,
    ) -> Self {
        Self {
            runtime_tx,
            launched,
            cancelled: Arc::new(Mutex::new(Vec::new())),
            failing: HashSet::new(),
            failing_conditions: HashSet::new(),
            hanging: HashSet::new(),
        }
    }

    pub fn failing(mut self, task: &str) -> Self {
        self.failing.insert(task.to_string());
        self
    }

    pub fn failing_condition(mut self, condition: &str) -> Self {
        self.failing_conditions.insert(condition.to_string());
        self
    }

    pub fn hanging(mut self, task: &str) -> Self {
        self.hanging.insert(task.to_string());
        self
    }

    /// Shared record of cancelled execution names.
    pub fn cancelled(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.cancelled)
    }
}

impl Launcher for FakeLauncher {
    fn launch(
        &mut self,
        requests: Vec<LaunchRequest>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let launched = Arc::clone(&self.launched);

        Box::pin(async move {
            for request in requests {
                {
                    let mut guard = launched.lock().unwrap();
                    guard.push(request.clone());
                }

                if self.hanging.contains(&request.task) {
                    continue;
                }

                match request.kind {
                    LaunchKind::ConditionChecks(checks) => {
                        for check in checks {
                            let succeeded = !self.failing_conditions.contains(&check.condition_name);
                            tx.send(RuntimeEvent::ConditionCheckCompleted {
                                task: request.task.clone(),
                                check: check.name,
                                succeeded,
                            })
                            .await
                            .map_err(anyhow::Error::from)?;
                        }
                    }
                    LaunchKind::TaskRun { .. } => {
                        let outcome = if self.failing.contains(&request.task) {
                            TaskRunOutcome::Failed {
                                message: "fake failure".to_string(),
                            }
                        } else {
                            TaskRunOutcome::Succeeded {
                                results: BTreeMap::new(),
                            }
                        };
                        tx.send(RuntimeEvent::TaskRunCompleted {
                            task: request.task.clone(),
                            outcome,
                        })
                        .await
                        .map_err(anyhow::Error::from)?;
                    }
                }
            }
            Ok(())
        })
    }

    fn cancel(
        &mut self,
        task_runs: Vec<String>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let cancelled = Arc::clone(&self.cancelled);
        Box::pin(async move {
            cancelled.lock().unwrap().extend(task_runs);
            Ok(())
        })
    }
}
