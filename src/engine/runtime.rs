// src/engine/runtime.rs

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::Launcher;

use super::core::{Reconciler, RunReport};
use super::{CoreCommand, RuntimeEvent};

/// Drives the reconciler in response to `RuntimeEvent`s and periodic
/// resyncs, and delegates launches and cancellations to a `Launcher`.
///
/// This is a pure IO shell around `Reconciler`, which contains all the run
/// semantics. It reads events from channels, keeps the clock, and talks to
/// the launcher.
pub struct Runtime<L: Launcher> {
    core: Reconciler,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    launcher: L,
    resync_interval: Duration,
}

impl<L: Launcher> fmt::Debug for Runtime<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("resync_interval", &self.resync_interval)
            .finish_non_exhaustive()
    }
}

impl<L: Launcher> Runtime<L> {
    pub fn new(core: Reconciler, event_rx: mpsc::Receiver<RuntimeEvent>, launcher: L) -> Self {
        let resync_interval = core.pipeline().resync_interval;
        Self {
            core,
            event_rx,
            launcher,
            resync_interval,
        }
    }

    /// Override the resync period taken from the pipeline file.
    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = interval;
        self
    }

    /// Main event loop.
    ///
    /// - Ticks once immediately, then on every event and every resync.
    /// - Ticks again right after the run timeout expires.
    /// - Returns the final status block once the run reaches a terminal
    ///   condition, or the current one if the loop stops early.
    pub async fn run(mut self) -> Result<RunReport> {
        info!(pipeline_run = %self.core.meta().name, "reconciler started");

        let started_at = Instant::now();
        let deadline = self
            .core
            .meta()
            .timeout
            .filter(|t| !t.is_zero())
            // The run times out once elapsed time is strictly past the limit.
            .map(|t| started_at + t + Duration::from_millis(1));
        let mut deadline_fired = false;

        let mut resync = tokio::time::interval(self.resync_interval);
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = tokio::select! {
                maybe = self.event_rx.recv() => match maybe {
                    Some(event) => event,
                    None => {
                        info!("runtime event channel closed; exiting");
                        break;
                    }
                },
                // The first tick completes immediately and starts the run.
                _ = resync.tick() => RuntimeEvent::Resync,
                _ = sleep_until_deadline(deadline), if deadline.is_some() && !deadline_fired => {
                    deadline_fired = true;
                    RuntimeEvent::Resync
                }
            };

            debug!(?event, "runtime received event");

            self.core.set_elapsed(started_at.elapsed());
            let step = self.core.step(event);

            for command in step.commands {
                if let Some(report) = self.execute_command(command).await? {
                    info!("run reached a terminal condition; stopping runtime");
                    return Ok(report);
                }
            }

            if !step.keep_running {
                info!("reconciler requested exit; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        self.core.report()
    }

    /// Execute a single command; returns the report on `Finish`.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<Option<RunReport>> {
        match command {
            CoreCommand::Launch(requests) => {
                debug!(count = requests.len(), "handing launches to launcher");
                self.launcher.launch(requests).await?;
            }
            CoreCommand::Cancel(task_runs) => {
                debug!(?task_runs, "cancelling task runs");
                self.launcher.cancel(task_runs).await?;
            }
            CoreCommand::Finish(report) => return Ok(Some(report)),
        }
        Ok(None)
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
