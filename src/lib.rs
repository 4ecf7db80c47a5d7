// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod state;
pub mod types;

use std::path::PathBuf;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::duration::format_duration;
use crate::config::loader::load_and_validate;
use crate::config::model::PipelineFile;
use crate::dag::DagGraph;
use crate::engine::{Reconciler, Runtime, RuntimeEvent};
use crate::exec::SimulatedLauncher;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - pipeline loading and validation
/// - the reconciler and its runtime
/// - the simulated launcher
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let pipeline = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&pipeline)?;
        return Ok(());
    }

    if args.once {
        let plan = Reconciler::new(pipeline).plan()?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let launcher = SimulatedLauncher::new(rt_tx.clone(), &pipeline.simulate)?;

    // First Ctrl-C cancels the run and lets finally tasks run; a second one
    // stops the runtime right away.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            for event in [RuntimeEvent::CancelRequested, RuntimeEvent::ShutdownRequested] {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    eprintln!("failed to listen for Ctrl+C: {e}");
                    return;
                }
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });
    }

    info!(
        pipeline_run = %pipeline.run.name,
        tasks = pipeline.tasks.len(),
        finally = pipeline.finally.len(),
        "running pipeline with simulated launcher"
    );

    let core = Reconciler::new(pipeline);
    let runtime = Runtime::new(core, rt_rx, launcher);
    let report = runtime.run().await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Simple dry-run output: print run settings, both graphs and guards.
fn print_dry_run(pipeline: &PipelineFile) -> Result<()> {
    let graph = DagGraph::build(&pipeline.tasks)?;

    println!("rundag dry-run");
    println!("  run.name = {}", pipeline.run.name);
    match pipeline.run.timeout {
        Some(t) if !t.is_zero() => println!("  run.timeout = {}", format_duration(t)),
        _ => println!("  run.timeout = none"),
    }
    println!(
        "  config.resync_interval = {}",
        format_duration(pipeline.resync_interval)
    );
    println!();

    println!("tasks ({}):", pipeline.tasks.len());
    for task in pipeline.tasks.iter() {
        println!("  - {}", task.name);
        let deps = graph.dependencies_of(&task.name);
        if !deps.is_empty() {
            println!("      after: {:?}", deps);
        }
        if task.retries > 0 {
            println!("      retries: {}", task.retries);
        }
        for expr in task.when.iter() {
            println!(
                "      when: {} {:?} {:?}",
                expr.input, expr.operator, expr.values
            );
        }
        for condition in task.conditions.iter() {
            println!("      condition: {}", condition.condition_ref);
        }
    }

    if !pipeline.finally.is_empty() {
        println!();
        println!("finally ({}):", pipeline.finally.len());
        for task in pipeline.finally.iter() {
            println!("  - {}", task.name);
            if task.retries > 0 {
                println!("      retries: {}", task.retries);
            }
        }
    }

    let roots: Vec<&str> = graph.roots().collect();
    println!();
    println!("roots: {:?}", roots);

    debug!("dry-run complete (no execution)");
    Ok(())
}
