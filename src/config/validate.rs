// src/config/validate.rs

use std::collections::HashSet;

use crate::config::duration::parse_duration;
use crate::config::model::{PipelineFile, RawPipelineFile, RunSettings, TaskConfig};
use crate::dag::{DagGraph, PipelineTask};
use crate::errors::{Result, RundagError};

impl TryFrom<RawPipelineFile> for PipelineFile {
    type Error = RundagError;

    fn try_from(raw: RawPipelineFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_pipeline(&raw)?;

        let timeout = match raw.run.timeout.as_deref() {
            Some(s) => Some(parse_duration(s).map_err(config_error("[run].timeout"))?),
            None => None,
        };
        let resync_interval = parse_duration(&raw.config.resync_interval)
            .map_err(config_error("[config].resync_interval"))?;

        Ok(PipelineFile {
            run: RunSettings {
                name: raw.run.name,
                timeout,
            },
            resync_interval,
            tasks: raw.task.iter().map(PipelineTask::from_config).collect(),
            finally: raw.finally.iter().map(PipelineTask::from_config).collect(),
            observed: raw.observed,
            simulate: raw.simulate,
        })
    }
}

/// Run semantic validation against a raw pipeline file.
///
/// This checks:
/// - there is at least one main task and a non-empty run name
/// - duration strings parse, and the resync interval is non-zero
/// - task names are unique across both sections
/// - finally tasks carry no ordering or guards
/// - all dependencies (explicit and via result references) name main tasks
/// - the main tasks form a DAG
/// - `[[observed]]` and `[simulate.*]` only mention declared tasks/conditions
pub fn validate_raw_pipeline(cfg: &RawPipelineFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_run_settings(cfg)?;
    validate_unique_names(cfg)?;
    validate_finally_tasks(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    validate_observed(cfg)?;
    validate_simulate(cfg)?;
    Ok(())
}

fn config_error(field: &'static str) -> impl Fn(String) -> RundagError {
    move |e| RundagError::ConfigError(format!("invalid {field}: {e}"))
}

fn ensure_has_tasks(cfg: &RawPipelineFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(RundagError::ConfigError(
            "pipeline must contain at least one [[task]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_run_settings(cfg: &RawPipelineFile) -> Result<()> {
    if cfg.run.name.trim().is_empty() {
        return Err(RundagError::ConfigError(
            "[run].name must not be empty".to_string(),
        ));
    }

    if let Some(timeout) = cfg.run.timeout.as_deref() {
        parse_duration(timeout).map_err(config_error("[run].timeout"))?;
    }

    let resync = parse_duration(&cfg.config.resync_interval)
        .map_err(config_error("[config].resync_interval"))?;
    if resync.is_zero() {
        return Err(RundagError::ConfigError(
            "[config].resync_interval must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_unique_names(cfg: &RawPipelineFile) -> Result<()> {
    let mut seen = HashSet::new();
    for task in cfg.task.iter().chain(cfg.finally.iter()) {
        if task.name.trim().is_empty() {
            return Err(RundagError::ConfigError(
                "task names must not be empty".to_string(),
            ));
        }
        if !seen.insert(task.name.as_str()) {
            return Err(RundagError::DuplicateName(task.name.clone()));
        }
    }
    Ok(())
}

fn validate_finally_tasks(cfg: &RawPipelineFile) -> Result<()> {
    for task in cfg.finally.iter() {
        if !task.run_after.is_empty() {
            return Err(RundagError::ConfigError(format!(
                "finally task '{}' cannot declare `run_after`",
                task.name
            )));
        }
        if !task.when.is_empty() || !task.conditions.is_empty() {
            return Err(RundagError::ConfigError(format!(
                "finally task '{}' cannot declare `when` or `conditions`",
                task.name
            )));
        }
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawPipelineFile) -> Result<()> {
    let main: HashSet<&str> = cfg.task.iter().map(|t| t.name.as_str()).collect();

    for task in cfg.task.iter() {
        for dep in PipelineTask::from_config(task).dependencies() {
            check_dependency(&main, task, &dep, "main")?;
        }
    }

    for task in cfg.finally.iter() {
        for reference in PipelineTask::from_config(task).result_references() {
            check_dependency(&main, task, &reference.task, "result reference")?;
        }
    }

    Ok(())
}

fn check_dependency(main: &HashSet<&str>, task: &TaskConfig, dep: &str, kind: &str) -> Result<()> {
    if dep == task.name {
        return Err(RundagError::ConfigError(format!(
            "task '{}' cannot depend on itself",
            task.name
        )));
    }
    if !main.contains(dep) {
        return Err(RundagError::ConfigError(format!(
            "task '{}' has unknown dependency '{}' ({} tasks only)",
            task.name, dep, kind
        )));
    }
    Ok(())
}

fn validate_dag(cfg: &RawPipelineFile) -> Result<()> {
    let tasks: Vec<PipelineTask> = cfg.task.iter().map(PipelineTask::from_config).collect();
    let finally: Vec<PipelineTask> = cfg.finally.iter().map(PipelineTask::from_config).collect();

    DagGraph::build(&tasks)?;
    DagGraph::build_unlinked(&finally)?;
    Ok(())
}

fn validate_observed(cfg: &RawPipelineFile) -> Result<()> {
    let mut seen = HashSet::new();

    for observed in cfg.observed.iter() {
        let declared = cfg
            .task
            .iter()
            .chain(cfg.finally.iter())
            .find(|t| t.name == observed.task)
            .ok_or_else(|| {
                RundagError::ConfigError(format!(
                    "[[observed]] refers to unknown task '{}'",
                    observed.task
                ))
            })?;

        if !seen.insert(observed.task.as_str()) {
            return Err(RundagError::ConfigError(format!(
                "task '{}' has more than one [[observed]] entry",
                observed.task
            )));
        }

        for check in observed.condition_checks.iter() {
            if !declared
                .conditions
                .iter()
                .any(|c| c.condition_ref == check.condition)
            {
                return Err(RundagError::ConfigError(format!(
                    "[[observed]] for task '{}' reports undeclared condition '{}'",
                    observed.task, check.condition
                )));
            }
        }
    }

    Ok(())
}

fn validate_simulate(cfg: &RawPipelineFile) -> Result<()> {
    for (name, script) in cfg.simulate.iter() {
        let declared = cfg
            .task
            .iter()
            .chain(cfg.finally.iter())
            .any(|t| &t.name == name);
        if !declared {
            return Err(RundagError::ConfigError(format!(
                "[simulate.{}] refers to an unknown task",
                name
            )));
        }

        if let Some(delay) = script.delay.as_deref() {
            parse_duration(delay).map_err(|e| {
                RundagError::ConfigError(format!("invalid [simulate.{name}].delay: {e}"))
            })?;
        }
    }
    Ok(())
}
