// src/dag/task.rs

//! Immutable per-run task declarations.

use crate::config::model::TaskConfig;
use crate::dag::reference::{resolve_result_refs, result_refs, ResultRef};
use crate::types::WhenOperator;

/// A task parameter. Values may embed result references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: String,
}

/// A `when` guard: `input` must (or must not) be one of `values`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhenExpression {
    pub input: String,
    pub operator: WhenOperator,
    pub values: Vec<String>,
}

impl WhenExpression {
    /// Evaluate the guard, resolving result references through `lookup`.
    ///
    /// Returns `None` when a referenced result is not available yet.
    pub fn evaluate<F>(&self, mut lookup: F) -> Option<bool>
    where
        F: FnMut(&ResultRef) -> Option<String>,
    {
        let input = resolve_result_refs(&self.input, &mut lookup)?;
        let values = self
            .values
            .iter()
            .map(|v| resolve_result_refs(v, &mut lookup))
            .collect::<Option<Vec<_>>>()?;

        let contained = values.iter().any(|v| *v == input);
        Some(match self.operator {
            WhenOperator::In => contained,
            WhenOperator::NotIn => !contained,
        })
    }

    fn result_references(&self) -> impl Iterator<Item = ResultRef> + '_ {
        std::iter::once(self.input.as_str())
            .chain(self.values.iter().map(String::as_str))
            .flat_map(result_refs)
    }
}

/// A legacy condition gating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCondition {
    pub condition_ref: String,
}

/// Task declaration: a named node in the run's graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineTask {
    pub name: String,
    /// Explicit `run_after` ordering.
    pub run_after: Vec<String>,
    /// Retry budget.
    pub retries: u32,
    pub params: Vec<Param>,
    pub when: Vec<WhenExpression>,
    pub conditions: Vec<TaskCondition>,
}

impl PipelineTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            run_after: Vec::new(),
            retries: 0,
            params: Vec::new(),
            when: Vec::new(),
            conditions: Vec::new(),
        }
    }

    pub fn from_config(cfg: &TaskConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            run_after: cfg.run_after.clone(),
            retries: cfg.retries,
            params: cfg
                .params
                .iter()
                .map(|p| Param {
                    name: p.name.clone(),
                    value: p.value.clone(),
                })
                .collect(),
            when: cfg
                .when
                .iter()
                .map(|w| WhenExpression {
                    input: w.input.clone(),
                    operator: w.operator,
                    values: w.values.clone(),
                })
                .collect(),
            conditions: cfg
                .conditions
                .iter()
                .map(|c| TaskCondition {
                    condition_ref: c.condition_ref.clone(),
                })
                .collect(),
        }
    }

    /// Every result reference in params and guards, in order of appearance.
    pub fn result_references(&self) -> Vec<ResultRef> {
        self.params
            .iter()
            .flat_map(|p| result_refs(&p.value))
            .chain(self.when.iter().flat_map(|w| w.result_references()))
            .collect()
    }

    /// Full dependency list: `run_after` followed by the tasks whose results
    /// are referenced, without duplicates, in first-seen order.
    pub fn dependencies(&self) -> Vec<String> {
        let mut deps: Vec<String> = Vec::new();
        let implicit = self.result_references().into_iter().map(|r| r.task);

        for dep in self.run_after.iter().cloned().chain(implicit) {
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }

        deps
    }
}
