// src/dag/mod.rs

//! Task declarations and the dependency graph.
//!
//! - [`task`] holds the immutable per-run task declaration (`PipelineTask`)
//!   and its guards.
//! - [`reference`] extracts `$(tasks.<name>.results.<result>)` references,
//!   which add implicit dependencies.
//! - [`graph`] holds the name-keyed DAG and the schedulable-frontier query.

pub mod graph;
pub mod reference;
pub mod task;

pub use graph::DagGraph;
pub use reference::ResultRef;
pub use task::{Param, PipelineTask, TaskCondition, WhenExpression};
