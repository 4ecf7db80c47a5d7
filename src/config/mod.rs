// src/config/mod.rs

//! Pipeline file loading and validation for rundag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a pipeline file from disk (`loader.rs`).
//! - Validate declarations, dependencies and snapshots (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{
    ConditionConfig, ConfigSection, ObservedConditionCheck, ObservedTaskRun, ParamConfig,
    PipelineFile, RawPipelineFile, RunSection, SimulateConfig, TaskConfig, WhenConfig,
};
pub use validate::validate_raw_pipeline;
