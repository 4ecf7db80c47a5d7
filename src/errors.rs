// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RundagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Duplicate task name: {0}")]
    DuplicateName(String),

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    /// Raised by the schedulable-frontier query when the caller reports tasks
    /// as done whose ancestors are not done (or that are not in the graph).
    #[error(
        "invalid list of done tasks; some tasks were indicated completed without ancestors being done: {0:?}"
    )]
    InvalidDoneSet(Vec<String>),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RundagError>;
