// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{PipelineFile, RawPipelineFile};
use crate::errors::Result;

/// Load a pipeline file from a given path and return the raw `RawPipelineFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation (names, DAG correctness, etc.). Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPipelineFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let raw: RawPipelineFile = toml::from_str(&contents)?;
    debug!(
        path = %path.display(),
        tasks = raw.task.len(),
        finally = raw.finally.len(),
        "parsed pipeline file"
    );

    Ok(raw)
}

/// Load a pipeline file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for duplicate names, unknown dependencies, cycles, and
///   snapshots or scripts that mention undeclared tasks.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PipelineFile> {
    let raw = load_from_path(&path)?;
    PipelineFile::try_from(raw)
}
