// src/exec/backend.rs

//! Pluggable launcher abstraction.
//!
//! The runtime talks to a `Launcher` instead of a concrete execution
//! backend, so tests can swap in a fake that records requests and emits
//! completions directly.

use std::future::Future;
use std::pin::Pin;

use crate::engine::LaunchRequest;
use crate::errors::Result;

/// Creates and stops executions on behalf of the runtime.
///
/// Implementations report outcomes asynchronously by sending
/// `RuntimeEvent`s to the runtime channel.
pub trait Launcher: Send {
    /// Create the requested condition checks or executions.
    fn launch(
        &mut self,
        requests: Vec<LaunchRequest>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Stop the named executions. Unknown names are ignored.
    fn cancel(
        &mut self,
        task_runs: Vec<String>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
