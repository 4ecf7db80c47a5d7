// src/exec/mod.rs

//! Launch layer.
//!
//! The reconciler never creates executions itself; it hands
//! [`LaunchRequest`](crate::engine::LaunchRequest)s to a [`Launcher`] and
//! learns about outcomes through `RuntimeEvent`s.
//!
//! - [`backend`] provides the `Launcher` trait the runtime talks to.
//! - [`simulated`] provides `SimulatedLauncher`, which plays back the
//!   `[simulate.<task>]` scripts of a pipeline file on Tokio timers.

pub mod backend;
pub mod simulated;

pub use backend::Launcher;
pub use simulated::SimulatedLauncher;
