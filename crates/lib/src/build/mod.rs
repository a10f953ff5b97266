//! Build requests and their execution.
//!
//! # Submodules
//!
//! - [`execute`] - The pipeline: plan, lock, spawn, supervise, assemble
//! - [`lock`] - One build at a time per working directory
//! - [`types`] - `BuildResult`, `RunResult` and the error types

pub mod execute;
pub mod lock;
pub mod types;

pub use execute::{BuildPlan, BuildRequest, BuildTask, Engine};
pub use lock::{LockError, WorkdirLock};
pub use types::*;
