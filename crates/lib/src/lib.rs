//! pocketcc-lib: the on-device build-and-run engine
//!
//! Turns a set of C/C++ sources into a toolchain invocation, infers link
//! libraries from the source text, runs the toolchain inside a
//! pseudo-terminal and reports a structured result:
//! - `target`: picks the `ToolchainProfile` for a request
//! - `scan`: infers link flags from `#include` lines
//! - `args`: synthesizes the command line
//! - `exec`: pty spawning, output normalization, process-group cancellation
//! - `build`: the pipeline, `BuildResult` and the working-directory lock

#[cfg(not(unix))]
compile_error!("pocketcc-lib needs pseudo-terminals and process groups and only builds on unix");

pub mod args;
pub mod build;
pub mod consts;
pub mod exec;
pub mod platform;
pub mod scan;
pub mod settings;
pub mod source;
pub mod target;
pub mod toolchain;
pub mod util;
