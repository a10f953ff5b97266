//! Implementation of the `pcc build` command.
//!
//! Diagnostics are streamed to stdout as the toolchain produces them, then a
//! one-line summary is printed. With `--json` nothing is streamed and the
//! whole `BuildResult` is printed instead.

use std::path::PathBuf;

use anyhow::{Context, Result};

use pocketcc_lib::build::{BuildRequest, BuildResult, Engine};
use pocketcc_lib::exec::{NullSink, OutputSink};
use pocketcc_lib::target::BuildMode;

use super::{INTERRUPTED_EXIT, build_interruptible, source_set};
use crate::output::{format_duration, print_error, print_json, print_success, print_warning};

/// Returns the process exit code: 0 on success, the toolchain's code on failure.
pub fn cmd_build(files: &[PathBuf], mode: BuildMode, json: bool) -> Result<i32> {
  let engine = Engine::from_env().context("Failed to load settings")?;
  let request = BuildRequest::new(source_set(files)?, mode);

  let sink: Box<dyn OutputSink> = if json {
    Box::new(NullSink)
  } else {
    Box::new(|line: &str| println!("{}", line))
  };

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let result = rt.block_on(build_interruptible(&engine, request, sink))?;

  if json {
    print_json(&result)?;
  } else {
    report(&result);
  }

  Ok(exit_code(&result))
}

fn report(result: &BuildResult) {
  let elapsed = format_duration(result.elapsed());
  if result.cancelled() {
    print_warning(&format!("Build cancelled after {}", elapsed));
  } else if !result.is_success() {
    print_error(&format!("Build failed with exit code {} ({})", result.exit_code(), elapsed));
  } else if let Some(path) = result.artifact_path() {
    print_success(&format!("Built {} in {}", path.display(), elapsed));
  } else {
    print_success(&format!("Finished in {}", elapsed));
  }
}

pub(super) fn exit_code(result: &BuildResult) -> i32 {
  if result.cancelled() {
    INTERRUPTED_EXIT
  } else if result.exit_code() > 0 {
    result.exit_code()
  } else if result.exit_code() < 0 {
    1
  } else {
    0
  }
}
