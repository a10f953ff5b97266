//! Implementation of the `pcc run` command.
//!
//! Builds an executable from the sources, then runs it in a pty. Build
//! diagnostics go to stderr; the program's output goes to stdout and
//! whatever arrives on our stdin is typed into its terminal.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tracing::debug;

use pocketcc_lib::build::{BuildRequest, Engine};
use pocketcc_lib::exec::{CancelToken, InputReceiver};
use pocketcc_lib::target::BuildMode;

use super::build::exit_code;
use super::{INTERRUPTED_EXIT, build_interruptible, source_set};
use crate::output::{print_error, print_warning};

/// End-of-file for a terminal in canonical mode.
const EOF_CHAR: u8 = 0x04;

pub fn cmd_run(files: &[PathBuf], args: &[String]) -> Result<i32> {
  let engine = Engine::from_env().context("Failed to load settings")?;
  let request = BuildRequest::new(source_set(files)?, BuildMode::Executable);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let code = rt.block_on(build_and_run(&engine, request, args));
  // The stdin reader may still be parked in a blocking read.
  rt.shutdown_background();
  code
}

async fn build_and_run(engine: &Engine, request: BuildRequest, args: &[String]) -> Result<i32> {
  let build = build_interruptible(engine, request, Box::new(|line: &str| eprintln!("{}", line))).await?;

  if !build.is_success() {
    if !build.cancelled() {
      print_error(&format!("Build failed with exit code {}", build.exit_code()));
    }
    return Ok(exit_code(&build));
  }

  let Some(program) = build.artifact_path() else {
    bail!("Build succeeded but produced no executable");
  };

  let cancel = CancelToken::new();
  let token = cancel.clone();
  let watcher = tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      debug!("interrupted, cancelling");
      token.cancel();
    }
  });

  let mut sink = |line: &str| println!("{}", line);
  let result = engine
    .run_program(program, args, &mut sink, &cancel, Some(forward_stdin()))
    .await;
  watcher.abort();
  let result = result.with_context(|| format!("Failed to run {}", program.display()))?;

  if result.cancelled {
    print_warning("Program stopped");
    return Ok(INTERRUPTED_EXIT);
  }
  Ok(result.exit_code)
}

/// Copy our stdin into a channel; end-of-file becomes `^D` for the program.
fn forward_stdin() -> InputReceiver {
  let (tx, rx) = mpsc::unbounded_channel();
  tokio::spawn(async move {
    let mut stdin = tokio::io::stdin();
    let mut buf = [0u8; 1024];
    loop {
      match stdin.read(&mut buf).await {
        Ok(0) | Err(_) => {
          let _ = tx.send(vec![EOF_CHAR]);
          break;
        }
        Ok(n) => {
          if tx.send(buf[..n].to_vec()).is_err() {
            break;
          }
        }
      }
    }
  });
  rx
}
