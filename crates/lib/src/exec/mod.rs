//! Subprocess execution inside a pseudo-terminal.
//!
//! This module provides:
//! - `pty`: pseudo-terminal allocation
//! - `launch`: executable resolution (ELF, shebang, plain script) and spawning
//! - `pump`: draining and normalizing terminal output
//! - `supervisor`: waiting, process-group cancellation and the `CancelToken`

pub mod launch;
pub mod pty;
pub mod pump;
pub mod supervisor;

use std::io;

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub use launch::{ExecKind, Launcher, ProcessHandle};
pub use pump::{NullSink, OutputPump, OutputSink, normalize_line};
pub use supervisor::{CancelToken, ProcessSupervisor};

/// Chunks of bytes typed into the terminal.
pub type InputReceiver = mpsc::UnboundedReceiver<Vec<u8>>;

/// What came out of one supervised process.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
  pub exit_code: i32,
  /// Normalized output lines joined with newlines.
  pub output: String,
}

/// Drive a spawned process to completion.
///
/// The wait and the output drain run concurrently; the drain continues past
/// the child's exit until the pty reports end-of-stream. The master side is
/// closed on every path out of this function.
pub async fn supervise(
  handle: ProcessHandle,
  cancel: &CancelToken,
  sink: &mut dyn OutputSink,
  input: Option<InputReceiver>,
) -> io::Result<ProcessOutcome> {
  let ProcessHandle { pid, child, master } = handle;

  let mut supervisor = ProcessSupervisor::new(child, pid)?;
  cancel.attach(supervisor.pgid());

  let writer = match input {
    Some(rx) => Some((master.try_clone()?, rx)),
    None => None,
  };

  let (tx, mut rx) = mpsc::unbounded_channel();
  let pump = tokio::task::spawn_blocking(move || OutputPump::new(master).drain(tx));

  let feeder = writer.map(|(file, rx)| tokio::spawn(feed_input(tokio::fs::File::from_std(file), rx)));

  let mut lines: Vec<String> = Vec::new();
  let collect = async {
    while let Some(line) = rx.recv().await {
      sink.on_line(&line);
      lines.push(line);
    }
  };

  let (status, ()) = tokio::join!(supervisor.wait(), collect);
  cancel.detach();

  // Dropping the aborted task closes its copy of the master.
  if let Some(feeder) = feeder {
    feeder.abort();
  }

  match pump.await {
    Ok(Ok(count)) => debug!(pid, lines = count, "output pump finished"),
    Ok(Err(e)) => warn!(pid, error = %e, "output pump stopped early"),
    Err(e) => warn!(pid, error = %e, "output pump task failed"),
  }

  Ok(ProcessOutcome {
    exit_code: status?,
    output: lines.join("\n"),
  })
}

async fn feed_input(mut master: tokio::fs::File, mut rx: InputReceiver) {
  while let Some(chunk) = rx.recv().await {
    if let Err(e) = write_chunk(&mut master, &chunk).await {
      debug!(error = %e, "terminal input closed");
      break;
    }
  }
}

async fn write_chunk(master: &mut tokio::fs::File, chunk: &[u8]) -> io::Result<()> {
  master.write_all(chunk).await?;
  master.flush().await
}
