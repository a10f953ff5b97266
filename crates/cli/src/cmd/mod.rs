mod build;
mod env;
mod run;

pub use build::cmd_build;
pub use env::cmd_env;
pub use run::cmd_run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use pocketcc_lib::build::{BuildError, BuildRequest, BuildResult, Engine};
use pocketcc_lib::exec::OutputSink;
use pocketcc_lib::source::{SourceFile, SourceSet};
use tracing::debug;

/// Exit code used when the user stopped the build or program.
const INTERRUPTED_EXIT: i32 = 130;

fn source_set(files: &[PathBuf]) -> Result<SourceSet> {
  files
    .iter()
    .map(|file| -> Result<SourceFile> {
      let path = std::path::absolute(file).with_context(|| format!("Invalid path: {}", file.display()))?;
      Ok(SourceFile::on_disk(path))
    })
    .collect()
}

/// Run a build in the background; Ctrl-C cancels it.
async fn build_interruptible(
  engine: &Engine,
  request: BuildRequest,
  sink: Box<dyn OutputSink>,
) -> Result<BuildResult, BuildError> {
  let task = engine.spawn_build(request, sink, None);
  let token = task.cancel_token();
  let watcher = tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      debug!("interrupted, cancelling");
      token.cancel();
    }
  });

  let result = task.join().await;
  watcher.abort();
  result
}
