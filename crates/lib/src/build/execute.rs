//! The build-and-run pipeline.
//!
//! A build goes through target selection, dependency scanning and command
//! line synthesis, then takes the working-directory lock and runs the
//! toolchain in a pty until it exits. Everything up to the spawn is
//! synchronous and cheap; the caller can run the whole thing on a
//! background task with [`Engine::spawn_build`].

use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::args::{CommandLine, SynthesisInput, planned_artifact, synthesize};
use crate::build::lock::WorkdirLock;
use crate::build::types::{Artifact, BuildError, BuildResult, ConfigError, RunResult};
use crate::consts::CANCELLED_EXIT_CODE;
use crate::exec::{CancelToken, InputReceiver, Launcher, OutputSink, supervise};
use crate::platform::paths;
use crate::scan::{ScanReport, scan_sources};
use crate::settings::Settings;
use crate::source::{SourceSet, parent_dir};
use crate::target::{BuildMode, ToolchainProfile, select_profile};
use crate::toolchain::Toolchain;

/// One request from the editor: which files, built how.
#[derive(Debug, Clone)]
pub struct BuildRequest {
  pub sources: SourceSet,
  pub mode: BuildMode,
}

impl BuildRequest {
  pub fn new(sources: SourceSet, mode: BuildMode) -> Self {
    Self { sources, mode }
  }
}

/// Everything decided before a process is started.
#[derive(Debug, Clone)]
pub struct BuildPlan {
  pub profile: ToolchainProfile,
  pub command: CommandLine,
  pub working_dir: PathBuf,
  pub artifact: Option<Artifact>,
  pub scan: ScanReport,
}

/// Runs builds and programs against one toolchain with one set of settings.
#[derive(Debug, Clone)]
pub struct Engine {
  toolchain: Toolchain,
  settings: Settings,
  lock_dir: PathBuf,
}

impl Engine {
  pub fn new(toolchain: Toolchain, settings: Settings) -> Self {
    Self {
      toolchain,
      settings,
      lock_dir: paths::lock_dir(),
    }
  }

  /// Toolchain from `POCKETCC_TOOLCHAIN_ROOT`, settings from the settings file.
  pub fn from_env() -> Result<Self, ConfigError> {
    Ok(Self::new(Toolchain::from_env(), Settings::load()?))
  }

  /// Keep working-directory locks in `dir` instead of the default location.
  pub fn with_lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.lock_dir = dir.into();
    self
  }

  pub fn toolchain(&self) -> &Toolchain {
    &self.toolchain
  }

  pub fn settings(&self) -> &Settings {
    &self.settings
  }

  /// Resolve the profile, scan the sources and synthesize the command line.
  pub fn plan(&self, request: &BuildRequest) -> Result<BuildPlan, ConfigError> {
    let profile = select_profile(&request.sources, request.mode)?;
    let primary = request.sources.primary().ok_or(ConfigError::EmptySourceSet)?;

    let scan = scan_sources(&request.sources);
    let command = synthesize(&SynthesisInput {
      profile: Some(&profile),
      sources: &request.sources,
      settings: &self.settings,
      toolchain: &self.toolchain,
      inferred: &scan.flags,
    })?;

    let artifact = if profile.kind.produces_artifact() {
      planned_artifact(profile.kind, &primary.path)
    } else {
      None
    };

    Ok(BuildPlan {
      working_dir: parent_dir(&primary.path),
      profile,
      command,
      artifact,
      scan,
    })
  }

  /// Build `request`, streaming normalized output lines to `sink`.
  ///
  /// A toolchain that runs and fails is a normal result with a non-zero exit
  /// code. Only configuration problems, a busy working directory and spawn
  /// failures are errors.
  pub async fn build(
    &self,
    request: &BuildRequest,
    sink: &mut dyn OutputSink,
    cancel: &CancelToken,
    input: Option<InputReceiver>,
  ) -> Result<BuildResult, BuildError> {
    let started = Instant::now();
    let plan = self.plan(request)?;

    if cancel.is_cancelled() {
      info!(command = %plan.command, "build cancelled before spawn");
      return Ok(BuildResult::assemble(
        CANCELLED_EXIT_CODE,
        String::new(),
        started.elapsed(),
        None,
        true,
      ));
    }

    let command_text = plan.command.to_string();
    let _lock = WorkdirLock::acquire_in(&self.lock_dir, &plan.working_dir, &command_text)?;

    let env = self.toolchain.environment(&self.settings, &plan.working_dir);
    let launcher = Launcher {
      toolchain: &self.toolchain,
      settings: &self.settings,
    };

    info!(command = %command_text, cwd = %plan.working_dir.display(), "starting build");
    let handle = launcher
      .spawn(&plan.command, &plan.working_dir, &env)
      .map_err(|source| BuildError::Spawn {
        program: plan.command.program.clone(),
        source,
      })?;

    let outcome = supervise(handle, cancel, sink, input).await?;
    let cancelled = cancel.is_cancelled();

    let result = BuildResult::assemble(outcome.exit_code, outcome.output, started.elapsed(), plan.artifact, cancelled);
    info!(
      exit_code = result.exit_code(),
      elapsed_ms = result.elapsed().as_millis() as u64,
      cancelled,
      "build finished"
    );
    Ok(result)
  }

  /// Run `request` on a background task.
  pub fn spawn_build(&self, request: BuildRequest, mut sink: Box<dyn OutputSink>, input: Option<InputReceiver>) -> BuildTask {
    let engine = self.clone();
    let cancel = CancelToken::new();
    let token = cancel.clone();
    let handle = tokio::spawn(async move { engine.build(&request, sink.as_mut(), &token, input).await });
    BuildTask { handle, cancel }
  }

  /// Run a built executable (or any script) in a fresh pty.
  ///
  /// Shared objects are rejected: they are loaded by a launcher, not run.
  pub async fn run_program(
    &self,
    program: &Path,
    args: &[String],
    sink: &mut dyn OutputSink,
    cancel: &CancelToken,
    input: Option<InputReceiver>,
  ) -> Result<RunResult, BuildError> {
    let started = Instant::now();
    if is_shared_object(program) {
      return Err(ConfigError::NotRunnable {
        path: program.to_path_buf(),
      }
      .into());
    }

    let program = std::path::absolute(program)?;
    if cancel.is_cancelled() {
      return Ok(RunResult {
        exit_code: CANCELLED_EXIT_CODE,
        output: String::new(),
        elapsed: started.elapsed(),
        cancelled: true,
      });
    }

    let working_dir = parent_dir(&program);
    let mut command = CommandLine::new(program.to_string_lossy());
    for arg in args {
      command.arg(arg);
    }

    let env = self.toolchain.environment(&self.settings, &working_dir);
    let launcher = Launcher {
      toolchain: &self.toolchain,
      settings: &self.settings,
    };
    let handle = launcher
      .spawn(&command, &working_dir, &env)
      .map_err(|source| BuildError::Spawn {
        program: command.program.clone(),
        source,
      })?;

    let outcome = supervise(handle, cancel, sink, input).await?;
    debug!(program = %program.display(), exit_code = outcome.exit_code, "program finished");

    Ok(RunResult {
      exit_code: outcome.exit_code,
      output: outcome.output,
      elapsed: started.elapsed(),
      cancelled: cancel.is_cancelled(),
    })
  }
}

fn is_shared_object(path: &Path) -> bool {
  let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
  name.ends_with(".so") || name.contains(".so.")
}

/// A build running on a background task.
pub struct BuildTask {
  handle: JoinHandle<Result<BuildResult, BuildError>>,
  cancel: CancelToken,
}

impl BuildTask {
  /// Stop the build. Best effort; see [`CancelToken::cancel`].
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  pub fn cancel_token(&self) -> CancelToken {
    self.cancel.clone()
  }

  /// Wait for the build to finish.
  pub async fn join(self) -> Result<BuildResult, BuildError> {
    self.handle.await.map_err(|e| BuildError::Io(io::Error::other(e)))?
  }
}
