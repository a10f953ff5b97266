//! Types for build requests and their outcome.
//!
//! This module defines the error types and the `BuildResult` value returned
//! for every build request that got as far as the toolchain.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::build::lock::LockError;

/// Problems with the request itself. Detected before anything is spawned.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("no source files given")]
  EmptySourceSet,

  #[error("not a C or C++ source file: {}", path.display())]
  UnrecognizedExtension { path: PathBuf },

  #[error("no toolchain profile resolved for this request")]
  MissingProfile,

  #[error("{} is a shared object and cannot be run directly", path.display())]
  NotRunnable { path: PathBuf },

  #[error("invalid settings file {}: {message}", path.display())]
  InvalidSettings { path: PathBuf, message: String },
}

/// Errors that abort a build before a `BuildResult` exists.
///
/// A compiler that runs and exits non-zero is not an error; see `BuildResult`.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error("configuration error: {0}")]
  Configuration(#[from] ConfigError),

  /// The OS refused to create the process or its terminal.
  #[error("failed to spawn {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// Another build owns the working directory.
  #[error("{0}")]
  Busy(#[from] LockError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// What a successful build produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactKind {
  Executable,
  SharedObject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
  pub path: PathBuf,
  pub kind: ArtifactKind,
}

/// Outcome of one build request.
///
/// The artifact is only ever present when the toolchain exited with 0, the
/// build was not cancelled, and the profile produces one (make does not).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
  exit_code: i32,
  diagnostics: String,
  #[serde(rename = "elapsedMs", serialize_with = "as_millis")]
  elapsed: Duration,
  cancelled: bool,
  artifact: Option<Artifact>,
}

impl BuildResult {
  /// Combine the pieces of a finished build.
  ///
  /// `planned` is the artifact the command line was built to produce, if any.
  /// It is dropped unless the build succeeded and was not cancelled.
  pub fn assemble(
    exit_code: i32,
    diagnostics: String,
    elapsed: Duration,
    planned: Option<Artifact>,
    cancelled: bool,
  ) -> Self {
    let artifact = if exit_code == 0 && !cancelled { planned } else { None };
    Self {
      exit_code,
      diagnostics,
      elapsed,
      cancelled,
      artifact,
    }
  }

  pub fn exit_code(&self) -> i32 {
    self.exit_code
  }

  pub fn diagnostics(&self) -> &str {
    &self.diagnostics
  }

  pub fn elapsed(&self) -> Duration {
    self.elapsed
  }

  pub fn cancelled(&self) -> bool {
    self.cancelled
  }

  pub fn artifact(&self) -> Option<&Artifact> {
    self.artifact.as_ref()
  }

  pub fn artifact_path(&self) -> Option<&Path> {
    self.artifact.as_ref().map(|a| a.path.as_path())
  }

  /// True when the toolchain ran to completion and reported success.
  pub fn is_success(&self) -> bool {
    self.exit_code == 0 && !self.cancelled
  }
}

/// Outcome of running a program (a built executable) in a terminal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
  pub exit_code: i32,
  pub output: String,
  #[serde(rename = "elapsedMs", serialize_with = "as_millis")]
  pub elapsed: Duration,
  pub cancelled: bool,
}

fn as_millis<S: serde::Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
  serializer.serialize_u64(elapsed.as_millis() as u64)
}
