//! Command line synthesis.
//!
//! A single function turns a `ToolchainProfile` into the argument vector for
//! the toolchain. The command line is rebuilt for every request because it
//! depends on the current settings and the current source text.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::build::types::{Artifact, ArtifactKind, ConfigError};
use crate::settings::Settings;
use crate::source::{SourceSet, base_name, parent_dir};
use crate::target::{ProfileKind, ToolchainProfile};
use crate::toolchain::Toolchain;

/// Program plus ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
  pub program: String,
  pub args: Vec<String>,
}

impl CommandLine {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
    }
  }

  pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
    self.args.push(arg.into());
    self
  }

  pub fn path_arg(&mut self, path: &Path) -> &mut Self {
    self.arg(path.to_string_lossy())
  }

  /// Append `arg` unless an identical argument is already present.
  pub fn arg_once(&mut self, arg: &str) -> &mut Self {
    if !self.contains(arg) {
      self.args.push(arg.to_string());
    }
    self
  }

  pub fn contains(&self, arg: &str) -> bool {
    self.args.iter().any(|a| a == arg)
  }

  pub fn count(&self, arg: &str) -> usize {
    self.args.iter().filter(|a| *a == arg).count()
  }
}

impl fmt::Display for CommandLine {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program)?;
    for arg in &self.args {
      write!(f, " {}", arg)?;
    }
    Ok(())
  }
}

/// The artifact a profile writes for `primary`, or `None` for make.
pub fn planned_artifact(kind: ProfileKind, primary: &Path) -> Option<Artifact> {
  let dir = parent_dir(primary);
  let base = base_name(primary);
  match kind {
    ProfileKind::Executable => Some(Artifact {
      path: dir.join(base),
      kind: ArtifactKind::Executable,
    }),
    ProfileKind::NativeActivity | ProfileKind::SdlActivity => Some(Artifact {
      path: dir.join(shared_object_name(&base)),
      kind: ArtifactKind::SharedObject,
    }),
    ProfileKind::Make => None,
  }
}

fn shared_object_name(base: &str) -> String {
  format!("lib{}.so", base)
}

/// Everything the synthesizer reads.
pub struct SynthesisInput<'a> {
  pub profile: Option<&'a ToolchainProfile>,
  pub sources: &'a SourceSet,
  pub settings: &'a Settings,
  pub toolchain: &'a Toolchain,
  pub inferred: &'a BTreeSet<String>,
}

/// Build the command line for a request.
///
/// For compiler profiles the sections are appended in this order: sources,
/// target-specific flags, user flags, default link flags, system include
/// paths, inferred link flags. Link flags are never repeated, so a library
/// that is both a default and inferred appears once.
pub fn synthesize(input: &SynthesisInput<'_>) -> Result<CommandLine, ConfigError> {
  let profile = input.profile.ok_or(ConfigError::MissingProfile)?;
  let primary = input.sources.primary().ok_or(ConfigError::EmptySourceSet)?;

  let mut cmd = CommandLine::new(&profile.program);

  if profile.kind == ProfileKind::Make {
    cmd.arg("-f").path_arg(&primary.path);
    return Ok(cmd);
  }

  for path in input.sources.paths() {
    cmd.path_arg(path);
  }

  let tc = input.toolchain;
  let dir = parent_dir(&primary.path);
  let base = base_name(&primary.path);

  match profile.kind {
    ProfileKind::Executable => {
      cmd.arg("-o").path_arg(&dir.join(&base));
    }
    ProfileKind::NativeActivity => {
      let lib = shared_object_name(&base);
      cmd
        .arg(format!("-I{}", tc.glue_dir().display()))
        .path_arg(&tc.glue_source())
        .arg(format!("-Wl,-soname,{}", lib))
        .arg("-shared")
        .arg("-Wl,--no-undefined")
        .arg("-Wl,-z,noexecstack")
        .arg("-o")
        .path_arg(&dir.join(lib));
    }
    ProfileKind::SdlActivity => {
      cmd
        .arg(format!("-I{}", tc.sdl_include_dir().display()))
        .arg("-shared")
        .path_arg(&tc.sdl_bootstrap_object())
        .arg(format!("-L{}", tc.lib_dir().display()))
        .arg("-o")
        .path_arg(&dir.join(shared_object_name(&base)));
    }
    ProfileKind::Make => unreachable!("handled above"),
  }

  for flag in &profile.platform_flags {
    cmd.arg(flag);
  }

  if let Some(language) = profile.language {
    for flag in input.settings.flags_for(language) {
      cmd.arg(flag);
    }
  }

  for flag in &input.settings.default_link_flags {
    cmd.arg_once(flag);
  }

  for dir in system_include_dirs(tc, input.settings) {
    cmd.arg(format!("-I{}", dir.display()));
  }

  for flag in input.inferred {
    cmd.arg_once(flag);
  }

  Ok(cmd)
}

fn system_include_dirs(tc: &Toolchain, settings: &Settings) -> Vec<PathBuf> {
  let mut dirs = vec![tc.include_dir()];
  dirs.extend(settings.include_paths.iter().cloned());
  dirs
}
