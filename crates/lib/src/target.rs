//! Toolchain profile selection.
//!
//! Maps the primary source file and the requested build mode onto a single
//! `ToolchainProfile` record. There is no profile hierarchy: the C and C++
//! profiles differ only in the data they carry.

use serde::{Deserialize, Serialize};

use crate::build::types::ConfigError;
use crate::source::{Language, SourceSet};

/// How the user asked for the sources to be built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildMode {
  /// A standalone executable.
  #[default]
  Executable,
  /// A shared library loaded by the native-activity glue launcher.
  NativeActivity,
  /// A shared library loaded by the SDL launcher.
  Sdl,
  /// Hand the primary file to `make -f`.
  Make,
}

/// The kind of toolchain invocation a profile describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
  Executable,
  NativeActivity,
  SdlActivity,
  Make,
}

impl ProfileKind {
  /// Whether a successful run of this profile leaves an artifact behind.
  pub fn produces_artifact(&self) -> bool {
    !matches!(self, ProfileKind::Make)
  }
}

/// Everything needed to build a command line for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainProfile {
  pub kind: ProfileKind,
  /// Program name resolved through the toolchain `PATH`.
  pub program: String,
  /// Language of the primary file; selects which user flags apply.
  pub language: Option<Language>,
  /// Flags required by the platform for this kind of output.
  pub platform_flags: Vec<String>,
}

impl ToolchainProfile {
  fn compiler(kind: ProfileKind, language: Language) -> Self {
    let program = match language {
      Language::C => "gcc",
      Language::Cxx => "g++",
    };
    let platform_flags = match kind {
      ProfileKind::Executable => vec!["-fPIE".to_string(), "-pie".to_string()],
      _ => vec!["-fPIC".to_string()],
    };
    Self {
      kind,
      program: program.to_string(),
      language: Some(language),
      platform_flags,
    }
  }

  fn make() -> Self {
    Self {
      kind: ProfileKind::Make,
      program: "make".to_string(),
      language: None,
      platform_flags: Vec::new(),
    }
  }
}

/// Pick the profile for a request.
///
/// Only the primary (first) file is inspected. The remaining files are passed
/// to the compiler as translation units whatever their extension.
pub fn select_profile(sources: &SourceSet, mode: BuildMode) -> Result<ToolchainProfile, ConfigError> {
  let primary = sources.primary().ok_or(ConfigError::EmptySourceSet)?;

  let kind = match mode {
    BuildMode::Make => return Ok(ToolchainProfile::make()),
    BuildMode::Executable => ProfileKind::Executable,
    BuildMode::NativeActivity => ProfileKind::NativeActivity,
    BuildMode::Sdl => ProfileKind::SdlActivity,
  };

  let language = primary.language().ok_or_else(|| ConfigError::UnrecognizedExtension {
    path: primary.path.clone(),
  })?;

  Ok(ToolchainProfile::compiler(kind, language))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::SourceFile;

  fn single(path: &str) -> SourceSet {
    SourceSet::new(vec![SourceFile::new(path, "")])
  }

  #[test]
  fn c_source_selects_gcc() {
    let profile = select_profile(&single("/a/x.c"), BuildMode::Executable).unwrap();
    assert_eq!(profile.program, "gcc");
    assert_eq!(profile.kind, ProfileKind::Executable);
    assert_eq!(profile.language, Some(Language::C));
  }

  #[test]
  fn cxx_sources_select_gxx() {
    for path in ["/a/x.cc", "/a/x.cpp", "/a/x.cxx"] {
      let profile = select_profile(&single(path), BuildMode::Executable).unwrap();
      assert_eq!(profile.program, "g++", "{}", path);
    }
  }

  #[test]
  fn unrecognized_extension_is_rejected() {
    let err = select_profile(&single("/a/x.rs"), BuildMode::Executable).unwrap_err();
    assert!(matches!(err, ConfigError::UnrecognizedExtension { .. }));
  }

  #[test]
  fn empty_set_is_rejected() {
    let err = select_profile(&SourceSet::default(), BuildMode::Executable).unwrap_err();
    assert!(matches!(err, ConfigError::EmptySourceSet));
  }

  #[test]
  fn only_primary_extension_matters() {
    let sources = SourceSet::new(vec![SourceFile::new("/a/main.c", ""), SourceFile::new("/a/notes.txt", "")]);
    assert!(select_profile(&sources, BuildMode::Executable).is_ok());
  }

  #[test]
  fn make_mode_ignores_extension() {
    let profile = select_profile(&single("/a/Makefile"), BuildMode::Make).unwrap();
    assert_eq!(profile.program, "make");
    assert!(!profile.kind.produces_artifact());
  }

  #[test]
  fn shared_targets_use_pic() {
    let profile = select_profile(&single("/a/x.c"), BuildMode::NativeActivity).unwrap();
    assert_eq!(profile.kind, ProfileKind::NativeActivity);
    assert_eq!(profile.platform_flags, vec!["-fPIC"]);

    let profile = select_profile(&single("/a/x.cpp"), BuildMode::Sdl).unwrap();
    assert_eq!(profile.kind, ProfileKind::SdlActivity);
  }
}
