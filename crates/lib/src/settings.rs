//! User build settings.
//!
//! Settings are read from a JSON file (`POCKETCC_SETTINGS`, or
//! `settings.json` in the config directory). Every field is optional; a
//! missing file means defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::build::types::ConfigError;
use crate::consts::{DEFAULT_PTY_COLS, DEFAULT_PTY_ROWS, DEFAULT_TERM, SETTINGS_ENV};
use crate::platform::paths;
use crate::source::Language;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// Extra flags for C translation units.
  pub cflags: Vec<String>,
  /// Extra flags for C++ translation units.
  pub cxxflags: Vec<String>,
  /// Link flags appended to every compiler invocation.
  pub default_link_flags: Vec<String>,
  /// Additional system include directories, searched after the toolchain's.
  pub include_paths: Vec<PathBuf>,
  pub term: Option<String>,
  pub home: Option<PathBuf>,
  pub pty_rows: u16,
  pub pty_cols: u16,
  /// Overrides the shell used for plain scripts.
  pub shell: Option<PathBuf>,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      cflags: Vec::new(),
      cxxflags: Vec::new(),
      default_link_flags: vec!["-lm".to_string(), "-llog".to_string()],
      include_paths: Vec::new(),
      term: None,
      home: None,
      pty_rows: DEFAULT_PTY_ROWS,
      pty_cols: DEFAULT_PTY_COLS,
      shell: None,
    }
  }
}

impl Settings {
  /// Default location of the settings file.
  pub fn default_path() -> PathBuf {
    if let Ok(path) = std::env::var(SETTINGS_ENV) {
      return PathBuf::from(path);
    }
    paths::config_dir().join("settings.json")
  }

  /// Load settings from the default location.
  pub fn load() -> Result<Self, ConfigError> {
    Self::load_from(&Self::default_path())
  }

  /// Load settings from `path`. A file that does not exist yields defaults.
  pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
    let content = match std::fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no settings file, using defaults");
        return Ok(Self::default());
      }
      Err(e) => {
        return Err(ConfigError::InvalidSettings {
          path: path.to_path_buf(),
          message: e.to_string(),
        });
      }
    };

    serde_json::from_str(&content).map_err(|e| ConfigError::InvalidSettings {
      path: path.to_path_buf(),
      message: e.to_string(),
    })
  }

  /// User flags for translation units of `language`.
  pub fn flags_for(&self, language: Language) -> &[String] {
    match language {
      Language::C => &self.cflags,
      Language::Cxx => &self.cxxflags,
    }
  }

  pub fn term(&self) -> &str {
    self.term.as_deref().unwrap_or(DEFAULT_TERM)
  }
}
