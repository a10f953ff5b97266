//! Toolchain install layout and process environment.
//!
//! The toolchain root is supplied by the host application. Every path the
//! engine needs (binaries, headers, the native-activity glue, the SDL
//! bootstrap object) is derived from it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::consts::TOOLCHAIN_ROOT_ENV;
use crate::platform::paths;
use crate::settings::Settings;

/// Interpreter locations that scripts commonly name in their shebang line.
/// These are swapped for the toolchain's copy of the same program.
const SYSTEM_BIN_DIRS: &[&str] = &["/bin", "/usr/bin", "/usr/local/bin", "/system/bin", "/system/xbin"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
  root: PathBuf,
}

impl Toolchain {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Locate the toolchain from `POCKETCC_TOOLCHAIN_ROOT`, falling back to the data directory.
  pub fn from_env() -> Self {
    if let Ok(path) = std::env::var(TOOLCHAIN_ROOT_ENV) {
      return Self::new(path);
    }
    Self::new(paths::data_dir().join("toolchain"))
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn bin_dir(&self) -> PathBuf {
    self.root.join("bin")
  }

  pub fn include_dir(&self) -> PathBuf {
    self.root.join("include")
  }

  pub fn lib_dir(&self) -> PathBuf {
    self.root.join("lib")
  }

  pub fn tmp_dir(&self) -> PathBuf {
    self.root.join("tmp")
  }

  pub fn glue_dir(&self) -> PathBuf {
    self.root.join("sources").join("native_app_glue")
  }

  pub fn glue_source(&self) -> PathBuf {
    self.glue_dir().join("android_native_app_glue.c")
  }

  pub fn sdl_include_dir(&self) -> PathBuf {
    self.include_dir().join("SDL2")
  }

  pub fn sdl_bootstrap_object(&self) -> PathBuf {
    self.lib_dir().join("SDL_android_main.o")
  }

  /// Directories searched for programs, in order.
  pub fn search_path(&self) -> Vec<PathBuf> {
    vec![self.bin_dir(), self.root.join("usr").join("bin")]
  }

  /// Resolve a bare program name against the toolchain search path.
  ///
  /// Names containing a slash are taken as paths and returned unchanged.
  pub fn find_program(&self, name: &str) -> Option<PathBuf> {
    if name.contains('/') {
      let path = PathBuf::from(name);
      return path.is_file().then_some(path);
    }
    self.search_path().into_iter().map(|dir| dir.join(name)).find(|p| p.is_file())
  }

  /// The toolchain's copy of a program that a script named by absolute system path.
  ///
  /// Returns `None` when `interpreter` is not under a well-known system directory
  /// or the toolchain ships no program of that name.
  pub fn local_interpreter(&self, interpreter: &Path) -> Option<PathBuf> {
    let parent = interpreter.parent()?;
    if !SYSTEM_BIN_DIRS.iter().any(|dir| parent == Path::new(dir)) {
      return None;
    }
    let local = self.bin_dir().join(interpreter.file_name()?);
    local.is_file().then_some(local)
  }

  /// Shell used for files that are neither ELF binaries nor carry a shebang.
  pub fn default_shell(&self, settings: &Settings) -> PathBuf {
    if let Some(shell) = &settings.shell {
      return shell.clone();
    }
    let local = self.bin_dir().join("sh");
    if local.is_file() { local } else { PathBuf::from("/bin/sh") }
  }

  /// Build the complete environment for a process started in `working_dir`.
  ///
  /// The process never inherits the caller's environment; only these keys are set.
  pub fn environment(&self, settings: &Settings, working_dir: &Path) -> Environment {
    let mut env = Environment::default();

    env.set("TERM", settings.term());
    env.set("HOME", settings.home.clone().unwrap_or_else(paths::home_dir).to_string_lossy());
    env.set("LANG", "en_US.UTF-8");
    env.set("TMPDIR", self.tmp_dir().to_string_lossy());

    env.set("PREFIX", self.root.to_string_lossy());
    env.set("LD_LIBRARY_PATH", self.lib_dir().to_string_lossy());
    env.set("PATH", join_paths(&self.search_path()));
    env.set("PWD", working_dir.to_string_lossy());

    env
  }
}

fn join_paths(dirs: &[PathBuf]) -> String {
  dirs
    .iter()
    .map(|d| d.to_string_lossy().into_owned())
    .collect::<Vec<_>>()
    .join(":")
}

/// Unique key/value pairs passed to a spawned process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
  vars: BTreeMap<String, String>,
}

impl Environment {
  /// Set a variable, replacing any earlier value for the key.
  pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
    self.vars.insert(key.into(), value.into());
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.vars.get(key).map(|v| v.as_str())
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn len(&self) -> usize {
    self.vars.len()
  }

  pub fn is_empty(&self) -> bool {
    self.vars.is_empty()
  }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Environment {
  fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
    for (k, v) in iter {
      self.set(k, v);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::TempDir;

  #[test]
  fn layout_follows_root() {
    let tc = Toolchain::new("/tc");
    assert_eq!(tc.bin_dir(), PathBuf::from("/tc/bin"));
    assert_eq!(tc.include_dir(), PathBuf::from("/tc/include"));
    assert_eq!(
      tc.glue_source(),
      PathBuf::from("/tc/sources/native_app_glue/android_native_app_glue.c")
    );
  }

  #[test]
  fn environment_contains_required_keys() {
    let tc = Toolchain::new("/tc");
    let settings = Settings {
      home: Some(PathBuf::from("/home/dev")),
      ..Settings::default()
    };
    let env = tc.environment(&settings, Path::new("/work"));

    assert_eq!(env.get("TERM"), Some("xterm-256color"));
    assert_eq!(env.get("HOME"), Some("/home/dev"));
    assert_eq!(env.get("PREFIX"), Some("/tc"));
    assert_eq!(env.get("LD_LIBRARY_PATH"), Some("/tc/lib"));
    assert_eq!(env.get("PATH"), Some("/tc/bin:/tc/usr/bin"));
    assert_eq!(env.get("PWD"), Some("/work"));
    assert_eq!(env.get("TMPDIR"), Some("/tc/tmp"));
  }

  #[test]
  fn later_values_replace_earlier_ones() {
    let mut env = Environment::default();
    env.set("TERM", "dumb");
    env.extend([("TERM", "vt100")]);
    assert_eq!(env.len(), 1);
    assert_eq!(env.get("TERM"), Some("vt100"));
  }

  #[test]
  fn find_program_searches_bin_dir() {
    let temp = TempDir::new().unwrap();
    let tc = Toolchain::new(temp.path());
    std::fs::create_dir_all(tc.bin_dir()).unwrap();
    std::fs::write(tc.bin_dir().join("gcc"), "").unwrap();

    assert_eq!(tc.find_program("gcc"), Some(tc.bin_dir().join("gcc")));
    assert_eq!(tc.find_program("clang"), None);
  }

  #[test]
  fn system_interpreter_swapped_for_local_copy() {
    let temp = TempDir::new().unwrap();
    let tc = Toolchain::new(temp.path());
    std::fs::create_dir_all(tc.bin_dir()).unwrap();
    std::fs::write(tc.bin_dir().join("bash"), "").unwrap();

    assert_eq!(
      tc.local_interpreter(Path::new("/usr/bin/bash")),
      Some(tc.bin_dir().join("bash"))
    );
    assert_eq!(tc.local_interpreter(Path::new("/opt/bin/bash")), None);
    assert_eq!(tc.local_interpreter(Path::new("/bin/python3")), None);
  }

  #[test]
  #[serial]
  fn root_from_env_var() {
    temp_env::with_var(TOOLCHAIN_ROOT_ENV, Some("/custom/tc"), || {
      assert_eq!(Toolchain::from_env().root(), Path::new("/custom/tc"));
    });
  }
}
