//! Source sets handed to the engine by the editor.
//!
//! A `SourceSet` is the ordered, non-empty list of files making up one build
//! request. The first file is the primary one: it decides the toolchain
//! profile and names the produced artifact.

use std::path::{Path, PathBuf};

/// Source languages the engine knows how to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
  C,
  Cxx,
}

const C_EXTENSIONS: &[&str] = &["c"];
const CXX_EXTENSIONS: &[&str] = &["cc", "cpp", "cxx", "c++"];

impl Language {
  /// Classify a path by its extension.
  ///
  /// Returns `None` for anything that is not a C or C++ translation unit,
  /// headers included.
  pub fn from_path(path: &Path) -> Option<Self> {
    let ext = path.extension()?.to_str()?;
    if C_EXTENSIONS.contains(&ext) {
      Some(Language::C)
    } else if CXX_EXTENSIONS.contains(&ext) {
      Some(Language::Cxx)
    } else {
      None
    }
  }
}

/// One file of a build request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
  pub path: PathBuf,
  /// Editor buffer contents. `None` means the file is read from disk when needed.
  pub text: Option<String>,
}

impl SourceFile {
  pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
    Self {
      path: path.into(),
      text: Some(text.into()),
    }
  }

  pub fn on_disk(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      text: None,
    }
  }

  pub fn language(&self) -> Option<Language> {
    Language::from_path(&self.path)
  }
}

/// Ordered list of source files for one build. May be empty; the target
/// selector rejects empty sets before anything else happens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSet {
  files: Vec<SourceFile>,
}

impl SourceSet {
  pub fn new(files: Vec<SourceFile>) -> Self {
    Self { files }
  }

  pub fn primary(&self) -> Option<&SourceFile> {
    self.files.first()
  }

  pub fn files(&self) -> &[SourceFile] {
    &self.files
  }

  pub fn paths(&self) -> impl Iterator<Item = &Path> {
    self.files.iter().map(|f| f.path.as_path())
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }
}

impl FromIterator<SourceFile> for SourceSet {
  fn from_iter<I: IntoIterator<Item = SourceFile>>(iter: I) -> Self {
    Self {
      files: iter.into_iter().collect(),
    }
  }
}

/// Directory of the primary source, used as working directory and artifact location.
pub fn parent_dir(path: &Path) -> PathBuf {
  match path.parent() {
    Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
    _ => PathBuf::from("."),
  }
}

/// File name with everything from the last dot onward removed.
///
/// `foo.c` becomes `foo`, `foo.test.cpp` becomes `foo.test`, `Makefile` is unchanged.
pub fn base_name(path: &Path) -> String {
  let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
  match name.rfind('.') {
    Some(idx) => name[..idx].to_string(),
    None => name.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classifies_c_and_cxx_extensions() {
    assert_eq!(Language::from_path(Path::new("/a/x.c")), Some(Language::C));
    for ext in ["cc", "cpp", "cxx", "c++"] {
      let path = PathBuf::from(format!("/a/x.{}", ext));
      assert_eq!(Language::from_path(&path), Some(Language::Cxx), "{}", ext);
    }
    assert_eq!(Language::from_path(Path::new("/a/x.h")), None);
    assert_eq!(Language::from_path(Path::new("/a/Makefile")), None);
  }

  #[test]
  fn base_name_splits_at_last_dot() {
    assert_eq!(base_name(Path::new("/a/b/foo.c")), "foo");
    assert_eq!(base_name(Path::new("/a/b/foo.test.cpp")), "foo.test");
    assert_eq!(base_name(Path::new("/a/b/Makefile")), "Makefile");
  }

  #[test]
  fn parent_dir_of_bare_name_is_current_dir() {
    assert_eq!(parent_dir(Path::new("foo.c")), PathBuf::from("."));
    assert_eq!(parent_dir(Path::new("/a/b/foo.c")), PathBuf::from("/a/b"));
  }

  #[test]
  fn primary_is_first_file() {
    let set: SourceSet = vec![SourceFile::new("/a/main.c", ""), SourceFile::new("/a/util.cpp", "")]
      .into_iter()
      .collect();
    assert_eq!(set.primary().unwrap().path, PathBuf::from("/a/main.c"));
    assert_eq!(set.len(), 2);
  }
}
