//! Link-library inference from source text.
//!
//! Each C/C++ translation unit is matched against a fixed table of include
//! patterns. Every row that matches contributes its link flag to a set, so
//! the result does not depend on file order or on how often a header appears.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::source::{SourceFile, SourceSet};

/// Ordered (pattern, link flag) rows.
const RULES: &[(&str, &str)] = &[
  (r"android/[\w/]+\.h", "-landroid"),
  (r"android/log\.h", "-llog"),
  (r"EGL/\w+\.h", "-lEGL"),
  (r"GLES/\w+\.h", "-lGLESv1_CM"),
  (r"GLES2/\w+\.h", "-lGLESv2"),
  (r"GLES3/\w+\.h", "-lGLESv3"),
  (r"SLES/\w+\.h", "-lOpenSLES"),
  (r"math\.h", "-lm"),
  (r"cmath", "-lm"),
  (r"zlib\.h", "-lz"),
  (r"SDL\.h", "-lSDL2"),
  (r"SDL_ttf\.h", "-lSDL2_ttf"),
  (r"SDL_image\.h", "-lSDL2_image"),
  (r"SDL_mixer\.h", "-lSDL2_mixer"),
  (r"SDL_net\.h", "-lSDL2_net"),
];

static TABLE: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
  RULES
    .iter()
    .map(|(header, flag)| {
      // Anchored to an include directive so mentions in comments or strings don't count.
      let pattern = format!(r#"(?m)^\s*#\s*include\s*[<"](?:[\w/]*/)?{}[>"]"#, header);
      let re = Regex::new(&pattern).unwrap_or_else(|e| panic!("bad scan rule {}: {}", header, e));
      (re, *flag)
    })
    .collect()
});

/// A file that could not be read during the scan. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanWarning {
  pub path: PathBuf,
  pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
  pub flags: BTreeSet<String>,
  pub warnings: Vec<ScanWarning>,
}

/// Infer link flags for every recognized translation unit in `sources`.
///
/// Files that are not C/C++ are skipped silently. Files whose text is not
/// supplied are read from disk; a read failure is recorded as a warning and
/// the scan carries on.
pub fn scan_sources(sources: &SourceSet) -> ScanReport {
  let mut report = ScanReport::default();

  for file in sources.files() {
    if file.language().is_none() {
      continue;
    }

    match source_text(file) {
      Ok(text) => scan_text(&text, &mut report.flags),
      Err(e) => {
        warn!(path = %file.path.display(), error = %e, "could not read source for dependency scan");
        report.warnings.push(ScanWarning {
          path: file.path.clone(),
          message: e.to_string(),
        });
      }
    }
  }

  debug!(flags = ?report.flags, "inferred link flags");
  report
}

/// Add the flags of every rule matching `text`.
pub fn scan_text(text: &str, flags: &mut BTreeSet<String>) {
  for (re, flag) in TABLE.iter() {
    if re.is_match(text) {
      flags.insert((*flag).to_string());
    }
  }
}

fn source_text(file: &SourceFile) -> std::io::Result<std::borrow::Cow<'_, str>> {
  match &file.text {
    Some(text) => Ok(std::borrow::Cow::Borrowed(text)),
    None => std::fs::read_to_string(&file.path).map(std::borrow::Cow::Owned),
  }
}
