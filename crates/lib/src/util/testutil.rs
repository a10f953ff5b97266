//! Test utilities for pocketcc-lib.
//!
//! Builds throwaway toolchain roots whose "compilers" are shell scripts, so
//! the pipeline can be exercised without a real toolchain installed.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::toolchain::Toolchain;

/// Fake gcc: prints its arguments, then creates whatever `-o` names.
pub const FAKE_CC: &str = r#"#!/bin/sh
echo "cc $*"
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
if [ -n "$out" ]; then : > "$out"; fi
"#;

/// Fake compiler that reports an error and fails.
pub const FAILING_CC: &str = "#!/bin/sh\necho \"\x1b[1m\x1b[31merror:\x1b[0m expected ';'\"\nexit 1\n";

/// A toolchain root in a temporary directory. Removed on drop.
pub struct FakeToolchain {
  pub dir: TempDir,
  pub toolchain: Toolchain,
}

impl FakeToolchain {
  /// An empty root with the standard directories but no programs.
  pub fn empty() -> Self {
    let dir = TempDir::new().unwrap();
    let toolchain = Toolchain::new(dir.path());
    for sub in [toolchain.bin_dir(), toolchain.include_dir(), toolchain.lib_dir(), toolchain.tmp_dir()] {
      std::fs::create_dir_all(sub).unwrap();
    }
    Self { dir, toolchain }
  }

  /// A root whose `gcc` and `g++` are `FAKE_CC`.
  pub fn with_compilers() -> Self {
    let fake = Self::empty();
    fake.add_program("gcc", FAKE_CC);
    fake.add_program("g++", FAKE_CC);
    fake
  }

  /// Write an executable script into `<root>/bin`.
  pub fn add_program(&self, name: &str, script: &str) -> PathBuf {
    let path = self.toolchain.bin_dir().join(name);
    write_executable(&path, script);
    path
  }
}

pub fn write_executable(path: &Path, content: &str) {
  std::fs::write(path, content).unwrap();
  std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Poll until `path` exists, or give up after roughly five seconds.
pub async fn wait_for_file(path: &Path) -> bool {
  for _ in 0..500 {
    if path.exists() {
      return true;
    }
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
  }
  false
}
