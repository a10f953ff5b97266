//! Per-working-directory build locks.
//!
//! At most one build may run in a working directory. A second request is
//! rejected immediately rather than queued. The lock is an exclusive `flock`
//! on a file named after the directory's hash, so it also holds across
//! processes and is released when the holder exits, however it exits.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::platform::paths::lock_dir;
use crate::util::hash::sha256_hex;

#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at_unix: u64,
  pub command: String,
  pub working_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum LockError {
  #[error(
    "A build is already running in {}: {command} (PID {pid}, started {started_at})",
    working_dir.display()
  )]
  Contention {
    working_dir: PathBuf,
    command: String,
    pid: u32,
    started_at: String,
  },

  #[error("A build is already running in {} (lock file {})", working_dir.display(), lock_path.display())]
  ContentionUnknown { working_dir: PathBuf, lock_path: PathBuf },

  #[error("Failed to create lock directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("Failed to open lock file: {0}")]
  OpenFile(#[source] io::Error),

  #[error("Failed to write lock metadata: {0}")]
  WriteMetadata(#[source] io::Error),

  #[error("Failed to acquire lock: {0}")]
  LockFailed(#[source] io::Error),
}

/// Held for the duration of one build. Dropping it releases the directory.
#[derive(Debug)]
pub struct WorkdirLock {
  file: File,
  lock_path: PathBuf,
}

impl WorkdirLock {
  /// Try to claim `working_dir` for a build described by `command`, using
  /// the default lock directory.
  pub fn acquire(working_dir: &Path, command: &str) -> Result<Self, LockError> {
    Self::acquire_in(&lock_dir(), working_dir, command)
  }

  /// Like `acquire`, with lock files kept in `dir`.
  pub fn acquire_in(dir: &Path, working_dir: &Path, command: &str) -> Result<Self, LockError> {
    let working_dir = dunce::canonicalize(working_dir).unwrap_or_else(|_| working_dir.to_path_buf());
    let lock_path = dir.join(format!("{}.lock", &sha256_hex(working_dir.as_os_str().as_encoded_bytes())[..20]));

    std::fs::create_dir_all(dir).map_err(LockError::CreateDir)?;

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(LockError::OpenFile)?;

    if let Err(err) = try_lock(&file) {
      if err.kind() == io::ErrorKind::WouldBlock {
        return Err(Self::read_contention_error(&lock_path, &working_dir));
      }
      return Err(LockError::LockFailed(err));
    }

    Self::write_metadata(&file, command, &working_dir)?;
    debug!(lock = %lock_path.display(), working_dir = %working_dir.display(), "acquired build lock");

    Ok(WorkdirLock { file, lock_path })
  }

  /// Reads the lock metadata from the held file handle.
  pub fn read_metadata(&self) -> io::Result<LockMetadata> {
    use std::io::{Seek, SeekFrom};

    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }

  fn write_metadata(file: &File, command: &str, working_dir: &Path) -> Result<(), LockError> {
    let metadata = LockMetadata {
      version: 1,
      pid: std::process::id(),
      started_at_unix: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs(),
      command: command.to_string(),
      working_dir: working_dir.to_path_buf(),
    };

    file.set_len(0).map_err(LockError::WriteMetadata)?;
    let mut writer = io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &metadata).map_err(|e| LockError::WriteMetadata(io::Error::other(e)))?;
    writer.flush().map_err(LockError::WriteMetadata)?;

    Ok(())
  }

  fn read_contention_error(lock_path: &Path, working_dir: &Path) -> LockError {
    if let Ok(mut file) = File::open(lock_path) {
      let mut contents = String::new();
      if file.read_to_string(&mut contents).is_ok()
        && let Ok(metadata) = serde_json::from_str::<LockMetadata>(&contents)
      {
        return LockError::Contention {
          working_dir: working_dir.to_path_buf(),
          command: metadata.command,
          pid: metadata.pid,
          started_at: format!("Unix timestamp {}", metadata.started_at_unix),
        };
      }
    }

    LockError::ContentionUnknown {
      working_dir: working_dir.to_path_buf(),
      lock_path: lock_path.to_path_buf(),
    }
  }
}

fn try_lock(file: &File) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::consts::STATE_DIR_ENV;
  use serial_test::serial;
  use tempfile::TempDir;

  fn with_temp_state<F>(f: F)
  where
    F: FnOnce(&Path),
  {
    let state = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    temp_env::with_var(STATE_DIR_ENV, Some(state.path().to_str().unwrap()), || f(work.path()));
  }

  #[test]
  #[serial]
  fn acquire_lock() {
    with_temp_state(|work| {
      let lock = WorkdirLock::acquire(work, "gcc main.c").unwrap();
      assert!(lock.lock_path().exists());
    });
  }

  #[test]
  #[serial]
  fn second_build_in_same_dir_rejected() {
    with_temp_state(|work| {
      let _held = WorkdirLock::acquire(work, "gcc main.c").unwrap();
      let err = WorkdirLock::acquire(work, "gcc other.c").unwrap_err();
      match err {
        LockError::Contention { command, pid, .. } => {
          assert_eq!(command, "gcc main.c");
          assert_eq!(pid, std::process::id());
        }
        other => panic!("expected contention, got {other:?}"),
      }
    });
  }

  #[test]
  #[serial]
  fn different_dirs_do_not_conflict() {
    with_temp_state(|work| {
      let a = work.join("a");
      let b = work.join("b");
      std::fs::create_dir_all(&a).unwrap();
      std::fs::create_dir_all(&b).unwrap();

      let lock_a = WorkdirLock::acquire(&a, "make").unwrap();
      let lock_b = WorkdirLock::acquire(&b, "make").unwrap();
      assert_ne!(lock_a.lock_path(), lock_b.lock_path());
    });
  }

  #[test]
  #[serial]
  fn lock_metadata_written() {
    with_temp_state(|work| {
      let lock = WorkdirLock::acquire(work, "g++ game.cpp").unwrap();
      let metadata = lock.read_metadata().unwrap();

      assert_eq!(metadata.version, 1);
      assert_eq!(metadata.command, "g++ game.cpp");
      assert_eq!(metadata.pid, std::process::id());
    });
  }

  #[test]
  #[serial]
  fn lock_released_on_drop() {
    with_temp_state(|work| {
      {
        let _lock = WorkdirLock::acquire(work, "first").unwrap();
      }
      let lock2 = WorkdirLock::acquire(work, "second").unwrap();
      assert!(lock2.lock_path().exists());
    });
  }
}
