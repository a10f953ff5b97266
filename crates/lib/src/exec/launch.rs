//! Process launching.
//!
//! Resolves what should actually be exec'd for a command line, then starts
//! it as a session leader attached to a fresh pseudo-terminal. The child is
//! its own process group, so the whole tree it forks can be signalled at once.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::BorrowedFd;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::args::CommandLine;
use crate::consts::SNIFF_LEN;
use crate::exec::pty::Pty;
use crate::settings::Settings;
use crate::toolchain::{Environment, Toolchain};

const ELF_MAGIC: &[u8] = b"\x7fELF";

/// How a file on disk gets executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecKind {
  /// An ELF binary, exec'd directly.
  Native,
  /// A script naming its interpreter, with an optional single argument.
  Shebang { interpreter: PathBuf, arg: Option<String> },
  /// Anything else, handed to the default shell.
  Script,
}

/// Classify the first bytes of an executable.
pub fn classify(head: &[u8]) -> ExecKind {
  if head.starts_with(ELF_MAGIC) {
    return ExecKind::Native;
  }

  if let Some(rest) = head.strip_prefix(b"#!") {
    let line_end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
    let line = String::from_utf8_lossy(&rest[..line_end]);
    let mut parts = line.trim().splitn(2, char::is_whitespace);
    if let Some(interpreter) = parts.next().filter(|s| !s.is_empty()) {
      let arg = parts.next().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
      return ExecKind::Shebang {
        interpreter: PathBuf::from(interpreter),
        arg,
      };
    }
  }

  ExecKind::Script
}

/// Read the head of `path` and classify it.
pub fn sniff(path: &Path) -> io::Result<ExecKind> {
  let mut head = Vec::with_capacity(SNIFF_LEN);
  File::open(path)?.take(SNIFF_LEN as u64).read_to_end(&mut head)?;
  Ok(classify(&head))
}

/// The argv actually exec'd for a resolved program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub program: PathBuf,
  pub args: Vec<String>,
}

/// Work out what to exec for `program` (already an absolute path) and its arguments.
pub fn resolve_invocation(
  program: &Path,
  args: &[String],
  toolchain: &Toolchain,
  settings: &Settings,
) -> io::Result<Invocation> {
  let kind = sniff(program)?;
  debug!(program = %program.display(), kind = ?kind, "resolved executable kind");

  let script = program.to_string_lossy().into_owned();
  let invocation = match kind {
    ExecKind::Native => Invocation {
      program: program.to_path_buf(),
      args: args.to_vec(),
    },
    ExecKind::Shebang { interpreter, arg } => {
      let interpreter = toolchain.local_interpreter(&interpreter).unwrap_or(interpreter);
      let mut full = Vec::with_capacity(args.len() + 2);
      full.extend(arg);
      full.push(script);
      full.extend_from_slice(args);
      Invocation {
        program: interpreter,
        args: full,
      }
    }
    ExecKind::Script => {
      let mut full = Vec::with_capacity(args.len() + 1);
      full.push(script);
      full.extend_from_slice(args);
      Invocation {
        program: toolchain.default_shell(settings),
        args: full,
      }
    }
  };

  Ok(invocation)
}

/// A live child attached to a pty.
///
/// Owns the master side; dropping the handle closes it.
#[derive(Debug)]
pub struct ProcessHandle {
  pub pid: u32,
  pub child: Child,
  pub master: File,
}

/// Resolves and spawns command lines inside a pty.
pub struct Launcher<'a> {
  pub toolchain: &'a Toolchain,
  pub settings: &'a Settings,
}

impl Launcher<'_> {
  /// Find `program` on the toolchain path, or report `ENOENT` as the OS would.
  pub fn locate(&self, program: &str) -> io::Result<PathBuf> {
    self
      .toolchain
      .find_program(program)
      .ok_or_else(|| io::Error::from(rustix::io::Errno::NOENT))
  }

  /// Start `cmd` in `working_dir` with exactly `env` as its environment.
  pub fn spawn(&self, cmd: &CommandLine, working_dir: &Path, env: &Environment) -> io::Result<ProcessHandle> {
    let program = self.locate(&cmd.program)?;
    let invocation = resolve_invocation(&program, &cmd.args, self.toolchain, self.settings)?;

    let pty = Pty::open(self.settings.pty_rows, self.settings.pty_cols)?;
    let [stdin, stdout, stderr] = pty.slave_stdio()?;

    let child = {
      let mut command = Command::new(&invocation.program);
      command
        .args(&invocation.args)
        .current_dir(working_dir)
        .env_clear()
        .envs(env.iter())
        .stdin(Stdio::from(stdin))
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(false);

      // SAFETY: the hook only issues setsid and ioctl, both async-signal-safe.
      unsafe {
        command.pre_exec(|| {
          rustix::process::setsid()?;
          // SAFETY: fd 0 is the pty slave installed by the stdio setup above.
          let tty = BorrowedFd::borrow_raw(0);
          rustix::process::ioctl_tiocsctty(tty)?;
          Ok(())
        });
      }

      info!(
        program = %invocation.program.display(),
        cwd = %working_dir.display(),
        "spawning in pty"
      );
      command.spawn()?
      // `command` drops here, closing its copies of the slave.
    };

    let (master, _slave) = pty.into_parts();
    let pid = child.id().ok_or_else(|| io::Error::other("child exited before its pid was read"))?;
    debug!(pid, "child started");

    Ok(ProcessHandle { pid, child, master })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::os::unix::fs::PermissionsExt;
  use tempfile::TempDir;

  fn write_exec(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
  }

  #[test]
  fn classify_elf() {
    assert_eq!(classify(b"\x7fELF\x02\x01\x01\0"), ExecKind::Native);
  }

  #[test]
  fn classify_shebang_with_arg() {
    assert_eq!(
      classify(b"#!/usr/bin/env python3\nprint(1)\n"),
      ExecKind::Shebang {
        interpreter: PathBuf::from("/usr/bin/env"),
        arg: Some("python3".to_string()),
      }
    );
    assert_eq!(
      classify(b"#! /bin/sh\n"),
      ExecKind::Shebang {
        interpreter: PathBuf::from("/bin/sh"),
        arg: None,
      }
    );
  }

  #[test]
  fn classify_plain_script() {
    assert_eq!(classify(b"echo hi\n"), ExecKind::Script);
    assert_eq!(classify(b"#!\n"), ExecKind::Script);
    assert_eq!(classify(b""), ExecKind::Script);
  }

  #[test]
  fn shebang_interpreter_swapped_for_toolchain_copy() {
    let temp = TempDir::new().unwrap();
    let tc = Toolchain::new(temp.path());
    std::fs::create_dir_all(tc.bin_dir()).unwrap();
    write_exec(&tc.bin_dir().join("sh"), "");
    let script = tc.bin_dir().join("tool");
    write_exec(&script, "#!/bin/sh -e\necho hi\n");

    let inv = resolve_invocation(&script, &["x".to_string()], &tc, &Settings::default()).unwrap();
    assert_eq!(inv.program, tc.bin_dir().join("sh"));
    assert_eq!(inv.args, vec!["-e".to_string(), script.to_string_lossy().into_owned(), "x".to_string()]);
  }

  #[test]
  fn plain_script_uses_default_shell() {
    let temp = TempDir::new().unwrap();
    let tc = Toolchain::new(temp.path());
    std::fs::create_dir_all(tc.bin_dir()).unwrap();
    let script = tc.bin_dir().join("tool");
    write_exec(&script, "echo hi\n");

    let settings = Settings {
      shell: Some(PathBuf::from("/custom/sh")),
      ..Settings::default()
    };
    let inv = resolve_invocation(&script, &[], &tc, &settings).unwrap();
    assert_eq!(inv.program, PathBuf::from("/custom/sh"));
    assert_eq!(inv.args, vec![script.to_string_lossy().into_owned()]);
  }

  #[test]
  fn missing_program_reports_enoent() {
    let temp = TempDir::new().unwrap();
    let tc = Toolchain::new(temp.path());
    let settings = Settings::default();
    let launcher = Launcher {
      toolchain: &tc,
      settings: &settings,
    };
    let err = launcher.locate("gcc").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::NotFound);
    assert!(err.to_string().contains("No such file or directory"));
  }
}
