//! Pseudo-terminal allocation.

use std::fs::File;
use std::io;
use std::os::fd::{AsFd, OwnedFd};
use std::path::PathBuf;

use rustix::fs::{Mode, OFlags};
use rustix::pty::{OpenptFlags, grantpt, openpt, ptsname, unlockpt};
use rustix::termios::{Winsize, tcsetwinsize};

/// A freshly allocated pty pair.
///
/// The slave side is handed to the child as its stdio and must be dropped by
/// the parent once the child is spawned, otherwise the master never sees
/// end-of-stream.
#[derive(Debug)]
pub struct Pty {
  pub master: OwnedFd,
  pub slave: OwnedFd,
  pub slave_path: PathBuf,
}

impl Pty {
  pub fn open(rows: u16, cols: u16) -> io::Result<Self> {
    let master = openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY | OpenptFlags::CLOEXEC)?;
    grantpt(&master)?;
    unlockpt(&master)?;

    let name = ptsname(&master, Vec::new())?;
    let slave_path = PathBuf::from(name.to_string_lossy().into_owned());
    let slave = rustix::fs::open(
      &slave_path,
      OFlags::RDWR | OFlags::NOCTTY | OFlags::CLOEXEC,
      Mode::empty(),
    )?;

    let pty = Self {
      master,
      slave,
      slave_path,
    };
    pty.resize(rows, cols)?;
    Ok(pty)
  }

  pub fn resize(&self, rows: u16, cols: u16) -> io::Result<()> {
    resize(self.master.as_fd(), rows, cols)
  }

  /// Three handles on the slave, for the child's stdin, stdout and stderr.
  pub fn slave_stdio(&self) -> io::Result<[OwnedFd; 3]> {
    Ok([self.slave.try_clone()?, self.slave.try_clone()?, self.slave.try_clone()?])
  }

  /// Split into the master as a file and the slave, consuming the pair.
  pub fn into_parts(self) -> (File, OwnedFd) {
    (File::from(self.master), self.slave)
  }
}

pub fn resize(fd: impl AsFd, rows: u16, cols: u16) -> io::Result<()> {
  let size = Winsize {
    ws_row: rows,
    ws_col: cols,
    ws_xpixel: 0,
    ws_ypixel: 0,
  };
  tcsetwinsize(fd, size)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use rustix::termios::tcgetwinsize;

  #[test]
  fn opens_with_requested_size() {
    let pty = Pty::open(30, 100).unwrap();
    let size = tcgetwinsize(&pty.slave).unwrap();
    assert_eq!((size.ws_row, size.ws_col), (30, 100));
    assert!(pty.slave_path.starts_with("/dev"));
  }

  #[test]
  fn resize_is_visible_on_slave() {
    let pty = Pty::open(24, 80).unwrap();
    pty.resize(50, 132).unwrap();
    let size = tcgetwinsize(&pty.slave).unwrap();
    assert_eq!((size.ws_row, size.ws_col), (50, 132));
  }
}
