//! Process lifetime and cancellation.
//!
//! `ProcessSupervisor` waits for the child and can signal its whole process
//! group. `CancelToken` is the handle given to the outside world: it works
//! before a process exists (the pipeline checks it before spawning) and
//! after (it signals whichever group is currently attached). A group that
//! is still around `CANCEL_GRACE` after its hangup is killed outright.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rustix::process::{Pid, Signal, kill_process_group, test_kill_process_group};
use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::consts::CANCEL_GRACE;

/// Deliver a hangup to every process in group `pgid`.
///
/// A group that no longer exists is not an error.
pub fn hangup_group(pgid: Pid) -> io::Result<()> {
  // CONT after HUP wakes stopped members so they can act on the hangup.
  for signal in [Signal::HUP, Signal::CONT] {
    match kill_process_group(pgid, signal) {
      Ok(()) => {}
      Err(rustix::io::Errno::SRCH) => return Ok(()),
      Err(e) => return Err(e.into()),
    }
  }
  Ok(())
}

/// Send `SIGKILL` to group `pgid` if any member is left. Returns whether
/// anything was still there to kill.
pub fn kill_group(pgid: Pid) -> io::Result<bool> {
  match test_kill_process_group(pgid) {
    Ok(()) => {}
    Err(rustix::io::Errno::SRCH) => return Ok(false),
    Err(e) => return Err(e.into()),
  }
  match kill_process_group(pgid, Signal::KILL) {
    Ok(()) => Ok(true),
    Err(rustix::io::Errno::SRCH) => Ok(false),
    Err(e) => Err(e.into()),
  }
}

/// Hang up group `pgid` now and kill whatever remains of it after `grace`.
pub fn terminate_group(pgid: Pid, grace: Duration) -> io::Result<()> {
  hangup_group(pgid)?;
  std::thread::spawn(move || {
    std::thread::sleep(grace);
    match kill_group(pgid) {
      Ok(true) => warn!(pgid = pgid.as_raw_nonzero().get(), "process group ignored hangup, killed"),
      Ok(false) => {}
      Err(e) => debug!(error = %e, "failed to kill process group"),
    }
  });
  Ok(())
}

/// Owns a spawned child until it has been reaped.
pub struct ProcessSupervisor {
  child: Child,
  pgid: Pid,
}

impl ProcessSupervisor {
  /// Take ownership of `child`, whose pid is also its process-group id.
  pub fn new(child: Child, pid: u32) -> io::Result<Self> {
    let pgid = Pid::from_raw(pid as i32).ok_or_else(|| io::Error::other(format!("invalid pid {}", pid)))?;
    Ok(Self { child, pgid })
  }

  pub fn pgid(&self) -> Pid {
    self.pgid
  }

  /// Wait for the child to exit and return its exit code.
  ///
  /// A child killed by signal `n` reports `128 + n`.
  pub async fn wait(&mut self) -> io::Result<i32> {
    let status = self.child.wait().await?;
    let code = match status.code() {
      Some(code) => code,
      None => {
        use std::os::unix::process::ExitStatusExt;
        status.signal().map(|s| 128 + s).unwrap_or(1)
      }
    };
    debug!(pgid = self.pgid.as_raw_nonzero().get(), code, "child exited");
    Ok(code)
  }

  /// Signal the child's entire process group. Returns once the hangup is
  /// delivered; the processes may still be exiting. Members still alive
  /// after `CANCEL_GRACE` are killed.
  pub fn cancel(&self) -> io::Result<()> {
    terminate_group(self.pgid, CANCEL_GRACE)
  }
}

#[derive(Debug, Default)]
struct CancelState {
  cancelled: AtomicBool,
  group: Mutex<Option<Pid>>,
}

/// Shared cancellation flag for one build or run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
  state: Arc<CancelState>,
}

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_cancelled(&self) -> bool {
    self.state.cancelled.load(Ordering::SeqCst)
  }

  /// Request cancellation. If a process group is attached it is sent a
  /// hangup, then killed if it outlives the grace period. It may not be dead
  /// when this returns.
  pub fn cancel(&self) {
    let group = self.group();
    self.state.cancelled.store(true, Ordering::SeqCst);
    if let Some(pgid) = *group {
      info!(pgid = pgid.as_raw_nonzero().get(), "cancelling process group");
      if let Err(e) = terminate_group(pgid, CANCEL_GRACE) {
        debug!(error = %e, "failed to signal process group");
      }
    }
  }

  /// Attach a freshly spawned group. If cancellation already happened the
  /// group is signalled immediately.
  pub fn attach(&self, pgid: Pid) {
    let mut group = self.group();
    *group = Some(pgid);
    if self.is_cancelled() {
      info!(pgid = pgid.as_raw_nonzero().get(), "cancelled before attach, signalling group");
      if let Err(e) = terminate_group(pgid, CANCEL_GRACE) {
        debug!(error = %e, "failed to signal process group");
      }
    }
  }

  /// Forget the attached group once its leader has been reaped.
  pub fn detach(&self) {
    *self.group() = None;
  }

  fn group(&self) -> MutexGuard<'_, Option<Pid>> {
    self.state.group.lock().unwrap_or_else(|e| e.into_inner())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;
  use tokio::process::Command;

  fn spawn_group_leader(script: &str) -> (Child, u32) {
    let child = Command::new("/bin/sh")
      .arg("-c")
      .arg(script)
      .process_group(0)
      .spawn()
      .unwrap();
    let pid = child.id().unwrap();
    (child, pid)
  }

  #[tokio::test]
  async fn wait_returns_exit_code() {
    let (child, pid) = spawn_group_leader("exit 3");
    let mut supervisor = ProcessSupervisor::new(child, pid).unwrap();
    assert_eq!(supervisor.wait().await.unwrap(), 3);
  }

  #[tokio::test]
  async fn cancel_reaches_whole_group() {
    let (child, pid) = spawn_group_leader("/bin/sleep 30 & /bin/sleep 30 & wait");
    let mut supervisor = ProcessSupervisor::new(child, pid).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    supervisor.cancel().unwrap();
    let code = supervisor.wait().await.unwrap();
    assert_eq!(code, 128 + Signal::HUP.as_raw());

    let mut gone = false;
    for _ in 0..100 {
      if kill_process_group(supervisor.pgid(), Signal::CONT) == Err(rustix::io::Errno::SRCH) {
        gone = true;
        break;
      }
      tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(gone, "process group still has members");
  }

  #[test]
  fn cancel_without_group_only_sets_flag() {
    let token = CancelToken::new();
    assert!(!token.is_cancelled());
    token.cancel();
    assert!(token.is_cancelled());
  }

  #[tokio::test]
  async fn attach_after_cancel_signals_immediately() {
    let (child, pid) = spawn_group_leader("/bin/sleep 30");
    let mut supervisor = ProcessSupervisor::new(child, pid).unwrap();

    let token = CancelToken::new();
    token.cancel();
    token.attach(supervisor.pgid());

    let code = tokio::time::timeout(Duration::from_secs(5), supervisor.wait())
      .await
      .expect("child should have been hung up")
      .unwrap();
    assert_ne!(code, 0);
    token.detach();
  }

  #[test]
  fn hangup_of_missing_group_is_ok() {
    // Above any possible pid_max, so no such group exists.
    let pgid = Pid::from_raw(i32::MAX).unwrap();
    assert!(hangup_group(pgid).is_ok());
    assert!(!kill_group(pgid).unwrap());
  }

  #[tokio::test]
  async fn group_ignoring_hangup_is_killed_after_grace() {
    let (child, pid) = spawn_group_leader("trap '' HUP; /bin/sleep 30 & wait");
    let mut supervisor = ProcessSupervisor::new(child, pid).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    terminate_group(supervisor.pgid(), Duration::from_millis(200)).unwrap();
    let code = tokio::time::timeout(Duration::from_secs(5), supervisor.wait())
      .await
      .expect("group should have been killed")
      .unwrap();
    assert_eq!(code, 128 + Signal::KILL.as_raw());
  }
}
