//! Terminal output draining and normalization.
//!
//! The pty delivers whatever the toolchain writes, colour codes and cursor
//! redraws included. Each line is cleaned up before it reaches the output
//! sink: CSI escape sequences are removed and backspaces erase the
//! characters before them, the way a terminal would show the line.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::LazyLock;

use regex::Regex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace};

static CSI: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\x1b\[[0-9:;<=>?]*[ -/]*[@-~]").unwrap_or_else(|e| panic!("bad CSI pattern: {}", e))
});

const BACKSPACE: char = '\x08';

/// Receives normalized output lines as they are produced.
pub trait OutputSink: Send {
  fn on_line(&mut self, line: &str);
}

impl<F: FnMut(&str) + Send> OutputSink for F {
  fn on_line(&mut self, line: &str) {
    self(line)
  }
}

/// Sink that drops everything.
pub struct NullSink;

impl OutputSink for NullSink {
  fn on_line(&mut self, _line: &str) {}
}

/// Remove CSI sequences from `line`.
pub fn strip_csi(line: &str) -> Cow<'_, str> {
  CSI.replace_all(line, "")
}

/// Apply backspaces: each one deletes the printable character before it.
/// A backspace with nothing printable before it is dropped.
pub fn apply_backspaces(line: &str) -> Cow<'_, str> {
  if !line.contains(BACKSPACE) {
    return Cow::Borrowed(line);
  }
  let mut out: Vec<char> = Vec::with_capacity(line.len());
  for c in line.chars() {
    if c == BACKSPACE {
      if out.last().is_some_and(|prev| !prev.is_control()) {
        out.pop();
      }
    } else {
      out.push(c);
    }
  }
  Cow::Owned(out.into_iter().collect())
}

/// Normalize one line of terminal output.
///
/// Repeats until nothing changes, since erasing characters can bring the
/// pieces of an escape sequence together or expose a trailing `\r`.
/// Normalizing the result again is a no-op.
pub fn normalize_line(line: &str) -> String {
  let mut current = line.to_string();
  loop {
    let next = apply_backspaces(&strip_csi(&current)).trim_end_matches(['\r', '\n']).to_string();
    if next == current {
      return next;
    }
    current = next;
  }
}

/// Decode and normalize raw bytes. Bytes that are not UTF-8 are passed on
/// lossily decoded, without normalization.
pub fn normalize_bytes(raw: &[u8]) -> String {
  match std::str::from_utf8(raw) {
    Ok(text) => normalize_line(text),
    Err(e) => {
      trace!(error = %e, "passing non-UTF-8 line through raw");
      String::from_utf8_lossy(raw).trim_end_matches(['\r', '\n']).to_string()
    }
  }
}

/// Reads the pty master until end-of-stream, sending each normalized line.
///
/// Keeps reading after the child exits: output still buffered in the pty
/// arrives until the last slave descriptor is closed.
pub struct OutputPump {
  master: File,
}

impl OutputPump {
  pub fn new(master: File) -> Self {
    Self { master }
  }

  /// Blocking drain. Returns the number of lines forwarded.
  pub fn drain(self, lines: UnboundedSender<String>) -> io::Result<usize> {
    let mut reader = BufReader::new(self.master);
    let mut buf = Vec::new();
    let mut count = 0;

    loop {
      buf.clear();
      match reader.read_until(b'\n', &mut buf) {
        Ok(0) => break,
        Ok(_) => {
          count += 1;
          // A closed receiver means nobody is listening; keep draining regardless.
          let _ = lines.send(normalize_bytes(&buf));
        }
        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
        Err(e) if is_hangup(&e) => {
          // Linux reports EIO on the master once every slave fd is gone.
          if !buf.is_empty() {
            count += 1;
            let _ = lines.send(normalize_bytes(&buf));
          }
          break;
        }
        Err(e) => return Err(e),
      }
    }

    debug!(lines = count, "pty drained");
    Ok(count)
  }
}

fn is_hangup(e: &io::Error) -> bool {
  e.raw_os_error() == Some(rustix::io::Errno::IO.raw_os_error())
}
