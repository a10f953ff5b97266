//! Crate-wide constants.

pub const APP_NAME: &str = "pocketcc";

/// Environment variable naming the toolchain install directory.
pub const TOOLCHAIN_ROOT_ENV: &str = "POCKETCC_TOOLCHAIN_ROOT";

/// Environment variable naming the JSON settings file.
pub const SETTINGS_ENV: &str = "POCKETCC_SETTINGS";

/// Environment variable overriding where lock files are kept.
pub const STATE_DIR_ENV: &str = "POCKETCC_STATE_DIR";

pub const DEFAULT_TERM: &str = "xterm-256color";
pub const DEFAULT_PTY_ROWS: u16 = 24;
pub const DEFAULT_PTY_COLS: u16 = 80;

/// Bytes read from the head of an executable when deciding how to launch it.
pub const SNIFF_LEN: usize = 256;

/// Exit code reported for a build cancelled before anything was spawned.
pub const CANCELLED_EXIT_CODE: i32 = -1;

/// How long a cancelled process group gets to act on its hangup before the
/// survivors are killed.
pub const CANCEL_GRACE: std::time::Duration = std::time::Duration::from_secs(2);
