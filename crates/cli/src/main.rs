mod cmd;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use pocketcc_lib::target::BuildMode;

use crate::output::print_error;

/// pcc - build and run C/C++ sources with the on-device toolchain
#[derive(Parser)]
#[command(name = "pcc")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Compile the given sources (the first one decides the compiler)
  Build {
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// What to produce
    #[arg(short, long, value_enum, default_value_t = Mode::Exe)]
    mode: Mode,

    /// Print the result as JSON instead of streaming diagnostics
    #[arg(long)]
    json: bool,
  },

  /// Build an executable and run it in a terminal, forwarding stdin
  Run {
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Arguments passed to the program
    #[arg(last = true)]
    args: Vec<String>,
  },

  /// Show the toolchain layout and the environment builds run with
  Env {
    #[arg(long)]
    json: bool,
  },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
  Exe,
  NativeActivity,
  Sdl,
  Make,
}

impl From<Mode> for BuildMode {
  fn from(mode: Mode) -> Self {
    match mode {
      Mode::Exe => BuildMode::Executable,
      Mode::NativeActivity => BuildMode::NativeActivity,
      Mode::Sdl => BuildMode::Sdl,
      Mode::Make => BuildMode::Make,
    }
  }
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Build { files, mode, json } => cmd::cmd_build(&files, mode.into(), json),
    Commands::Run { files, args } => cmd::cmd_run(&files, &args),
    Commands::Env { json } => cmd::cmd_env(json).map(|()| 0),
  };

  match result {
    Ok(0) => {}
    Ok(code) => std::process::exit(code),
    Err(e) => {
      print_error(&format!("{:#}", e));
      std::process::exit(1);
    }
  }
}
