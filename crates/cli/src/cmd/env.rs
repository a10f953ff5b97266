//! Implementation of the `pcc env` command.

use anyhow::{Context, Result};
use serde_json::json;

use pocketcc_lib::build::Engine;
use pocketcc_lib::settings::Settings;

use crate::output::{print_info, print_json, print_stat};

pub fn cmd_env(json: bool) -> Result<()> {
  let engine = Engine::from_env().context("Failed to load settings")?;
  let toolchain = engine.toolchain();
  let cwd = std::env::current_dir().context("Failed to read current directory")?;
  let env = toolchain.environment(engine.settings(), &cwd);

  if json {
    let vars: serde_json::Map<String, serde_json::Value> =
      env.iter().map(|(k, v)| (k.to_string(), json!(v))).collect();
    let output = json!({
      "toolchain": {
        "root": toolchain.root(),
        "bin": toolchain.bin_dir(),
        "include": toolchain.include_dir(),
        "lib": toolchain.lib_dir(),
        "glue": toolchain.glue_source(),
      },
      "settings": Settings::default_path(),
      "environment": vars,
    });
    return print_json(&output);
  }

  print_info(&format!("Toolchain: {}", toolchain.root().display()));
  print_stat("bin", &toolchain.bin_dir().display().to_string());
  print_stat("include", &toolchain.include_dir().display().to_string());
  print_stat("lib", &toolchain.lib_dir().display().to_string());
  print_stat("glue", &toolchain.glue_source().display().to_string());
  print_stat("settings", &Settings::default_path().display().to_string());
  println!();
  print_info("Environment:");
  for (key, value) in env.iter() {
    println!("  {}={}", key, value);
  }
  Ok(())
}
