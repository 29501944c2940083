//! Implementation of the `javelin run` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::debug;

use javelin_lib::command::{CommandError, DedupeClasspath, JavaCommand};

use crate::output;

pub struct RunOptions {
  pub main_class: String,
  pub classpath: Vec<PathBuf>,
  pub jvm: Option<PathBuf>,
  pub jvm_args: Vec<String>,
  pub defines: Vec<String>,
  pub env: Vec<String>,
  pub timeout: Option<Duration>,
  pub dedupe_classpath: bool,
  pub args: Vec<String>,
}

pub fn cmd_run(options: RunOptions) -> Result<()> {
  let mut command = JavaCommand::new(&options.main_class)
    .add_to_classpath(options.classpath)
    .args(options.args);

  for flag in options.jvm_args {
    command = command.jvm_arg(flag);
  }
  for pair in &options.defines {
    let (key, value) = split_pair(pair)?;
    command = command.system_property(key, value);
  }
  for pair in &options.env {
    let (key, value) = split_pair(pair)?;
    command = command.env(key, value);
  }
  if let Some(jvm) = options.jvm {
    command = command.jvm(jvm);
  }
  if let Some(timeout) = options.timeout {
    command = command.timeout(timeout);
  }
  if options.dedupe_classpath {
    command = command.processor(DedupeClasspath);
  }

  debug!(command = ?command, "assembled toolchain command");
  output::status(&format!("forking {}", options.main_class));

  let runtime = tokio::runtime::Runtime::new().context("failed to create async runtime")?;
  if let Err(err) = runtime.block_on(command.execute()) {
    if let CommandError::ExitStatus { status, .. } = &err {
      let code = status.unwrap_or(1);
      output::failure(&err.to_string());
      std::process::exit(code);
    }
    return Err(err).with_context(|| format!("failed to run {}", options.main_class));
  }

  output::success(&format!("{} finished", options.main_class));
  Ok(())
}

fn split_pair(pair: &str) -> Result<(&str, &str)> {
  match pair.split_once('=') {
    Some((key, value)) if !key.is_empty() => Ok((key, value)),
    _ => bail!("expected KEY=VALUE, got '{pair}'"),
  }
}
