//! Implementation of the `javelin modules` command.

use std::path::PathBuf;

use anyhow::Result;

use javelin_lib::reader::{FileModuleReader, ModuleReader};

use crate::output;

pub fn cmd_modules(roots: &[PathBuf]) -> Result<()> {
  let reader = FileModuleReader::new(roots.to_vec());
  let modules = reader.known_modules();

  if modules.is_empty() {
    output::status(&format!("no modules under {}", describe_roots(roots)));
    return Ok(());
  }

  for name in &modules {
    println!("{name}");
  }
  output::status(&format!("{} module(s)", modules.len()));
  Ok(())
}

fn describe_roots(roots: &[PathBuf]) -> String {
  roots
    .iter()
    .map(|root| root.display().to_string())
    .collect::<Vec<_>>()
    .join(", ")
}
