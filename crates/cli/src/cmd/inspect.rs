//! Implementation of the `javelin inspect` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use javelin_lib::module::ResolvedModule;
use javelin_lib::reader::{FileModuleReader, ModuleReader};

use crate::output::{OutputFormat, symbols};

pub fn cmd_inspect(
  module: &str,
  roots: &[PathBuf],
  builtin_prefixes: Vec<String>,
  prefix: Option<&str>,
  format: OutputFormat,
) -> Result<()> {
  let reader = FileModuleReader::new(roots.to_vec()).with_builtin_prefixes(builtin_prefixes);

  let node = reader
    .read_module(module)
    .with_context(|| format!("failed to read module '{module}'"))?;
  let resolved = node
    .resolve_with_prefix(&reader, prefix)
    .with_context(|| format!("failed to resolve module '{module}'"))?;

  if format.is_json() {
    println!("{}", serde_json::to_string_pretty(&resolved).context("failed to serialize module")?);
    return Ok(());
  }

  print_resolved(&resolved);
  Ok(())
}

fn print_resolved(resolved: &ResolvedModule) {
  println!("module {}", resolved.name);
  println!("  output path    {}", resolved.output_path);
  println!("  package        {}", display_or(&resolved.package, "(default)"));
  println!("  public path    {}", resolved.public_path);
  println!("  sources        {}", resolved.source_paths.join(", "));
  if !resolved.super_source_paths.is_empty() {
    println!("  super-sources  {}", resolved.super_source_paths.join(", "));
  }

  println!("  entry points");
  if resolved.entry_points.is_empty() {
    println!("    (none)");
  }
  for entry_point in &resolved.entry_points {
    println!("    {} {entry_point}", symbols::ARROW);
  }

  println!("  servlets");
  if resolved.servlets.is_empty() {
    println!("    (none)");
  }
  for (path, class) in &resolved.servlets {
    println!("    {path} {} {class}", symbols::ARROW);
  }

  println!("  inherits");
  if resolved.inherits.is_empty() {
    println!("    (none)");
  }
  for name in &resolved.inherits {
    println!("    {name}");
  }
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
  if value.is_empty() { fallback } else { value }
}
