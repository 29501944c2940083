//! Test utilities for javelin-lib.
//!
//! Cross-platform helpers for tests that need a stub toolchain runtime: a
//! small executable script that echoes, sleeps, or exits with a fixed
//! status stands in for a real JVM binary.

use std::fs;
use std::path::{Path, PathBuf};

/// Write an executable stub runtime script into `dir` and return its path.
///
/// The script ignores whatever argument vector it receives and just runs
/// `body`.
#[cfg(unix)]
pub fn write_stub_runtime(dir: &Path, body: &str) -> PathBuf {
  use std::os::unix::fs::PermissionsExt;

  let path = dir.join("stub-java");
  fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
  let mut permissions = fs::metadata(&path).unwrap().permissions();
  permissions.set_mode(0o755);
  fs::set_permissions(&path, permissions).unwrap();
  path
}

#[cfg(windows)]
pub fn write_stub_runtime(dir: &Path, body: &str) -> PathBuf {
  let path = dir.join("stub-java.bat");
  fs::write(&path, format!("@echo off\r\n{body}\r\n")).unwrap();
  path
}

/// Script body exiting with `status`.
#[cfg(unix)]
pub fn exit_with(status: i32) -> String {
  format!("exit {status}")
}

#[cfg(windows)]
pub fn exit_with(status: i32) -> String {
  format!("exit /b {status}")
}

/// Script body sleeping for `secs` seconds.
#[cfg(unix)]
pub fn sleep_for(secs: u32) -> String {
  format!("sleep {secs}")
}

#[cfg(windows)]
pub fn sleep_for(secs: u32) -> String {
  // ping waits roughly one second between probes
  format!("ping -n {} 127.0.0.1 > nul", secs + 1)
}

/// Script body printing each line on stdout.
#[cfg(unix)]
pub fn echo_lines(lines: &[&str]) -> String {
  lines
    .iter()
    .map(|line| format!("echo {line}"))
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(windows)]
pub fn echo_lines(lines: &[&str]) -> String {
  lines
    .iter()
    .map(|line| format!("echo {line}"))
    .collect::<Vec<_>>()
    .join("\r\n")
}

/// Script body printing the value of an environment variable.
#[cfg(unix)]
pub fn echo_env(var: &str) -> String {
  format!("echo \"${var}\"")
}

#[cfg(windows)]
pub fn echo_env(var: &str) -> String {
  format!("echo %{var}%")
}

/// Script body creating an empty marker file.
#[cfg(unix)]
pub fn touch_file(path: &Path) -> String {
  format!("touch '{}'", path.display())
}

#[cfg(windows)]
pub fn touch_file(path: &Path) -> String {
  format!("type nul > \"{}\"", path.display())
}
