//! JVM executable resolution.

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::CommandError;

#[cfg(windows)]
const JAVA_BINARY: &str = "java.exe";
#[cfg(not(windows))]
const JAVA_BINARY: &str = "java";

/// Environment variable naming the host JVM installation.
const JAVA_HOME: &str = "JAVA_HOME";

/// Resolve the JVM executable to fork.
///
/// An explicit location wins: a directory gets the platform binary path
/// appended, a file is used as-is, and a missing location fails fast. With
/// nothing configured, `$JAVA_HOME` is tried under the same rules, and as a
/// last resort the bare binary name is left to `PATH` lookup at spawn time.
pub(crate) fn resolve_runtime(explicit: Option<&Path>) -> Result<PathBuf, CommandError> {
  if let Some(path) = explicit {
    return resolve_location(path.to_path_buf());
  }
  match env::var_os(JAVA_HOME) {
    Some(home) => resolve_location(PathBuf::from(home)),
    None => {
      debug!("no JVM configured and JAVA_HOME unset, deferring to PATH");
      Ok(PathBuf::from(JAVA_BINARY))
    }
  }
}

fn resolve_location(location: PathBuf) -> Result<PathBuf, CommandError> {
  if !location.exists() {
    return Err(CommandError::JvmMissing { path: location });
  }
  if location.is_dir() {
    return Ok(location.join("bin").join(JAVA_BINARY));
  }
  debug!(jvm = %location.display(), "using configured JVM");
  Ok(location)
}
