//! Classpath post-processing and rendering.
//!
//! Processors are a small middleware chain over the classpath list:
//! explicitly registered on a [`JavaCommand`](super::JavaCommand), run in
//! registration order immediately before launch, each with mutable access
//! to the entries. There is no plugin discovery.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::PathBuf;

use super::CommandError;

/// Hook run against the assembled classpath immediately before launch.
pub trait ClasspathProcessor: Send + Sync {
  fn process(&self, classpath: &mut Vec<PathBuf>);
}

/// Drops repeated classpath entries, keeping the first occurrence.
#[derive(Debug, Default)]
pub struct DedupeClasspath;

impl ClasspathProcessor for DedupeClasspath {
  fn process(&self, classpath: &mut Vec<PathBuf>) {
    let mut seen = HashSet::new();
    classpath.retain(|entry| seen.insert(entry.clone()));
  }
}

/// Moves the configured entries to the front of the classpath, injecting
/// any that are missing. This is how an SDK is kept ahead of project
/// dependencies that shade its classes.
#[derive(Debug)]
pub struct PrependClasspath {
  entries: Vec<PathBuf>,
}

impl PrependClasspath {
  pub fn new<I, P>(entries: I) -> Self
  where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
  {
    Self {
      entries: entries.into_iter().map(Into::into).collect(),
    }
  }
}

impl ClasspathProcessor for PrependClasspath {
  fn process(&self, classpath: &mut Vec<PathBuf>) {
    classpath.retain(|entry| !self.entries.contains(entry));
    for entry in self.entries.iter().rev() {
      classpath.insert(0, entry.clone());
    }
  }
}

/// Join entries with the host path-list separator.
///
/// Rendering goes through [`std::env::join_paths`] so the value reaches the
/// child byte-exact. An entry that itself contains the separator cannot be
/// rendered and is a configuration error.
pub(crate) fn join_classpath(entries: &[PathBuf]) -> Result<OsString, CommandError> {
  std::env::join_paths(entries).map_err(|err| CommandError::InvalidClasspath {
    message: err.to_string(),
  })
}
