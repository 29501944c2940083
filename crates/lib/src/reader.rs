//! Module lookup and per-session caching.
//!
//! A [`ModuleReader`] turns logical dotted names into [`Module`] nodes and
//! guarantees one node instance per name for its lifetime — the closure walk
//! in [`crate::module`] relies on that identity for cycle detection. The
//! cache belongs to the reader instance (one resolution session), never to
//! the process: independent resolutions do not interfere.
//!
//! [`FileModuleReader`] reads descriptors from an ordered list of module
//! roots on disk; [`MemoryModuleReader`] serves them from an in-memory map,
//! which is what tests and embedders usually want.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;
use walkdir::WalkDir;

use crate::descriptor::DESCRIPTOR_SUFFIX;
use crate::module::{Module, ModuleError};

/// Source of module nodes.
pub trait ModuleReader {
  /// Resolve a logical module name to its node.
  ///
  /// Implementations cache: repeated reads of one name return the same
  /// `Arc`, which closure computation relies on for cycle detection.
  fn read_module(&self, name: &str) -> Result<Arc<Module>, ModuleError>;

  /// Sorted logical names of every module the reader can locate.
  fn known_modules(&self) -> Vec<String>;

  /// Whether `name` belongs to a built-in namespace. Built-in modules are
  /// assumed to carry no entry points or servlets of their own and are
  /// neither resolved nor traversed during closure computation.
  fn is_builtin(&self, _name: &str) -> bool {
    false
  }
}

/// Relative descriptor path for a dotted module name:
/// `com.example.App` → `com/example/App.module.xml`.
pub fn descriptor_path(name: &str) -> PathBuf {
  PathBuf::from(format!("{}{}", name.replace('.', "/"), DESCRIPTOR_SUFFIX))
}

/// Dotted module name for a descriptor path below `root`, or `None` when
/// the path is not a descriptor file.
fn module_name_for(root: &Path, path: &Path) -> Option<String> {
  let relative = path.strip_prefix(root).ok()?;
  let relative = relative.to_string_lossy();
  let stem = relative.strip_suffix(DESCRIPTOR_SUFFIX)?;
  Some(stem.replace(['/', '\\'], "."))
}

/// Reads module descriptors from an ordered list of root directories.
///
/// Roots are probed in order; the first root containing a descriptor for a
/// name shadows the rest.
#[derive(Debug)]
pub struct FileModuleReader {
  roots: Vec<PathBuf>,
  builtin_prefixes: Vec<String>,
  cache: Mutex<HashMap<String, Arc<Module>>>,
}

impl FileModuleReader {
  pub fn new(roots: Vec<PathBuf>) -> Self {
    Self {
      roots,
      builtin_prefixes: Vec::new(),
      cache: Mutex::new(HashMap::new()),
    }
  }

  /// Mark name prefixes as built-in (the toolkit SDK namespace, typically);
  /// matching modules are skipped during inheritance traversal.
  pub fn with_builtin_prefixes(mut self, prefixes: Vec<String>) -> Self {
    self.builtin_prefixes = prefixes;
    self
  }

  fn locate(&self, name: &str) -> Option<PathBuf> {
    let relative = descriptor_path(name);
    self
      .roots
      .iter()
      .map(|root| root.join(&relative))
      .find(|path| path.is_file())
  }
}

impl ModuleReader for FileModuleReader {
  fn read_module(&self, name: &str) -> Result<Arc<Module>, ModuleError> {
    let mut cache = self.cache.lock().expect("module cache lock poisoned");
    if let Some(module) = cache.get(name) {
      return Ok(module.clone());
    }

    let path = self.locate(name).ok_or_else(|| ModuleError::NotFound {
      name: name.to_string(),
    })?;
    debug!(module = %name, path = %path.display(), "reading module descriptor");
    let module = Arc::new(Module::from_file(name, &path)?);
    cache.insert(name.to_string(), module.clone());
    Ok(module)
  }

  fn known_modules(&self) -> Vec<String> {
    let mut names = Vec::new();
    for root in &self.roots {
      for entry in WalkDir::new(root).into_iter().filter_map(|entry| entry.ok()) {
        if !entry.file_type().is_file() {
          continue;
        }
        if let Some(name) = module_name_for(root, entry.path()) {
          names.push(name);
        }
      }
    }
    names.sort();
    names.dedup();
    names
  }

  fn is_builtin(&self, name: &str) -> bool {
    self.builtin_prefixes.iter().any(|prefix| name.starts_with(prefix))
  }
}

/// Serves module descriptors from an in-memory name → source map.
#[derive(Debug, Default)]
pub struct MemoryModuleReader {
  sources: HashMap<String, String>,
  builtin_prefixes: Vec<String>,
  cache: Mutex<HashMap<String, Arc<Module>>>,
}

impl MemoryModuleReader {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a module's descriptor source.
  pub fn with_module(mut self, name: &str, source: &str) -> Self {
    self.sources.insert(name.to_string(), source.to_string());
    self
  }

  /// Mark name prefixes as built-in, as in
  /// [`FileModuleReader::with_builtin_prefixes`].
  pub fn with_builtin_prefixes(mut self, prefixes: Vec<String>) -> Self {
    self.builtin_prefixes = prefixes;
    self
  }
}

impl ModuleReader for MemoryModuleReader {
  fn read_module(&self, name: &str) -> Result<Arc<Module>, ModuleError> {
    let mut cache = self.cache.lock().expect("module cache lock poisoned");
    if let Some(module) = cache.get(name) {
      return Ok(module.clone());
    }

    let source = self.sources.get(name).ok_or_else(|| ModuleError::NotFound {
      name: name.to_string(),
    })?;
    let module = Arc::new(Module::from_source(name, source)?);
    cache.insert(name.to_string(), module.clone());
    Ok(module)
  }

  fn known_modules(&self) -> Vec<String> {
    let mut names: Vec<String> = self.sources.keys().cloned().collect();
    names.sort();
    names
  }

  fn is_builtin(&self, name: &str) -> bool {
    self.builtin_prefixes.iter().any(|prefix| name.starts_with(prefix))
  }
}
