//! Module nodes and inheritance-graph aggregation.
//!
//! A [`Module`] wraps one parsed descriptor and derives the views downstream
//! tooling needs: source and public paths, entry points, servlet mappings,
//! and the transitive closure of inherited modules. Descriptor inheritance
//! may legally contain cycles, so the closure walk is an explicit stack DFS
//! over a visited set keyed by module name; it terminates on any graph and
//! records each module at most once, in discovery order.
//!
//! # Aggregation order
//!
//! Every aggregate view iterates the closure in discovery order (preorder
//! DFS following `<inherits>` declaration order), so repeated resolutions of
//! the same graph render identically. Servlet-path collisions resolve
//! last-merged-wins: a path redeclared by an inherited module overrides the
//! local mapping. Both are deliberate policy, pinned by tests.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use thiserror::Error;
use tracing::trace;

use crate::descriptor::{Descriptor, DescriptorError};
use crate::reader::ModuleReader;

/// Public resource path used when a descriptor declares no `<public>`.
pub const DEFAULT_PUBLIC_PATH: &str = "public";

/// Source sub-path used when a descriptor declares no `<source>`.
pub const DEFAULT_SOURCE_PATH: &str = "client";

/// Errors that can occur while resolving modules.
#[derive(Debug, Error)]
pub enum ModuleError {
  /// No descriptor exists for the name.
  #[error("module '{name}' not found in any module root")]
  NotFound { name: String },

  /// The descriptor exists but could not be parsed.
  #[error("failed to read descriptor for module '{name}': {source}")]
  Descriptor {
    name: String,
    #[source]
    source: DescriptorError,
  },

  /// An inherited module failed to resolve; names both ends of the edge so
  /// the offending declaration can be found without re-running.
  #[error("module '{requested_by}' inherits '{name}': {source}")]
  Inherit {
    requested_by: String,
    name: String,
    #[source]
    source: Box<ModuleError>,
  },
}

/// One node of the module graph.
///
/// Identity is the dotted logical name: equality and hashing ignore the
/// descriptor contents. Nodes are immutable after construction except for
/// the memoized inherits closure, and are shared via `Arc` by the reader
/// session that created them.
pub struct Module {
  name: String,
  descriptor: Descriptor,
  source_file: Option<PathBuf>,
  inherits: OnceLock<Vec<Arc<Module>>>,
}

impl Module {
  /// Wrap an already-parsed descriptor.
  pub fn new(name: impl Into<String>, descriptor: Descriptor) -> Self {
    Self {
      name: name.into(),
      descriptor,
      source_file: None,
      inherits: OnceLock::new(),
    }
  }

  /// Parse descriptor source text into a module node.
  pub fn from_source(name: &str, source: &str) -> Result<Self, ModuleError> {
    let descriptor = Descriptor::parse(source).map_err(|source| ModuleError::Descriptor {
      name: name.to_string(),
      source,
    })?;
    Ok(Self::new(name, descriptor))
  }

  /// Parse a descriptor file into a module node, remembering the path for
  /// diagnostics.
  pub fn from_file(name: &str, path: &Path) -> Result<Self, ModuleError> {
    let descriptor = Descriptor::parse_file(path).map_err(|source| ModuleError::Descriptor {
      name: name.to_string(),
      source,
    })?;
    Ok(Self {
      name: name.to_string(),
      descriptor,
      source_file: Some(path.to_path_buf()),
      inherits: OnceLock::new(),
    })
  }

  /// The dotted logical name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// The descriptor file this node was read from, if any.
  pub fn source_file(&self) -> Option<&Path> {
    self.source_file.as_deref()
  }

  /// The package part of the logical name: everything before the last dot,
  /// or the empty string for an unqualified name.
  pub fn package(&self) -> &str {
    match self.name.rfind('.') {
      Some(index) => &self.name[..index],
      None => "",
    }
  }

  /// Output path of the compiled module: the `rename-to` attribute when
  /// declared, otherwise the logical name.
  pub fn output_path(&self) -> &str {
    self.descriptor.attribute("rename-to").unwrap_or(&self.name)
  }

  /// Public resource path, defaulting to [`DEFAULT_PUBLIC_PATH`].
  pub fn public_path(&self) -> &str {
    self
      .descriptor
      .children("public")
      .next()
      .and_then(|node| node.attribute("path"))
      .unwrap_or(DEFAULT_PUBLIC_PATH)
  }

  /// Declared source sub-paths, defaulting to [`DEFAULT_SOURCE_PATH`] when
  /// the descriptor declares none.
  pub fn source_paths(&self) -> Vec<String> {
    let paths: Vec<String> = self
      .descriptor
      .children("source")
      .map(|node| node.attribute("path").unwrap_or_default().to_string())
      .collect();
    if paths.is_empty() {
      vec![DEFAULT_SOURCE_PATH.to_string()]
    } else {
      paths
    }
  }

  /// Declared super-source sub-paths; empty when none are declared.
  pub fn super_source_paths(&self) -> Vec<String> {
    self
      .descriptor
      .children("super-source")
      .map(|node| node.attribute("path").unwrap_or_default().to_string())
      .collect()
  }

  /// Entry points declared by this descriptor alone, in document order.
  pub fn local_entry_points(&self) -> Vec<String> {
    self
      .descriptor
      .children("entry-point")
      .filter_map(|node| node.attribute("class"))
      .map(str::to_string)
      .collect()
  }

  /// Servlet mappings declared by this descriptor alone. Each URL path is
  /// prefixed with `prefix` unless the prefix is blank.
  pub fn local_servlets(&self, prefix: &str) -> BTreeMap<String, String> {
    let mut servlets = BTreeMap::new();
    for node in self.descriptor.children("servlet") {
      if let (Some(path), Some(class)) = (node.attribute("path"), node.attribute("class")) {
        let key = if prefix.trim().is_empty() {
          path.to_string()
        } else {
          format!("{prefix}{path}")
        };
        servlets.insert(key, class.to_string());
      }
    }
    servlets
  }

  /// Module names this descriptor inherits directly, in declaration order.
  pub fn local_inherit_names(&self) -> Vec<String> {
    self
      .descriptor
      .children("inherits")
      .filter_map(|node| node.attribute("name"))
      .map(str::to_string)
      .collect()
  }

  /// The transitive closure of inherited modules, in discovery order.
  ///
  /// The walk is an explicit stack DFS seeded with this module's local
  /// inherit declarations; a visited set keyed by name guards against
  /// cycles, and this module itself never appears in its own closure even
  /// when reachable through one. Names the reader marks as built-in are
  /// neither resolved nor traversed. The result is memoized.
  pub fn inherits(&self, reader: &dyn ModuleReader) -> Result<Vec<Arc<Module>>, ModuleError> {
    if let Some(cached) = self.inherits.get() {
      return Ok(cached.clone());
    }

    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(self.name.clone());

    let mut discovered: Vec<Arc<Module>> = Vec::new();
    let mut stack: Vec<(String, String)> = Vec::new();
    push_inherit_edges(&mut stack, reader, &self.name, self.local_inherit_names());

    while let Some((requested_by, name)) = stack.pop() {
      if !seen.insert(name.clone()) {
        continue;
      }
      let module = reader
        .read_module(&name)
        .map_err(|source| ModuleError::Inherit {
          requested_by,
          name: name.clone(),
          source: Box::new(source),
        })?;
      push_inherit_edges(&mut stack, reader, &name, module.local_inherit_names());
      discovered.push(module);
    }

    Ok(self.inherits.get_or_init(|| discovered).clone())
  }

  /// All entry points: local ones first, then each closure module's local
  /// entry points in discovery order.
  pub fn entry_points(&self, reader: &dyn ModuleReader) -> Result<Vec<String>, ModuleError> {
    let mut entry_points = self.local_entry_points();
    for module in self.inherits(reader)? {
      entry_points.extend(module.local_entry_points());
    }
    Ok(entry_points)
  }

  /// All servlet mappings, URL paths prefixed with this module's output
  /// path.
  pub fn servlets(&self, reader: &dyn ModuleReader) -> Result<BTreeMap<String, String>, ModuleError> {
    self.servlets_with_prefix(reader, self.output_path())
  }

  /// All servlet mappings with an explicit URL path prefix. The local map
  /// is built first; closure modules merge over it in discovery order, so
  /// an inherited redeclaration of a path wins.
  pub fn servlets_with_prefix(
    &self,
    reader: &dyn ModuleReader,
    prefix: &str,
  ) -> Result<BTreeMap<String, String>, ModuleError> {
    let mut servlets = self.local_servlets(prefix);
    for module in self.inherits(reader)? {
      servlets.extend(module.local_servlets(prefix));
    }
    Ok(servlets)
  }

  /// Flatten every aggregate view into a serializable summary, servlet
  /// paths prefixed with the module's output path.
  pub fn resolve(&self, reader: &dyn ModuleReader) -> Result<ResolvedModule, ModuleError> {
    self.resolve_with_prefix(reader, None)
  }

  /// Like [`Module::resolve`] with an explicit servlet path prefix.
  pub fn resolve_with_prefix(
    &self,
    reader: &dyn ModuleReader,
    prefix: Option<&str>,
  ) -> Result<ResolvedModule, ModuleError> {
    let servlets = match prefix {
      Some(prefix) => self.servlets_with_prefix(reader, prefix)?,
      None => self.servlets(reader)?,
    };
    Ok(ResolvedModule {
      name: self.name.clone(),
      output_path: self.output_path().to_string(),
      package: self.package().to_string(),
      public_path: self.public_path().to_string(),
      source_paths: self.source_paths(),
      super_source_paths: self.super_source_paths(),
      entry_points: self.entry_points(reader)?,
      servlets,
      inherits: self
        .inherits(reader)?
        .iter()
        .map(|module| module.name().to_string())
        .collect(),
    })
  }
}

/// Queue a module's local inherit declarations, reversed so the stack pops
/// them back in declaration order. Built-in names are dropped here, before
/// any resolution is attempted.
fn push_inherit_edges(
  stack: &mut Vec<(String, String)>,
  reader: &dyn ModuleReader,
  requested_by: &str,
  names: Vec<String>,
) {
  for name in names.into_iter().rev() {
    if reader.is_builtin(&name) {
      trace!(module = %requested_by, inherits = %name, "skipping built-in module");
      continue;
    }
    stack.push((requested_by.to_string(), name));
  }
}

impl PartialEq for Module {
  fn eq(&self, other: &Self) -> bool {
    self.name == other.name
  }
}

impl Eq for Module {}

impl Hash for Module {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.name.hash(state);
  }
}

// The memoized closure may be cyclic; printing it would not terminate.
impl fmt::Debug for Module {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Module")
      .field("name", &self.name)
      .field("source_file", &self.source_file)
      .finish_non_exhaustive()
  }
}

/// Fully aggregated view of one module, as consumed by downstream tooling.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedModule {
  pub name: String,
  pub output_path: String,
  pub package: String,
  pub public_path: String,
  pub source_paths: Vec<String>,
  pub super_source_paths: Vec<String>,
  pub entry_points: Vec<String>,
  pub servlets: BTreeMap<String, String>,
  pub inherits: Vec<String>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::reader::MemoryModuleReader;

  fn closure_names(reader: &MemoryModuleReader, name: &str) -> Vec<String> {
    let module = reader.read_module(name).unwrap();
    module
      .inherits(reader)
      .unwrap()
      .iter()
      .map(|m| m.name().to_string())
      .collect()
  }

  #[test]
  fn defaults_without_declarations() {
    let module = Module::from_source("com.example.App", "<module/>").unwrap();
    assert_eq!(module.output_path(), "com.example.App");
    assert_eq!(module.package(), "com.example");
    assert_eq!(module.public_path(), DEFAULT_PUBLIC_PATH);
    assert_eq!(module.source_paths(), vec![DEFAULT_SOURCE_PATH.to_string()]);
    assert!(module.super_source_paths().is_empty());
    assert!(module.local_entry_points().is_empty());
    assert!(module.local_inherit_names().is_empty());
  }

  #[test]
  fn unqualified_name_has_empty_package() {
    let module = Module::from_source("App", "<module/>").unwrap();
    assert_eq!(module.package(), "");
    assert_eq!(module.output_path(), "App");
  }

  #[test]
  fn rename_to_overrides_output_path() {
    let module = Module::from_source("com.example.App", r#"<module rename-to="app"/>"#).unwrap();
    assert_eq!(module.output_path(), "app");
  }

  #[test]
  fn declared_paths_replace_defaults() {
    let module = Module::from_source(
      "com.example.App",
      r#"
        <module>
          <public path="static"/>
          <source path="client"/>
          <source path="shared"/>
          <super-source path="jre"/>
        </module>
      "#,
    )
    .unwrap();
    assert_eq!(module.public_path(), "static");
    assert_eq!(module.source_paths(), vec!["client".to_string(), "shared".to_string()]);
    assert_eq!(module.super_source_paths(), vec!["jre".to_string()]);
  }

  #[test]
  fn entry_points_follow_discovery_order() {
    let reader = MemoryModuleReader::new()
      .with_module(
        "app.Main",
        r#"
          <module>
            <entry-point class="app.client.Main"/>
            <inherits name="lib.B"/>
            <inherits name="lib.C"/>
          </module>
        "#,
      )
      .with_module(
        "lib.B",
        r#"
          <module>
            <entry-point class="lib.client.B"/>
            <inherits name="lib.D"/>
          </module>
        "#,
      )
      .with_module("lib.C", r#"<module><entry-point class="lib.client.C"/></module>"#)
      .with_module("lib.D", r#"<module><entry-point class="lib.client.D"/></module>"#);

    let main = reader.read_module("app.Main").unwrap();
    let entry_points = main.entry_points(&reader).unwrap();

    // Preorder DFS over declaration order: B before its child D, D before C.
    assert_eq!(
      entry_points,
      vec![
        "app.client.Main".to_string(),
        "lib.client.B".to_string(),
        "lib.client.D".to_string(),
        "lib.client.C".to_string(),
      ]
    );

    // Order-stable across repeated calls on the same resolved graph.
    assert_eq!(main.entry_points(&reader).unwrap(), entry_points);
  }

  #[test]
  fn three_node_cycle_closures() {
    let reader = MemoryModuleReader::new()
      .with_module("cycle.A", r#"<module><inherits name="cycle.B"/></module>"#)
      .with_module("cycle.B", r#"<module><inherits name="cycle.C"/></module>"#)
      .with_module("cycle.C", r#"<module><inherits name="cycle.A"/></module>"#);

    assert_eq!(closure_names(&reader, "cycle.A"), vec!["cycle.B", "cycle.C"]);
    assert_eq!(closure_names(&reader, "cycle.B"), vec!["cycle.C", "cycle.A"]);
    assert_eq!(closure_names(&reader, "cycle.C"), vec!["cycle.A", "cycle.B"]);
  }

  #[test]
  fn self_inheriting_module_has_empty_closure() {
    let reader =
      MemoryModuleReader::new().with_module("loop.A", r#"<module><inherits name="loop.A"/></module>"#);
    assert!(closure_names(&reader, "loop.A").is_empty());
  }

  #[test]
  fn diamond_graph_deduplicates() {
    let reader = MemoryModuleReader::new()
      .with_module(
        "d.A",
        r#"<module><inherits name="d.B"/><inherits name="d.C"/></module>"#,
      )
      .with_module("d.B", r#"<module><inherits name="d.D"/></module>"#)
      .with_module("d.C", r#"<module><inherits name="d.D"/></module>"#)
      .with_module("d.D", "<module/>");

    assert_eq!(closure_names(&reader, "d.A"), vec!["d.B", "d.D", "d.C"]);
  }

  #[test]
  fn inherited_servlet_overrides_local() {
    let reader = MemoryModuleReader::new()
      .with_module(
        "app.Main",
        r#"
          <module>
            <servlet path="/a" class="app.server.X"/>
            <inherits name="lib.Override"/>
          </module>
        "#,
      )
      .with_module(
        "lib.Override",
        r#"<module><servlet path="/a" class="lib.server.Y"/></module>"#,
      );

    let main = reader.read_module("app.Main").unwrap();
    let servlets = main.servlets_with_prefix(&reader, "").unwrap();
    assert_eq!(servlets.get("/a").map(String::as_str), Some("lib.server.Y"));
  }

  #[test]
  fn servlet_paths_take_the_prefix() {
    let reader = MemoryModuleReader::new().with_module(
      "app.Main",
      r#"
        <module rename-to="app">
          <servlet path="/rpc" class="app.server.Rpc"/>
        </module>
      "#,
    );

    let main = reader.read_module("app.Main").unwrap();

    // The no-prefix variant falls back to the output path.
    let servlets = main.servlets(&reader).unwrap();
    assert_eq!(servlets.get("app/rpc").map(String::as_str), Some("app.server.Rpc"));

    let servlets = main.servlets_with_prefix(&reader, "web").unwrap();
    assert_eq!(servlets.get("web/rpc").map(String::as_str), Some("app.server.Rpc"));
  }

  #[test]
  fn unresolved_inherit_names_both_modules() {
    let reader = MemoryModuleReader::new()
      .with_module("app.Main", r#"<module><inherits name="lib.Absent"/></module>"#);

    let main = reader.read_module("app.Main").unwrap();
    let err = main.inherits(&reader).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("app.Main"), "missing requester in: {message}");
    assert!(message.contains("lib.Absent"), "missing target in: {message}");
  }

  #[test]
  fn builtin_prefixes_are_not_traversed() {
    let reader = MemoryModuleReader::new()
      .with_builtin_prefixes(vec!["sdk.".to_string()])
      .with_module(
        "app.Main",
        r#"<module><inherits name="sdk.Core"/><inherits name="lib.Real"/></module>"#,
      )
      .with_module("lib.Real", "<module/>");

    // sdk.Core has no descriptor anywhere; skipping it must keep resolution
    // alive and out of the closure.
    assert_eq!(closure_names(&reader, "app.Main"), vec!["lib.Real"]);
  }

  #[test]
  fn resolve_flattens_every_view() {
    let reader = MemoryModuleReader::new()
      .with_module(
        "app.Main",
        r#"
          <module rename-to="app">
            <entry-point class="app.client.Main"/>
            <servlet path="/rpc" class="app.server.Rpc"/>
            <inherits name="lib.Widgets"/>
          </module>
        "#,
      )
      .with_module("lib.Widgets", r#"<module><source path="widgets"/></module>"#);

    let resolved = reader.read_module("app.Main").unwrap().resolve(&reader).unwrap();
    assert_eq!(resolved.name, "app.Main");
    assert_eq!(resolved.output_path, "app");
    assert_eq!(resolved.package, "app");
    assert_eq!(resolved.entry_points, vec!["app.client.Main".to_string()]);
    assert_eq!(resolved.servlets.get("app/rpc").map(String::as_str), Some("app.server.Rpc"));
    assert_eq!(resolved.inherits, vec!["lib.Widgets".to_string()]);
  }

  #[test]
  fn module_identity_is_the_name() {
    let a = Module::from_source("same.Name", r#"<module rename-to="one"/>"#).unwrap();
    let b = Module::from_source("same.Name", r#"<module rename-to="two"/>"#).unwrap();
    assert_eq!(a, b);

    let mut set = HashSet::new();
    set.insert(a);
    assert!(set.contains(&b));
  }
}
