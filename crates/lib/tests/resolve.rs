//! End-to-end resolver tests over on-disk descriptor trees.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use javelin_lib::reader::{FileModuleReader, ModuleReader, descriptor_path};

fn write_descriptor(root: &Path, name: &str, content: &str) {
  let path = root.join(descriptor_path(name));
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  fs::write(path, content).unwrap();
}

/// A small two-root project: the application modules live in the first
/// root, a shared widget library in the second.
fn project() -> (TempDir, TempDir) {
  let app = TempDir::new().unwrap();
  let lib = TempDir::new().unwrap();

  write_descriptor(
    app.path(),
    "com.example.mail.Mail",
    r#"
      <module rename-to="mail">
        <inherits name="com.example.widgets.Widgets"/>
        <inherits name="sdk.User"/>
        <source path="client"/>
        <source path="shared"/>
        <public path="static"/>
        <entry-point class="com.example.mail.client.Mail"/>
        <servlet path="/mail" class="com.example.mail.server.MailServiceImpl"/>
      </module>
    "#,
  );
  write_descriptor(
    lib.path(),
    "com.example.widgets.Widgets",
    r#"
      <module>
        <inherits name="com.example.widgets.Base"/>
        <entry-point class="com.example.widgets.client.Setup"/>
        <servlet path="/mail" class="com.example.widgets.server.Override"/>
      </module>
    "#,
  );
  write_descriptor(
    lib.path(),
    "com.example.widgets.Base",
    r#"
      <module>
        <super-source path="jre"/>
      </module>
    "#,
  );

  (app, lib)
}

fn project_reader(app: &TempDir, lib: &TempDir) -> FileModuleReader {
  FileModuleReader::new(vec![app.path().to_path_buf(), lib.path().to_path_buf()])
    .with_builtin_prefixes(vec!["sdk.".to_string()])
}

#[test]
fn resolves_across_roots() {
  let (app, lib) = project();
  let reader = project_reader(&app, &lib);

  let resolved = reader
    .read_module("com.example.mail.Mail")
    .unwrap()
    .resolve(&reader)
    .unwrap();

  assert_eq!(resolved.output_path, "mail");
  assert_eq!(resolved.package, "com.example.mail");
  assert_eq!(resolved.public_path, "static");
  assert_eq!(resolved.source_paths, vec!["client".to_string(), "shared".to_string()]);
  assert_eq!(
    resolved.inherits,
    vec![
      "com.example.widgets.Widgets".to_string(),
      "com.example.widgets.Base".to_string(),
    ]
  );
  assert_eq!(
    resolved.entry_points,
    vec![
      "com.example.mail.client.Mail".to_string(),
      "com.example.widgets.client.Setup".to_string(),
    ]
  );
  // The widget library redeclares /mail; the inherited mapping wins.
  assert_eq!(
    resolved.servlets.get("mail/mail").map(String::as_str),
    Some("com.example.widgets.server.Override")
  );
}

#[test]
fn known_modules_span_all_roots() {
  let (app, lib) = project();
  let reader = project_reader(&app, &lib);

  assert_eq!(
    reader.known_modules(),
    vec![
      "com.example.mail.Mail".to_string(),
      "com.example.widgets.Base".to_string(),
      "com.example.widgets.Widgets".to_string(),
    ]
  );
}

#[test]
fn on_disk_cycle_terminates() {
  let root = TempDir::new().unwrap();
  write_descriptor(
    root.path(),
    "cycle.A",
    r#"<module><inherits name="cycle.B"/><entry-point class="cycle.client.A"/></module>"#,
  );
  write_descriptor(
    root.path(),
    "cycle.B",
    r#"<module><inherits name="cycle.A"/><entry-point class="cycle.client.B"/></module>"#,
  );

  let reader = FileModuleReader::new(vec![root.path().to_path_buf()]);
  let a = reader.read_module("cycle.A").unwrap();

  let closure: Vec<String> = a
    .inherits(&reader)
    .unwrap()
    .iter()
    .map(|module| module.name().to_string())
    .collect();
  assert_eq!(closure, vec!["cycle.B".to_string()]);

  assert_eq!(
    a.entry_points(&reader).unwrap(),
    vec!["cycle.client.A".to_string(), "cycle.client.B".to_string()]
  );
}

#[test]
fn unresolved_inherit_fails_the_whole_resolution() {
  let root = TempDir::new().unwrap();
  write_descriptor(
    root.path(),
    "app.Main",
    r#"<module><inherits name="lib.Gone"/></module>"#,
  );

  let reader = FileModuleReader::new(vec![root.path().to_path_buf()]);
  let err = reader
    .read_module("app.Main")
    .unwrap()
    .resolve(&reader)
    .unwrap_err();
  let message = err.to_string();
  assert!(message.contains("app.Main"));
  assert!(message.contains("lib.Gone"));
}

#[test]
fn resolved_view_serializes() {
  let (app, lib) = project();
  let reader = project_reader(&app, &lib);

  let resolved = reader
    .read_module("com.example.mail.Mail")
    .unwrap()
    .resolve(&reader)
    .unwrap();

  let json = serde_json::to_value(&resolved).unwrap();
  assert_eq!(json["name"], "com.example.mail.Mail");
  assert_eq!(json["output_path"], "mail");
  assert!(json["servlets"].is_object());
}
