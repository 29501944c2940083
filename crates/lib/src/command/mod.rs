//! JVM toolchain command assembly and execution.
//!
//! [`JavaCommand`] collects everything one forked toolchain invocation
//! needs — main class, classpath, JVM flags, system properties, environment
//! overrides — renders a deterministic argument vector, and runs the child
//! with line-oriented output draining and an optional wall-clock timeout.
//!
//! Two policy decisions here are load-bearing:
//!
//! - Timeout expiry is success, not failure. Toolchain daemons are launched
//!   best-effort and reaped when the budget runs out; only a failed launch
//!   or a non-zero exit is an error.
//! - Unix spawns the JVM directly (the classpath argument must reach the
//!   child byte-exact; a shell in between re-tokenizes it), while Windows
//!   routes through `cmd.exe` because a direct spawn runs into the host
//!   command-line length ceiling on toolchain-sized classpaths. Collapsing
//!   the two paths reproduces known breakage on one platform or the other.

mod classpath;
mod jvm;

pub use classpath::{ClasspathProcessor, DedupeClasspath, PrependClasspath};

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Line-oriented sink for one of the child's output streams.
pub type OutputSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Errors that can occur while assembling or running a toolchain command.
#[derive(Debug, Error)]
pub enum CommandError {
  /// The configured JVM location does not exist.
  #[error("configured JVM at '{}' does not exist", path.display())]
  JvmMissing { path: PathBuf },

  /// The classpath cannot be rendered into a single search-path argument.
  #[error("cannot render classpath: {message}")]
  InvalidClasspath { message: String },

  /// A system property key would corrupt the rendered `-D` flag.
  #[error("invalid system property key '{key}'")]
  InvalidSystemProperty { key: String },

  /// The child process could not be started.
  #[error("failed to launch [[ {command_line} ]]")]
  Launch {
    command_line: String,
    #[source]
    source: std::io::Error,
  },

  /// The child ran and exited with a non-zero status. `None` means the
  /// child died to a signal.
  #[error("command [[ {command_line} ]] failed with status {status:?}")]
  ExitStatus {
    command_line: String,
    status: Option<i32>,
  },
}

/// One forked JVM toolchain invocation.
///
/// Built incrementally, executed with [`JavaCommand::execute`]. Classpath
/// processors mutate state in place, so instances should be treated as
/// single-use: re-executing one re-runs the processors against the
/// already-mutated classpath.
pub struct JavaCommand {
  main_class: String,
  classpath: Vec<PathBuf>,
  args: Vec<String>,
  system_properties: BTreeMap<String, String>,
  env: BTreeMap<String, String>,
  jvm_args: Vec<String>,
  jvm: Option<PathBuf>,
  timeout: Option<Duration>,
  processors: Vec<Box<dyn ClasspathProcessor>>,
  stdout_sink: OutputSink,
  stderr_sink: OutputSink,
}

impl JavaCommand {
  /// A command that will invoke `main_class`, with child stdout routed to
  /// the info log channel and stderr to the error channel.
  pub fn new(main_class: impl Into<String>) -> Self {
    Self {
      main_class: main_class.into(),
      classpath: Vec::new(),
      args: Vec::new(),
      system_properties: BTreeMap::new(),
      env: BTreeMap::new(),
      jvm_args: Vec::new(),
      jvm: None,
      timeout: None,
      processors: Vec::new(),
      stdout_sink: Arc::new(|line| info!(target: "javelin::toolchain", "{line}")),
      stderr_sink: Arc::new(|line| error!(target: "javelin::toolchain", "{line}")),
    }
  }

  pub fn main_class(&self) -> &str {
    &self.main_class
  }

  /// Current classpath entries, in launch order.
  pub fn classpath(&self) -> &[PathBuf] {
    &self.classpath
  }

  /// Append entries to the classpath, preserving their order.
  pub fn add_to_classpath<I, P>(mut self, entries: I) -> Self
  where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
  {
    self.classpath.extend(entries.into_iter().map(Into::into));
    self
  }

  /// Insert entries at the front of the classpath, preserving their order.
  pub fn prepend_to_classpath<I, P>(mut self, entries: I) -> Self
  where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
  {
    let mut entries: Vec<PathBuf> = entries.into_iter().map(Into::into).collect();
    entries.extend(std::mem::take(&mut self.classpath));
    self.classpath = entries;
    self
  }

  /// Append one positional argument.
  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  /// Append a flag and its value as two arguments.
  pub fn arg_pair(self, flag: impl Into<String>, value: impl Into<String>) -> Self {
    self.arg(flag).arg(value)
  }

  /// Append an argument only when `condition` holds.
  pub fn arg_if(self, condition: bool, arg: impl Into<String>) -> Self {
    if condition { self.arg(arg) } else { self }
  }

  /// Append several positional arguments.
  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  /// Set a `-D` system property.
  pub fn system_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.system_properties.insert(key.into(), value.into());
    self
  }

  /// Override one environment variable for the child process. The child
  /// otherwise inherits the parent environment.
  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  /// Append a JVM flag (rendered before `-classpath`).
  pub fn jvm_arg(mut self, arg: impl Into<String>) -> Self {
    self.jvm_args.push(arg.into());
    self
  }

  /// Select the JVM to fork: either the executable itself or an
  /// installation directory. Defaults to `$JAVA_HOME`, then `PATH`.
  pub fn jvm(mut self, path: impl Into<PathBuf>) -> Self {
    self.jvm = Some(path.into());
    self
  }

  /// Set the wall-clock budget. Expiry reaps the child and reports
  /// success.
  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  /// Set the wall-clock budget in seconds; zero means unbounded.
  pub fn timeout_secs(mut self, secs: u64) -> Self {
    self.timeout = (secs > 0).then(|| Duration::from_secs(secs));
    self
  }

  /// Register a classpath processor. Processors run in registration order,
  /// each with mutable access to the classpath, once per execution.
  pub fn processor(mut self, processor: impl ClasspathProcessor + 'static) -> Self {
    self.processors.push(Box::new(processor));
    self
  }

  /// Replace the sink receiving the child's stdout lines.
  pub fn stdout_sink(mut self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
    self.stdout_sink = Arc::new(sink);
    self
  }

  /// Replace the sink receiving the child's stderr lines.
  pub fn stderr_sink(mut self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
    self.stderr_sink = Arc::new(sink);
    self
  }

  /// Render the full argument vector in launch order: JVM flags,
  /// `-classpath`, the joined classpath, one `-D<key>=<value>` per system
  /// property in map order, the main class, then positional arguments.
  pub fn rendered_args(&self) -> Result<Vec<OsString>, CommandError> {
    for key in self.system_properties.keys() {
      if key.is_empty() || key.contains('=') || key.contains(char::is_whitespace) {
        return Err(CommandError::InvalidSystemProperty { key: key.clone() });
      }
    }

    let mut argv: Vec<OsString> = self.jvm_args.iter().map(OsString::from).collect();
    argv.push("-classpath".into());
    argv.push(classpath::join_classpath(&self.classpath)?);
    for (key, value) in &self.system_properties {
      argv.push(format!("-D{key}={value}").into());
    }
    argv.push(self.main_class.as_str().into());
    argv.extend(self.args.iter().map(OsString::from));
    Ok(argv)
  }

  /// Run the command to completion.
  ///
  /// Classpath processors run first, in registration order. The child's
  /// stdout and stderr are drained line-by-line through the configured
  /// sinks by two concurrent reader tasks (both streams can fill their pipe
  /// buffers at once; draining them serially deadlocks). A configured
  /// timeout that expires kills the child, stops the readers, logs a
  /// warning and returns `Ok(())`. There are no retries: a failed launch or
  /// a non-zero exit is terminal.
  pub async fn execute(&mut self) -> Result<(), CommandError> {
    for processor in &self.processors {
      processor.process(&mut self.classpath);
    }

    let argv = self.rendered_args()?;
    let program = jvm::resolve_runtime(self.jvm.as_deref())?;
    let command_line = render_command_line(&program, &argv);
    debug!(command = %command_line, "executing toolchain command");

    let mut command = spawn_command(&program, &argv);
    command
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    for (key, value) in &self.env {
      debug!(key = %key, value = %value, "child environment override");
      command.env(key, value);
    }

    let mut child = command.spawn().map_err(|source| CommandError::Launch {
      command_line: command_line.clone(),
      source,
    })?;

    let stdout_task = drain_lines(child.stdout.take(), self.stdout_sink.clone());
    let stderr_task = drain_lines(child.stderr.take(), self.stderr_sink.clone());

    let status = match self.timeout {
      Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
          let _ = child.kill().await;
          stdout_task.abort();
          stderr_task.abort();
          warn!(
            timeout_secs = limit.as_secs(),
            "toolchain process killed on time-out"
          );
          return Ok(());
        }
      },
      None => child.wait().await,
    };

    let status = status.map_err(|source| CommandError::Launch {
      command_line: command_line.clone(),
      source,
    })?;

    // Let the readers flush whatever the child wrote before it exited.
    let _ = stdout_task.await;
    let _ = stderr_task.await;

    if !status.success() {
      return Err(CommandError::ExitStatus {
        command_line,
        status: status.code(),
      });
    }
    Ok(())
  }
}

impl fmt::Debug for JavaCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("JavaCommand")
      .field("main_class", &self.main_class)
      .field("classpath", &self.classpath)
      .field("args", &self.args)
      .field("system_properties", &self.system_properties)
      .field("env", &self.env)
      .field("jvm_args", &self.jvm_args)
      .field("jvm", &self.jvm)
      .field("timeout", &self.timeout)
      .field("processors", &self.processors.len())
      .finish_non_exhaustive()
  }
}

/// Drain one output stream line-by-line into a sink.
fn drain_lines<R>(stream: Option<R>, sink: OutputSink) -> JoinHandle<()>
where
  R: AsyncRead + Unpin + Send + 'static,
{
  tokio::spawn(async move {
    let stream = match stream {
      Some(stream) => stream,
      None => return,
    };
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
      sink(&line);
    }
  })
}

// Unix spawns the JVM directly so the argument vector — the classpath in
// particular — reaches the child byte-exact. Windows goes through cmd.exe
// to stay under the host command-line length ceiling.
#[cfg(not(windows))]
fn spawn_command(program: &Path, argv: &[OsString]) -> Command {
  let mut command = Command::new(program);
  command.args(argv);
  command
}

#[cfg(windows)]
fn spawn_command(program: &Path, argv: &[OsString]) -> Command {
  let mut command = Command::new("cmd.exe");
  command.arg("/C").arg(program);
  command.args(argv);
  command
}

/// Human-readable command line carried by errors for reproduction.
fn render_command_line(program: &Path, argv: &[OsString]) -> String {
  let mut rendered = program.display().to_string();
  for arg in argv {
    rendered.push(' ');
    rendered.push_str(&arg.to_string_lossy());
  }
  rendered
}
