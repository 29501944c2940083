use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

use cmd::RunOptions;
use output::OutputFormat;

/// javelin - module descriptor resolution and JVM toolchain launcher
#[derive(Parser)]
#[command(name = "javelin")]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// List every module reachable from the given roots
  Modules {
    /// Module root directories searched for descriptors
    #[arg(short, long = "root", default_value = "src")]
    roots: Vec<PathBuf>,
  },

  /// Resolve one module and print its flattened configuration
  Inspect {
    /// Logical module name (e.g. com.example.App)
    module: String,

    /// Module root directories searched for descriptors
    #[arg(short, long = "root", default_value = "src")]
    roots: Vec<PathBuf>,

    /// Name prefixes treated as toolkit built-ins (never traversed)
    #[arg(long = "builtin-prefix")]
    builtin_prefixes: Vec<String>,

    /// Servlet path prefix (defaults to the module's output path)
    #[arg(long)]
    prefix: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
  },

  /// Fork a JVM toolchain process
  Run {
    /// Fully-qualified main class
    main_class: String,

    /// Classpath entries, in search order
    #[arg(long = "cp")]
    classpath: Vec<PathBuf>,

    /// JVM executable or installation directory (defaults to JAVA_HOME)
    #[arg(long)]
    jvm: Option<PathBuf>,

    /// Extra JVM flags
    #[arg(long = "jvm-arg")]
    jvm_args: Vec<String>,

    /// System properties as key=value
    #[arg(short = 'D', value_name = "KEY=VALUE")]
    defines: Vec<String>,

    /// Environment overrides for the child as key=value
    #[arg(long = "env", value_name = "KEY=VALUE")]
    env: Vec<String>,

    /// Wall-clock budget (e.g. "90s", "10m"); expiry reaps the child and
    /// reports success
    #[arg(long)]
    timeout: Option<humantime::Duration>,

    /// Drop duplicate classpath entries before launch
    #[arg(long)]
    dedupe_classpath: bool,

    /// Arguments passed to the main class
    #[arg(last = true)]
    args: Vec<String>,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .without_time()
    .init();

  let cli = Cli::parse();

  match cli.command {
    Commands::Modules { roots } => cmd::cmd_modules(&roots),
    Commands::Inspect {
      module,
      roots,
      builtin_prefixes,
      prefix,
      format,
    } => cmd::cmd_inspect(&module, &roots, builtin_prefixes, prefix.as_deref(), format),
    Commands::Run {
      main_class,
      classpath,
      jvm,
      jvm_args,
      defines,
      env,
      timeout,
      dedupe_classpath,
      args,
    } => cmd::cmd_run(RunOptions {
      main_class,
      classpath,
      jvm,
      jvm_args,
      defines,
      env,
      timeout: timeout.map(Into::into),
      dedupe_classpath,
      args,
    }),
  }
}
