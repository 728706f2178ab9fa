//! The command-line interface for the Kiln build engine.
//!
//! Provides `kiln build` to compile a project against its configured
//! compiler versions, `kiln plan` to show the build order without compiling,
//! and `kiln cache` to maintain the on-disk artifact cache.

#![warn(missing_docs)]

mod build;
mod cache;
mod imports;
mod pipeline;
mod plan;

use std::io::IsTerminal;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Multi-version compiler builds with artifact caching.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Kiln build engine")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a custom `kiln.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile every source unit of the project.
    Build(BuildArgs),
    /// Show unit groups in build order with their settings and fingerprints.
    Plan,
    /// Maintain the on-disk artifact cache.
    Cache {
        /// The cache operation to run.
        #[command(subcommand)]
        command: CacheCommand,
    },
}

/// Arguments for the `kiln build` subcommand.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Maximum number of concurrent compiler invocations.
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Neither read from nor write to the on-disk cache.
    #[arg(long)]
    pub no_cache: bool,

    /// Output format for diagnostics and the build summary.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// `kiln cache` operations.
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Remove least-recently-used artifacts beyond a limit.
    Prune {
        /// Number of artifacts to keep.
        #[arg(long)]
        max_entries: usize,
    },
    /// Remove every cached artifact.
    Clean,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Diagnostic output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::io::stderr().is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };
    init_tracing(&global);

    let result = match cli.command {
        Command::Build(ref args) => build::run(args, &global),
        Command::Plan => plan::run(&global),
        Command::Cache { ref command } => cache::run(command, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the stderr log subscriber.
///
/// `--verbose` and `--quiet` pick the level outright; otherwise `RUST_LOG`
/// applies, defaulting to warnings.
fn init_tracing(global: &GlobalArgs) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if global.verbose {
        EnvFilter::new("debug")
    } else if global.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(global.color)
                .with_target(true),
        )
        .with(filter)
        .try_init();
}
