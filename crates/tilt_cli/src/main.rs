//! Tilt CLI: runs the verification scenarios against the behavioural
//! device models.
//!
//! Provides `tilt list` to show the available scenarios, `tilt run` to run
//! some or all of them with a text or JSON report, and `tilt vectors` to
//! print the rotation oracle table.

#![warn(missing_docs)]

mod run;
mod scenarios;
mod vectors;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tilt_config::{BenchConfig, ConfigError, CONFIG_FILE};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Tilt: a cycle-synchronous test bench for the IMU fusion pipeline.
#[derive(Parser, Debug)]
#[command(name = "tilt", version, about = "Tilt verification harness")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `tilt.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the available scenarios.
    List,
    /// Run scenarios and report the results.
    Run(RunArgs),
    /// Print the rotation oracle vector table.
    Vectors,
}

/// Arguments for the `tilt run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Specific scenario name to run (optional).
    pub name: Option<String>,

    /// Substring filter for scenario names.
    #[arg(long)]
    pub filter: Option<String>,

    /// Report format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Report output format.
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
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

impl GlobalArgs {
    /// Loads the configuration: the `--config` file if given, else
    /// `tilt.toml` in the current directory if present, else the defaults.
    pub fn load_config(&self) -> Result<BenchConfig, ConfigError> {
        match &self.config {
            Some(path) => {
                debug!(path = path.as_str(), "loading configuration");
                tilt_config::load_config_file(Path::new(path))
            }
            None if PathBuf::from(CONFIG_FILE).is_file() => {
                debug!(path = CONFIG_FILE, "loading configuration");
                tilt_config::load_config(Path::new("."))
            }
            None => Ok(BenchConfig::default()),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };

    let result = match cli.command {
        Command::List => run::list(),
        Command::Run(ref args) => run::run(args, &global),
        Command::Vectors => vectors::run(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the log subscriber. `RUST_LOG` wins over the flags.
fn init_logging(quiet: bool, verbose: bool) {
    let level = default_level(quiet, verbose);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn default_level(quiet: bool, verbose: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    }
}
