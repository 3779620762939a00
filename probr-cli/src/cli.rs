//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "probr.toml";

/// Probr -- compliance probe runner.
///
/// Use `probr <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "probr", version, about, long_about = None)]
pub struct Cli {
    /// Path to the probr.toml configuration file.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run registered probes and exit with the aggregate exit code.
    Run(RunArgs),

    /// List registered probes and their exclusion status.
    List,

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- run ----

/// Run probes against the configured environment.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run only the named probe (repeatable). Default: every registered probe.
    #[arg(short, long = "probe", value_name = "NAME")]
    pub probes: Vec<String>,

    /// Write raw per-probe runner output into this directory.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

// ---- config ----

/// Manage probr configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, audit, summary, runner, exclusions, service_packs).
        #[arg(long)]
        section: Option<String>,
    },
}
