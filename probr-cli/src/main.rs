//! Probr CLI -- compliance probe runner command-line tool
//!
//! Loads `probr.toml`, registers the built-in service packs and runs their
//! probes through the external BDD runner. The process exit code is the
//! maximum exit code of every executed probe.

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::path::Path;

use clap::Parser;
use colored::Colorize;

use probr_core::config::{GeneralConfig, ProbrConfig};

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32, CliError> {
    let writer = OutputWriter::new(cli.output);

    match cli.command {
        Commands::Config(args) => {
            // config commands report load errors themselves
            let mut general = GeneralConfig::default();
            if let Some(level) = cli.log_level {
                general.log_level = level;
            }
            init_logging(&general)?;
            commands::config::execute(args, &cli.config, &writer).await?;
            Ok(0)
        }
        Commands::List => {
            let config = prepare(&cli.config, cli.log_level.as_deref()).await?;
            commands::list::execute(&config, &writer)?;
            Ok(0)
        }
        Commands::Run(args) => {
            let config = prepare(&cli.config, cli.log_level.as_deref()).await?;
            commands::run::execute(args, config, &writer).await
        }
    }
}

/// Load the effective configuration and initialize logging from it.
async fn prepare(config_path: &Path, log_level: Option<&str>) -> Result<ProbrConfig, CliError> {
    let config = commands::load_config(config_path, log_level).await?;
    init_logging(&config.general)?;
    tracing::debug!(config = %config_path.display(), "configuration loaded");
    Ok(config)
}

fn init_logging(general: &GeneralConfig) -> Result<(), CliError> {
    logging::init_tracing(general).map_err(|e| CliError::Config(e.to_string()))
}
