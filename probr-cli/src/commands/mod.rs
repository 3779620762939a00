//! Command handlers -- one module per subcommand

pub mod config;
pub mod list;
pub mod run;

use std::path::Path;

use tracing::info;

use probr_core::config::ProbrConfig;
use probr_core::error::{ConfigError, ProbrError};
use probr_core::registry::ProbeRegistry;
use probr_service_packs::{policy_from_config, register_all};

use crate::cli::DEFAULT_CONFIG_PATH;
use crate::error::CliError;

/// Load the effective configuration: defaults, file, env, then CLI flags.
///
/// A missing file is only tolerated for the default `probr.toml` path;
/// an explicitly requested file must exist.
pub async fn load_config(path: &Path, log_level: Option<&str>) -> Result<ProbrConfig, CliError> {
    let mut config = match ProbrConfig::from_file(path).await {
        Ok(config) => config,
        Err(ProbrError::Config(ConfigError::FileNotFound { .. }))
            if path == Path::new(DEFAULT_CONFIG_PATH) =>
        {
            ProbrConfig::default()
        }
        Err(e) => return Err(e.into()),
    };

    config.apply_env_overrides();
    if let Some(level) = log_level {
        config.general.log_level = level.to_owned();
    }
    config.validate()?;
    Ok(config)
}

/// Build a registry with every built-in service pack registered.
pub fn build_registry(config: &ProbrConfig) -> Result<ProbeRegistry, CliError> {
    let registry = ProbeRegistry::new(policy_from_config(config));
    let count = register_all(&registry, config)?;
    info!(count, "probe registry ready");
    Ok(registry)
}
