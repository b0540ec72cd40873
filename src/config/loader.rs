use anyhow::{anyhow, Context, Result};
use ::config::{Config, Environment, File, FileFormat};
use std::path::Path;
use tracing::{debug, info};

use super::runtime::ConsoleConfig;

pub const ENV_PREFIX: &str = "GRIDBOT";

/// Loads defaults, then `path` (TOML, optional), then `GRIDBOT__SECTION__KEY`
/// environment variables. `.env` is read first if present.
pub fn load_config(path: &str) -> Result<ConsoleConfig> {
    if let Ok(env_file) = dotenvy::dotenv() {
        debug!("Loaded environment from {}", env_file.display());
    }

    if Path::new(path).exists() {
        info!("Loading configuration from {}", path);
    } else {
        debug!("No configuration file at {}, using defaults and environment", path);
    }

    let settings = Config::builder()
        .add_source(File::new(path, FileFormat::Toml).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("failed to read configuration from {}", path))?;

    let config: ConsoleConfig = settings
        .try_deserialize()
        .context("invalid configuration values")?;

    config
        .validate()
        .map_err(|errors| anyhow!("invalid configuration: {}", errors.join(", ")))?;

    Ok(config)
}
