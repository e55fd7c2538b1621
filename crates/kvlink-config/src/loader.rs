//! Settings loader with layered sources.

use crate::{ConnectionConfig, RedisSettings};
use config::{Config, ConfigError, Environment, File};
use kvlink_core::{ConfigurationError, KvResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name looked up inside the configuration directory.
pub const SETTINGS_FILE: &str = "redis.toml";

/// Loads [`RedisSettings`] from a config directory and the environment.
///
/// Sources are applied in order, later ones overriding earlier ones:
/// 1. `<config_dir>/redis.toml` - optional
/// 2. Environment variables with the `REDIS_` prefix (`REDIS_HOST`, ...)
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    config_dir: PathBuf,
    env_prefix: String,
}

impl SettingsLoader {
    /// Creates a loader reading from `config_dir`.
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            env_prefix: "REDIS".to_string(),
        }
    }

    /// Loader for the default location (`./config`).
    #[must_use]
    pub fn from_default_location() -> Self {
        Self::new("./config")
    }

    /// Overrides the environment variable prefix (without trailing `_`).
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Reads every source and merges them into one settings object.
    pub fn load(&self) -> KvResult<RedisSettings> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let mut builder = Config::builder();

        let file_path = self.config_dir.join(SETTINGS_FILE);
        if Path::new(&file_path).exists() {
            debug!("Loading Redis settings from: {}", file_path.display());
            builder = builder.add_source(File::from(file_path.as_path()).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .try_parsing(true),
        );

        let settings: RedisSettings = builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(source_error)?;

        info!(
            dir = %self.config_dir.display(),
            host = ?settings.host,
            db = ?settings.db,
            "Redis settings loaded"
        );
        Ok(settings)
    }

    /// Loads and validates in one step.
    pub fn resolve(&self) -> KvResult<ConnectionConfig> {
        let settings = self.load()?;
        ConnectionConfig::from_settings(&settings)
    }
}

fn source_error(err: ConfigError) -> ConfigurationError {
    ConfigurationError::Source(err.to_string())
}
