//! Connection configuration and its two resolution paths.

use crate::validation::{
    database_index, parse_flag, parse_number, required_lifetime, required_port, required_text,
};
use kvlink_core::{ConfigurationError, KvResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Prefix of every environment variable read by [`ConnectionConfig::from_env`].
pub const ENV_PREFIX: &str = "REDIS_";

/// Explicit configuration object.
///
/// Every field is optional here; [`ConnectionConfig::from_settings`] decides
/// which ones are required. Field names match the `REDIS_*` variable suffixes
/// in lower case, so the same struct deserializes from a `redis.toml` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisSettings {
    /// Server host name or address.
    pub host: Option<String>,
    /// Server port.
    pub port: Option<u16>,
    /// Password sent with `AUTH`.
    pub password: Option<String>,
    /// Default key lifetime in seconds.
    pub lifetime: Option<u64>,
    /// Keep one long-lived connection (default) or reconnect per call.
    pub persistent: Option<bool>,
    /// Prefix prepended to every key on the wire.
    pub prefix: Option<String>,
    /// Database index selected after connecting.
    pub db: Option<u8>,
}

impl RedisSettings {
    /// Settings with the four required fields filled in.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>, lifetime: u64) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            password: Some(password.into()),
            lifetime: Some(lifetime),
            ..Self::default()
        }
    }

    /// Reads settings through a name lookup using the fixed key names
    /// `HOST`, `PORT`, `PASSWORD`, `LIFETIME`, `PERSISTENT`, `PREFIX`, `DB`.
    ///
    /// Empty values are treated as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.is_empty());

        Ok(Self {
            host: read("HOST"),
            port: read("PORT").map(|raw| parse_number("port", &raw)).transpose()?,
            password: read("PASSWORD"),
            lifetime: read("LIFETIME")
                .map(|raw| parse_number("lifetime", &raw))
                .transpose()?,
            persistent: read("PERSISTENT")
                .map(|raw| parse_flag("persistent", &raw))
                .transpose()?,
            prefix: read("PREFIX"),
            db: read("DB").map(|raw| parse_number("db", &raw)).transpose()?,
        })
    }
}

/// Validated, immutable connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    host: String,
    port: u16,
    password: String,
    default_lifetime: u64,
    persistent: bool,
    key_prefix: String,
    default_db: u8,
}

impl ConnectionConfig {
    /// Resolves a configuration from an explicit settings object.
    pub fn from_settings(settings: &RedisSettings) -> KvResult<Self> {
        let config = Self {
            host: required_text("host", settings.host.as_deref())?,
            port: required_port(settings.port)?,
            password: required_text("password", settings.password.as_deref())?,
            default_lifetime: required_lifetime(settings.lifetime)?,
            persistent: settings.persistent.unwrap_or(true),
            key_prefix: settings.prefix.clone().unwrap_or_default(),
            default_db: database_index(settings.db)?,
        };

        debug!(config = ?config, "Resolved Redis connection config");
        Ok(config)
    }

    /// Resolves a configuration through a name lookup.
    ///
    /// The lookup receives the bare key names (`HOST`, `PORT`, ...); this is
    /// the pure core of [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> KvResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = RedisSettings::from_lookup(lookup)?;
        Self::from_settings(&settings)
    }

    /// Resolves a configuration from `REDIS_*` environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> KvResult<Self> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        Self::from_lookup(|name| std::env::var(format!("{ENV_PREFIX}{name}")).ok())
    }

    /// Server host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Password sent with `AUTH`.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Default key lifetime in seconds, never zero.
    #[must_use]
    pub const fn default_lifetime(&self) -> u64 {
        self.default_lifetime
    }

    /// Default key lifetime as a Duration.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_lifetime)
    }

    /// Whether the session outlives a single call.
    #[must_use]
    pub const fn persistent(&self) -> bool {
        self.persistent
    }

    /// Prefix prepended to every key on the wire.
    #[must_use]
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Database selected when a call does not ask for one.
    #[must_use]
    pub const fn default_db(&self) -> u8 {
        self.default_db
    }

    /// Returns the server address.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"***")
            .field("default_lifetime", &self.default_lifetime)
            .field("persistent", &self.persistent)
            .field("key_prefix", &self.key_prefix)
            .field("default_db", &self.default_db)
            .finish()
    }
}

/// Where a session manager gets its configuration from.
///
/// `Settings` and `Environment` are resolved lazily, at first connect, and
/// the result is kept for every later reconnect.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Already validated.
    Resolved(ConnectionConfig),
    /// Explicit settings object.
    Settings(RedisSettings),
    /// `REDIS_*` environment variables.
    Environment,
}

impl ConfigSource {
    /// Runs the resolution for this source.
    pub fn resolve(&self) -> KvResult<ConnectionConfig> {
        match self {
            Self::Resolved(config) => Ok(config.clone()),
            Self::Settings(settings) => ConnectionConfig::from_settings(settings),
            Self::Environment => ConnectionConfig::from_env(),
        }
    }
}

impl From<ConnectionConfig> for ConfigSource {
    fn from(config: ConnectionConfig) -> Self {
        Self::Resolved(config)
    }
}

impl From<RedisSettings> for ConfigSource {
    fn from(settings: RedisSettings) -> Self {
        Self::Settings(settings)
    }
}
