//! Unified error types for the cache client.

use thiserror::Error;

/// Reasons a connection configuration can be rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A required field was absent, empty or zero.
    #[error("The Redis {field} settings not found")]
    Missing { field: &'static str },

    /// A field was present but could not be parsed.
    #[error("The Redis {field} settings are invalid: '{value}'")]
    Invalid { field: &'static str, value: String },

    /// The default key lifetime was zero.
    #[error("The Redis lifetime settings must not be 0")]
    ZeroLifetime,

    /// The database index is outside the range a server exposes.
    #[error("The Redis db settings must be between 0 and {max}, got {db}")]
    DatabaseOutOfRange { db: u8, max: u8 },

    /// A configuration source (file, environment) could not be read.
    #[error("Could not load Redis settings: {0}")]
    Source(String),
}

impl ConfigurationError {
    /// Name of the configuration field this error is about.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::Missing { field } | Self::Invalid { field, .. } => *field,
            Self::ZeroLifetime => "lifetime",
            Self::DatabaseOutOfRange { .. } => "db",
            Self::Source(_) => "source",
        }
    }
}

/// Unified error type for every cache client operation.
///
/// The first five variants cover the connect sequence, one per step, so a
/// caller can tell which step failed. The remaining ones are raised while a
/// command is running on an established session.
#[derive(Error, Debug)]
pub enum KvError {
    // ============ Connect Sequence Errors ============
    /// Missing or invalid connection parameter
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Transport connection could not be opened
    #[error("Could not connect to the Redis server {host}:{port}: {message}")]
    Connection {
        host: String,
        port: u16,
        message: String,
    },

    /// Credentials were rejected
    #[error("Authentication with the Redis server failed: {0}")]
    Authentication(String),

    /// Database index was rejected
    #[error("Redis server selected database failed, the db index: {db}: {message}")]
    DatabaseSelection { db: u8, message: String },

    /// Client-side option was rejected
    #[error("Invalid client option {name}: '{value}'")]
    Option { name: &'static str, value: String },

    // ============ Command Errors ============
    /// I/O failure or dropped connection while a command was in flight
    #[error("Transport error during {command}: {message}")]
    Transport {
        command: &'static str,
        message: String,
    },

    /// Server answered a command with an error reply
    #[error("Command {command} failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KvError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Connection { .. } => "CONNECTION_ERROR",
            Self::Authentication(_) => "AUTHENTICATION_ERROR",
            Self::DatabaseSelection { .. } => "DATABASE_SELECTION_ERROR",
            Self::Option { .. } => "OPTION_ERROR",
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::Command { .. } => "COMMAND_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Creates a connection error for an endpoint.
    #[must_use]
    pub fn connection<T: ToString>(host: &str, port: u16, message: T) -> Self {
        Self::Connection {
            host: host.to_string(),
            port,
            message: message.to_string(),
        }
    }

    /// Creates a transport error for a command.
    #[must_use]
    pub fn transport<T: ToString>(command: &'static str, message: T) -> Self {
        Self::Transport {
            command,
            message: message.to_string(),
        }
    }

    /// Creates a command error for a command.
    #[must_use]
    pub fn command<T: ToString>(command: &'static str, message: T) -> Self {
        Self::Command {
            command,
            message: message.to_string(),
        }
    }

    /// Checks if the error means the connection itself is unusable.
    ///
    /// A session that produced one of these is discarded and the next call
    /// reconnects from scratch.
    #[must_use]
    pub const fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Transport { .. })
    }
}
