//! Client-side options applied to a session right after connecting.
//!
//! The `redis` crate has no notion of a key prefix or a value serializer, so
//! the session carries them itself and applies them around every command.

use kvlink_core::{KvError, KvResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// How values are turned into bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Serializer {
    /// Strings are stored verbatim, anything else as its JSON text.
    Plain,
    /// Every value is stored as JSON.
    #[default]
    Json,
}

impl Serializer {
    /// Encodes a value for the wire.
    pub fn encode<V: Serialize + ?Sized>(self, value: &V) -> KvResult<Vec<u8>> {
        match self {
            Self::Json => Ok(serde_json::to_vec(value)?),
            Self::Plain => match serde_json::to_value(value)? {
                Value::String(text) => Ok(text.into_bytes()),
                other => Ok(serde_json::to_vec(&other)?),
            },
        }
    }

    /// Decodes a value read from the wire.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> KvResult<T> {
        match self {
            Self::Json => Ok(serde_json::from_slice(bytes)?),
            Self::Plain => {
                if let Ok(text) = std::str::from_utf8(bytes) {
                    if let Ok(value) = serde_json::from_value(Value::String(text.to_owned())) {
                        return Ok(value);
                    }
                }
                Ok(serde_json::from_slice(bytes)?)
            }
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Json => "json",
        }
    }
}

/// A single option change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientOption {
    /// Prefix prepended to every key.
    Prefix(String),
    /// Value serializer.
    Serializer(Serializer),
    /// Keep scanning past empty pages until keys or the end show up.
    ScanRetry(bool),
}

/// The option set carried by a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientOptions {
    prefix: String,
    serializer: Serializer,
    scan_retry: bool,
}

impl ClientOptions {
    /// Applies one option, rejecting values that would corrupt keys.
    pub fn apply(&mut self, option: ClientOption) -> KvResult<()> {
        match option {
            ClientOption::Prefix(prefix) => {
                if !is_valid_prefix(&prefix) {
                    return Err(KvError::Option {
                        name: "prefix",
                        value: prefix,
                    });
                }
                self.prefix = prefix;
            }
            ClientOption::Serializer(serializer) => {
                tracing::trace!(serializer = serializer.name(), "Serializer set");
                self.serializer = serializer;
            }
            ClientOption::ScanRetry(enabled) => self.scan_retry = enabled,
        }
        Ok(())
    }

    /// Configured key prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Configured serializer.
    #[must_use]
    pub const fn serializer(&self) -> Serializer {
        self.serializer
    }

    /// Whether scan retries past empty pages.
    #[must_use]
    pub const fn scan_retry(&self) -> bool {
        self.scan_retry
    }

    /// Key as sent on the wire.
    #[must_use]
    pub fn wire_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Keys as sent on the wire.
    #[must_use]
    pub fn wire_keys<K: AsRef<str>>(&self, keys: &[K]) -> Vec<String> {
        keys.iter().map(|key| self.wire_key(key.as_ref())).collect()
    }

    /// `MATCH` pattern for keys starting with `prefix`.
    #[must_use]
    pub fn scan_pattern(&self, prefix: &str) -> String {
        format!("{}{}*", self.prefix, prefix)
    }

    /// Logical key for a wire key; keys without the prefix are returned as is.
    #[must_use]
    pub fn strip_prefix<'a>(&self, wire_key: &'a str) -> &'a str {
        wire_key.strip_prefix(self.prefix.as_str()).unwrap_or(wire_key)
    }
}

/// Glob metacharacters would turn the prefix into a pattern when scanning.
fn is_valid_prefix(prefix: &str) -> bool {
    !prefix
        .chars()
        .any(|c| matches!(c, '*' | '?' | '[' | ']' | '\\') || c.is_whitespace() || c.is_control())
}
