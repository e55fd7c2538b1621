//! Field-level checks shared by every configuration source.
//!
//! Each check fails fast with the [`ConfigurationError`] naming the field, so
//! a bad configuration is rejected before any connection is attempted.

use kvlink_core::ConfigurationError;

/// Highest database index accepted for `db`.
pub const MAX_DATABASE_INDEX: u8 = 16;

/// A required text field: absent or empty both count as missing.
pub(crate) fn required_text(
    field: &'static str,
    value: Option<&str>,
) -> Result<String, ConfigurationError> {
    match value {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(ConfigurationError::Missing { field }),
    }
}

/// The server port: absent or zero both count as missing.
pub(crate) fn required_port(value: Option<u16>) -> Result<u16, ConfigurationError> {
    match value {
        Some(port) if port != 0 => Ok(port),
        _ => Err(ConfigurationError::Missing { field: "port" }),
    }
}

/// The default key lifetime. Zero is rejected, it never means "no expiry".
pub(crate) fn required_lifetime(value: Option<u64>) -> Result<u64, ConfigurationError> {
    match value {
        None => Err(ConfigurationError::Missing { field: "lifetime" }),
        Some(0) => Err(ConfigurationError::ZeroLifetime),
        Some(seconds) => Ok(seconds),
    }
}

/// The default database index, `0` when absent.
pub(crate) fn database_index(value: Option<u8>) -> Result<u8, ConfigurationError> {
    let db = value.unwrap_or(0);
    if db > MAX_DATABASE_INDEX {
        return Err(ConfigurationError::DatabaseOutOfRange {
            db,
            max: MAX_DATABASE_INDEX,
        });
    }
    Ok(db)
}

/// Parses a textual flag the way `.env` files usually spell them.
pub(crate) fn parse_flag(field: &'static str, raw: &str) -> Result<bool, ConfigurationError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigurationError::Invalid {
            field,
            value: raw.to_string(),
        }),
    }
}

/// Parses a textual number, naming the field on failure.
pub(crate) fn parse_number<T: std::str::FromStr>(
    field: &'static str,
    raw: &str,
) -> Result<T, ConfigurationError> {
    raw.trim().parse().map_err(|_| ConfigurationError::Invalid {
        field,
        value: raw.to_string(),
    })
}
