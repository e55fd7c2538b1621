//! # kvlink Client
//!
//! A lazily connecting Redis cache handle with prefix-scoped key scanning and
//! bulk deletion.
//!
//! # Architecture
//!
//! ```text
//! CacheClient ──► SessionManager ──► Session ──► KvProtocol
//!   (lock)        (connect, db)      (prefix,     (redis crate or
//!                                     serializer)  in-memory fake)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use kvlink_client::{CacheClient, RedisSettings, SetOptions};
//!
//! let client = CacheClient::redis(RedisSettings::new("127.0.0.1", 6379, "secret", 120));
//!
//! client.set("cache_user_1", &user, SetOptions::default()).await?;
//! let cached: Option<User> = client.get("cache_user_1", None).await?;
//!
//! let wire_keys = client.scan("cache_", 100, None).await?;
//! let all_gone = client.delete_matching("cache_", 100, None).await?;
//! ```

mod client;
pub mod metrics;
mod operations;
mod options;
mod protocol;
mod redis_protocol;
mod session;

#[cfg(test)]
mod testing;

pub use client::{CacheClient, SetOptions};
pub use crate::metrics::register_metrics;
pub use operations::SCAN_START;
pub use options::{ClientOption, ClientOptions, Serializer};
pub use protocol::{Connector, Endpoint, Expiry, KvProtocol};
pub use redis_protocol::{RedisConnector, RedisProtocol, DEFAULT_CONNECT_TIMEOUT};
pub use session::{Session, SessionManager};

pub use kvlink_config::{ConfigSource, ConnectionConfig, RedisSettings, SettingsLoader};
pub use kvlink_core::{ConfigurationError, KvError, KvResult};
