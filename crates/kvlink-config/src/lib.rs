//! # kvlink Config
//!
//! Resolves the parameters a cache session connects with. A configuration
//! comes either from an explicit [`RedisSettings`] object or from `REDIS_*`
//! environment variables; both paths end in the same validated
//! [`ConnectionConfig`].

mod connection_config;
mod loader;
mod validation;

pub use connection_config::*;
pub use loader::*;
pub use validation::MAX_DATABASE_INDEX;
