//! Result type aliases for kvlink.

use crate::KvError;

/// A specialized `Result` type for cache operations.
pub type KvResult<T> = Result<T, KvError>;
