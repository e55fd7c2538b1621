//! The seam between the session layer and the wire protocol.
//!
//! [`Connector`] opens transports, [`KvProtocol`] issues single commands on
//! one of them. Keys passed in here are wire keys: the session has already
//! applied the key prefix. Values are already encoded.

use async_trait::async_trait;
use kvlink_config::ConnectionConfig;
use kvlink_core::KvResult;

/// Where and how to open a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Long-lived connection (`true`) or one per call.
    pub persistent: bool,
}

impl From<&ConnectionConfig> for Endpoint {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            host: config.host().to_string(),
            port: config.port(),
            persistent: config.persistent(),
        }
    }
}

/// Expiry attached to a plain `SET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Key expires after this many seconds.
    Seconds(u64),
    /// Key never expires.
    Never,
}

/// Opens transport connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a connection to `endpoint`.
    ///
    /// Implementations report failures as `KvError::Connection`.
    async fn connect(&self, endpoint: &Endpoint) -> KvResult<Box<dyn KvProtocol>>;
}

/// One open connection to a key-value server.
///
/// Failures are reported as `KvError::Transport` when the connection itself
/// broke and `KvError::Command` when the server replied with an error.
#[async_trait]
pub trait KvProtocol: Send {
    /// Whether the connection is still usable.
    fn is_open(&self) -> bool;

    /// `AUTH password`
    async fn auth(&mut self, password: &str) -> KvResult<()>;

    /// `SELECT db`
    async fn select(&mut self, db: u8) -> KvResult<()>;

    /// `PING`
    async fn ping(&mut self) -> KvResult<()>;

    /// `GET key`
    async fn get(&mut self, key: &str) -> KvResult<Option<Vec<u8>>>;

    /// `SET key value [EX seconds]`
    async fn set(&mut self, key: &str, value: Vec<u8>, expiry: Expiry) -> KvResult<()>;

    /// `SET key value NX EX seconds`, true if the key was written.
    async fn set_nx_ex(&mut self, key: &str, value: Vec<u8>, seconds: u64) -> KvResult<bool>;

    /// `TTL key`
    async fn ttl(&mut self, key: &str) -> KvResult<i64>;

    /// `EXPIRE key seconds`, true if the timeout was set.
    async fn expire(&mut self, key: &str, seconds: u64) -> KvResult<bool>;

    /// `GETSET key value`
    async fn get_set(&mut self, key: &str, value: Vec<u8>) -> KvResult<Option<Vec<u8>>>;

    /// `DEL key [key ...]`, number of keys removed.
    async fn del(&mut self, keys: &[String]) -> KvResult<u64>;

    /// `EXISTS key`
    async fn exists(&mut self, key: &str) -> KvResult<bool>;

    /// `PUBLISH channel message`, number of receivers.
    async fn publish(&mut self, channel: &str, message: Vec<u8>) -> KvResult<u64>;

    /// `SADD key member [member ...]`, number of members added.
    async fn sadd(&mut self, key: &str, members: Vec<Vec<u8>>) -> KvResult<u64>;

    /// `SMEMBERS key`
    async fn smembers(&mut self, key: &str) -> KvResult<Vec<Vec<u8>>>;

    /// `SCAN cursor MATCH pattern COUNT count`, next cursor and one page of keys.
    async fn scan(&mut self, cursor: u64, pattern: &str, count: usize)
        -> KvResult<(u64, Vec<String>)>;
}
