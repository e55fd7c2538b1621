//! Public cache surface.

use crate::protocol::Connector;
use crate::redis_protocol::RedisConnector;
use crate::session::SessionManager;
use kvlink_config::{ConfigSource, ConnectionConfig};
use kvlink_core::KvResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-call options for [`CacheClient::set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Lifetime in seconds; `0` uses the configured default.
    pub lifetime: u64,
    /// Database to run on; `None` keeps the current one.
    pub db: Option<u8>,
    /// Store without expiry, whatever the lifetime says.
    pub never_expire: bool,
}

impl SetOptions {
    #[must_use]
    pub const fn with_lifetime(mut self, lifetime: u64) -> Self {
        self.lifetime = lifetime;
        self
    }

    #[must_use]
    pub const fn on_db(mut self, db: u8) -> Self {
        self.db = Some(db);
        self
    }

    #[must_use]
    pub const fn never_expire(mut self) -> Self {
        self.never_expire = true;
        self
    }
}

/// Runs one operation on a ready session while holding the manager lock,
/// then lets the manager settle the session according to the outcome.
macro_rules! with_session {
    ($client:expr, $db:expr, |$session:ident| $op:expr) => {{
        let mut manager = $client.manager.lock().await;
        let outcome = match manager.ensure_session($db).await {
            Ok($session) => $op.await,
            Err(err) => Err(err),
        };
        manager.settle(&outcome);
        outcome
    }};
}

/// Lazily connecting cache handle.
///
/// The first operation resolves the configuration and opens the session;
/// later operations reuse it. Every `db` parameter selects the database for
/// that call: `None` stays on the database currently selected, also across a
/// reconnect after a dropped connection, `Some(n)` reconnects first if `n`
/// differs from it.
///
/// Operations are serialized, so a concurrent caller can never move an
/// in-flight call to another database. Share the client through an [`Arc`].
pub struct CacheClient {
    manager: Mutex<SessionManager>,
}

impl CacheClient {
    /// Creates a client over any connector.
    pub fn new(source: impl Into<ConfigSource>, connector: Arc<dyn Connector>) -> Self {
        Self::from_manager(SessionManager::new(source, connector))
    }

    /// Wraps an already configured session manager.
    #[must_use]
    pub fn from_manager(manager: SessionManager) -> Self {
        Self {
            manager: Mutex::new(manager),
        }
    }

    /// Creates a client talking to a Redis server.
    pub fn redis(source: impl Into<ConfigSource>) -> Self {
        Self::new(source, Arc::new(RedisConnector::default()))
    }

    /// Creates a Redis client configured from `REDIS_*` environment variables.
    ///
    /// The configuration is resolved right away, so a missing variable is
    /// reported here rather than on the first operation.
    pub fn from_env() -> KvResult<Self> {
        let config = ConnectionConfig::from_env()?;
        Ok(Self::redis(config))
    }

    pub async fn get<T: DeserializeOwned + Send>(&self, key: &str, db: Option<u8>) -> KvResult<Option<T>> {
        with_session!(self, db, |session| session.get(key))
    }

    pub async fn set<V: Serialize + Sync + ?Sized>(
        &self,
        key: &str,
        value: &V,
        options: SetOptions,
    ) -> KvResult<()> {
        with_session!(self, options.db, |session| session.set(
            key,
            value,
            options.lifetime,
            options.never_expire
        ))
    }

    /// Atomic set-if-absent with expiry; true if the key was written.
    pub async fn set_nx<V: Serialize + Sync + ?Sized>(
        &self,
        key: &str,
        value: &V,
        lifetime: u64,
        db: Option<u8>,
    ) -> KvResult<bool> {
        with_session!(self, db, |session| session.set_nx(key, value, lifetime))
    }

    /// Remaining lifetime: `-1` for no expiry, `-2` for a missing key.
    pub async fn ttl(&self, key: &str, db: Option<u8>) -> KvResult<i64> {
        with_session!(self, db, |session| session.ttl(key))
    }

    pub async fn expire(&self, key: &str, lifetime: u64, db: Option<u8>) -> KvResult<bool> {
        with_session!(self, db, |session| session.expire(key, lifetime))
    }

    pub async fn get_set<T, V>(&self, key: &str, value: &V, db: Option<u8>) -> KvResult<Option<T>>
    where
        T: DeserializeOwned + Send,
        V: Serialize + Sync + ?Sized,
    {
        with_session!(self, db, |session| session.get_set(key, value))
    }

    pub async fn exists(&self, key: &str, db: Option<u8>) -> KvResult<bool> {
        with_session!(self, db, |session| session.exists(key))
    }

    pub async fn delete(&self, key: &str, db: Option<u8>) -> KvResult<u64> {
        with_session!(self, db, |session| session.delete(key))
    }

    pub async fn publish(&self, channel: &str, message: &str, db: Option<u8>) -> KvResult<u64> {
        with_session!(self, db, |session| session.publish(channel, message))
    }

    /// Adds `value` as a single member of the set at `key`.
    pub async fn save_one<V: Serialize + Sync + ?Sized>(
        &self,
        key: &str,
        value: &V,
        db: Option<u8>,
    ) -> KvResult<u64> {
        with_session!(self, db, |session| session.save_one(key, value))
    }

    /// Adds every element of `values` to the set at `key` in one call.
    pub async fn save_many<V: Serialize + Sync>(&self, key: &str, values: &[V], db: Option<u8>) -> KvResult<u64> {
        with_session!(self, db, |session| session.save_many(key, values))
    }

    pub async fn get_members<T: DeserializeOwned + Send>(&self, key: &str, db: Option<u8>) -> KvResult<Vec<T>> {
        with_session!(self, db, |session| session.get_members(key))
    }

    /// Wire keys (key prefix included) that start with `prefix`.
    pub async fn scan(&self, prefix: &str, batch_size: usize, db: Option<u8>) -> KvResult<Vec<String>> {
        with_session!(self, db, |session| session.scan(prefix, batch_size))
    }

    /// Deletes `keys` in one call; true only if every one of them was removed.
    pub async fn delete_all<K: AsRef<str> + Sync>(&self, keys: &[K], db: Option<u8>) -> KvResult<bool> {
        with_session!(self, db, |session| session.delete_all(keys))
    }

    /// Deletes every key starting with `prefix`.
    pub async fn delete_matching(&self, prefix: &str, batch_size: usize, db: Option<u8>) -> KvResult<bool> {
        with_session!(self, db, |session| session.delete_matching(prefix, batch_size))
    }

    pub async fn ping(&self, db: Option<u8>) -> KvResult<()> {
        with_session!(self, db, |session| session.ping())
    }

    /// Logical key for a wire key returned by [`scan`](Self::scan).
    pub async fn strip_prefix(&self, wire_key: &str) -> KvResult<String> {
        let mut manager = self.manager.lock().await;
        let prefix = manager.config()?.key_prefix();
        Ok(wire_key.strip_prefix(prefix).unwrap_or(wire_key).to_string())
    }

    /// Database selected by the open session, `None` when disconnected.
    pub async fn current_db(&self) -> Option<u8> {
        self.manager.lock().await.current_db()
    }

    /// Closes the session; the next operation reconnects to the configured
    /// default database unless it asks for another one.
    pub async fn disconnect(&self) {
        self.manager.lock().await.disconnect();
    }
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient").finish_non_exhaustive()
    }
}
