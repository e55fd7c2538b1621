//! Redis implementation of the protocol seam.

use crate::protocol::{Connector, Endpoint, Expiry, KvProtocol};
use async_trait::async_trait;
use kvlink_core::{KvError, KvResult};
use redis::aio::MultiplexedConnection;
use redis::{Cmd, ConnectionAddr, ConnectionInfo, FromRedisValue, RedisConnectionInfo, RedisError};
use std::time::Duration;
use tracing::{debug, warn};

/// Connect timeout used unless configured otherwise.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens plain TCP connections to a Redis server.
///
/// Authentication and database selection are left to the session, which
/// reports each step with its own error.
#[derive(Debug, Clone)]
pub struct RedisConnector {
    connect_timeout: Duration,
}

impl Default for RedisConnector {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl RedisConnector {
    #[must_use]
    pub const fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

#[async_trait]
impl Connector for RedisConnector {
    async fn connect(&self, endpoint: &Endpoint) -> KvResult<Box<dyn KvProtocol>> {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(endpoint.host.clone(), endpoint.port),
            redis: RedisConnectionInfo::default(),
        };
        let client = redis::Client::open(info)
            .map_err(|e| KvError::connection(&endpoint.host, endpoint.port, e))?;

        let conn = tokio::time::timeout(self.connect_timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| {
                KvError::connection(
                    &endpoint.host,
                    endpoint.port,
                    format!("timed out after {:?}", self.connect_timeout),
                )
            })?
            .map_err(|e| KvError::connection(&endpoint.host, endpoint.port, e))?;

        debug!(
            host = %endpoint.host,
            port = endpoint.port,
            persistent = endpoint.persistent,
            "Opened Redis connection"
        );

        Ok(Box::new(RedisProtocol { conn, open: true }))
    }
}

/// One multiplexed connection.
///
/// Once a command fails at the transport level the connection is reported
/// closed and the session replaces it.
pub struct RedisProtocol {
    conn: MultiplexedConnection,
    open: bool,
}

impl RedisProtocol {
    async fn query<T: FromRedisValue + Send>(&mut self, command: &'static str, cmd: Cmd) -> KvResult<T> {
        match cmd.query_async::<T>(&mut self.conn).await {
            Ok(value) => Ok(value),
            Err(err) => Err(self.classify(command, &err)),
        }
    }

    fn classify(&mut self, command: &'static str, err: &RedisError) -> KvError {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
            warn!(command, error = %err, "Redis connection failed");
            self.open = false;
            KvError::transport(command, err)
        } else {
            KvError::command(command, err)
        }
    }
}

#[async_trait]
impl KvProtocol for RedisProtocol {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn auth(&mut self, password: &str) -> KvResult<()> {
        let mut cmd = redis::cmd("AUTH");
        cmd.arg(password);
        self.query("AUTH", cmd).await
    }

    async fn select(&mut self, db: u8) -> KvResult<()> {
        let mut cmd = redis::cmd("SELECT");
        cmd.arg(i64::from(db));
        self.query("SELECT", cmd).await
    }

    async fn ping(&mut self) -> KvResult<()> {
        let _: String = self.query("PING", redis::cmd("PING")).await?;
        Ok(())
    }

    async fn get(&mut self, key: &str) -> KvResult<Option<Vec<u8>>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.query("GET", cmd).await
    }

    async fn set(&mut self, key: &str, value: Vec<u8>, expiry: Expiry) -> KvResult<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Expiry::Seconds(seconds) = expiry {
            cmd.arg("EX").arg(seconds);
        }
        self.query("SET", cmd).await
    }

    async fn set_nx_ex(&mut self, key: &str, value: Vec<u8>, seconds: u64) -> KvResult<bool> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX").arg("EX").arg(seconds);
        let reply: Option<String> = self.query("SET", cmd).await?;
        Ok(reply.is_some())
    }

    async fn ttl(&mut self, key: &str) -> KvResult<i64> {
        let mut cmd = redis::cmd("TTL");
        cmd.arg(key);
        self.query("TTL", cmd).await
    }

    async fn expire(&mut self, key: &str, seconds: u64) -> KvResult<bool> {
        let mut cmd = redis::cmd("EXPIRE");
        cmd.arg(key).arg(seconds);
        self.query("EXPIRE", cmd).await
    }

    async fn get_set(&mut self, key: &str, value: Vec<u8>) -> KvResult<Option<Vec<u8>>> {
        let mut cmd = redis::cmd("GETSET");
        cmd.arg(key).arg(value);
        self.query("GETSET", cmd).await
    }

    async fn del(&mut self, keys: &[String]) -> KvResult<u64> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(keys);
        self.query("DEL", cmd).await
    }

    async fn exists(&mut self, key: &str) -> KvResult<bool> {
        let mut cmd = redis::cmd("EXISTS");
        cmd.arg(key);
        self.query("EXISTS", cmd).await
    }

    async fn publish(&mut self, channel: &str, message: Vec<u8>) -> KvResult<u64> {
        let mut cmd = redis::cmd("PUBLISH");
        cmd.arg(channel).arg(message);
        self.query("PUBLISH", cmd).await
    }

    async fn sadd(&mut self, key: &str, members: Vec<Vec<u8>>) -> KvResult<u64> {
        let mut cmd = redis::cmd("SADD");
        cmd.arg(key).arg(members);
        self.query("SADD", cmd).await
    }

    async fn smembers(&mut self, key: &str) -> KvResult<Vec<Vec<u8>>> {
        let mut cmd = redis::cmd("SMEMBERS");
        cmd.arg(key);
        self.query("SMEMBERS", cmd).await
    }

    async fn scan(&mut self, cursor: u64, pattern: &str, count: usize) -> KvResult<(u64, Vec<String>)> {
        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor).arg("MATCH").arg(pattern).arg("COUNT").arg(count);
        self.query("SCAN", cmd).await
    }
}
