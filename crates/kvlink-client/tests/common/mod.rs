//! Common test infrastructure for Redis integration tests.

use kvlink_client::{CacheClient, RedisSettings};
use kvlink_core::telemetry::{init_logging, LoggingConfig};
use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

pub const TEST_PASSWORD: &str = "kvlink-test";

/// Test Redis container wrapper.
///
/// Starts a password-protected Redis and hands out settings pointing at it.
pub struct TestRedis {
    _container: ContainerAsync<Redis>,
    port: u16,
}

impl TestRedis {
    /// Starts a fresh Redis container.
    pub async fn new() -> Self {
        init_logging(&LoggingConfig::default());

        let container = Redis::default()
            .with_cmd(["redis-server", "--requirepass", TEST_PASSWORD])
            .start()
            .await
            .expect("Failed to start Redis container");

        let port = container
            .get_host_port_ipv4(6379)
            .await
            .expect("Failed to get Redis port");

        Self {
            _container: container,
            port,
        }
    }

    /// Settings for this container with the given key prefix.
    pub fn settings(&self, prefix: &str) -> RedisSettings {
        RedisSettings {
            prefix: Some(prefix.to_string()),
            ..RedisSettings::new("127.0.0.1", self.port, TEST_PASSWORD, 60)
        }
    }

    /// A client for this container.
    pub fn client(&self, prefix: &str) -> CacheClient {
        CacheClient::redis(self.settings(prefix))
    }
}
