//! Cache operations issued on an established session.
//!
//! Every method maps to one protocol call, except `scan`, which iterates the
//! server cursor, and `delete_matching`, which chains a scan and a bulk delete.

use crate::metrics;
use crate::protocol::Expiry;
use crate::session::Session;
use kvlink_core::KvResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Cursor value that starts a scan and, when returned, ends it.
pub const SCAN_START: u64 = 0;

fn track<T>(command: &'static str, outcome: KvResult<T>) -> KvResult<T> {
    metrics::record_command(command, &outcome);
    outcome
}

impl Session {
    /// Lifetime `0` means "use the configured default".
    fn effective_lifetime(&self, lifetime: u64) -> u64 {
        if lifetime == 0 {
            self.default_lifetime()
        } else {
            lifetime
        }
    }

    /// Cached value for `key`, `None` on a miss.
    pub async fn get<T: DeserializeOwned + Send>(&mut self, key: &str) -> KvResult<Option<T>> {
        let wire_key = self.options.wire_key(key);
        let raw = track("GET", self.protocol.get(&wire_key).await)?;

        match raw {
            Some(bytes) => {
                debug!("Cache hit for key '{}'", wire_key);
                Ok(Some(self.options.serializer().decode(&bytes)?))
            }
            None => {
                debug!("Cache miss for key '{}'", wire_key);
                Ok(None)
            }
        }
    }

    /// Stores `value`, with the default lifetime when `lifetime` is 0, or
    /// without expiry when `never_expire` is set.
    pub async fn set<V: Serialize + Sync + ?Sized>(
        &mut self,
        key: &str,
        value: &V,
        lifetime: u64,
        never_expire: bool,
    ) -> KvResult<()> {
        let wire_key = self.options.wire_key(key);
        let bytes = self.options.serializer().encode(value)?;
        let expiry = if never_expire {
            Expiry::Never
        } else {
            Expiry::Seconds(self.effective_lifetime(lifetime))
        };

        track("SET", self.protocol.set(&wire_key, bytes, expiry).await)?;
        debug!("Cached key '{}' with expiry {:?}", wire_key, expiry);
        Ok(())
    }

    /// Stores `value` only if `key` is absent; true if it was written.
    pub async fn set_nx<V: Serialize + Sync + ?Sized>(
        &mut self,
        key: &str,
        value: &V,
        lifetime: u64,
    ) -> KvResult<bool> {
        let wire_key = self.options.wire_key(key);
        let bytes = self.options.serializer().encode(value)?;
        let seconds = self.effective_lifetime(lifetime);

        let written = track("SET", self.protocol.set_nx_ex(&wire_key, bytes, seconds).await)?;
        debug!("Set-if-absent for key '{}': {}", wire_key, written);
        Ok(written)
    }

    /// Remaining lifetime in seconds; `-1` without expiry, `-2` when missing.
    pub async fn ttl(&mut self, key: &str) -> KvResult<i64> {
        let wire_key = self.options.wire_key(key);
        track("TTL", self.protocol.ttl(&wire_key).await)
    }

    /// Sets a timeout on `key`; false if the key does not exist.
    pub async fn expire(&mut self, key: &str, lifetime: u64) -> KvResult<bool> {
        let wire_key = self.options.wire_key(key);
        track("EXPIRE", self.protocol.expire(&wire_key, lifetime).await)
    }

    /// Stores `value` and returns the previous one.
    pub async fn get_set<T, V>(&mut self, key: &str, value: &V) -> KvResult<Option<T>>
    where
        T: DeserializeOwned + Send,
        V: Serialize + Sync + ?Sized,
    {
        let wire_key = self.options.wire_key(key);
        let bytes = self.options.serializer().encode(value)?;

        let previous = track("GETSET", self.protocol.get_set(&wire_key, bytes).await)?;
        previous
            .map(|bytes| self.options.serializer().decode(&bytes))
            .transpose()
    }

    /// Whether `key` exists and has not expired.
    pub async fn exists(&mut self, key: &str) -> KvResult<bool> {
        let wire_key = self.options.wire_key(key);
        track("EXISTS", self.protocol.exists(&wire_key).await)
    }

    /// Removes `key`; number of keys removed.
    pub async fn delete(&mut self, key: &str) -> KvResult<u64> {
        let wire_key = self.options.wire_key(key);
        let removed = track("DEL", self.protocol.del(&[wire_key]).await)?;
        debug!("Deleted key '{}': {}", key, removed > 0);
        Ok(removed)
    }

    /// Publishes `message` on `channel`; number of receivers.
    ///
    /// Channels are not keys, so neither prefix nor serializer apply.
    pub async fn publish(&mut self, channel: &str, message: &str) -> KvResult<u64> {
        track(
            "PUBLISH",
            self.protocol.publish(channel, message.as_bytes().to_vec()).await,
        )
    }

    /// Adds one member to the set at `key`.
    pub async fn save_one<V: Serialize + Sync + ?Sized>(&mut self, key: &str, value: &V) -> KvResult<u64> {
        let wire_key = self.options.wire_key(key);
        let member = self.options.serializer().encode(value)?;
        track("SADD", self.protocol.sadd(&wire_key, vec![member]).await)
    }

    /// Adds every value to the set at `key` in one call.
    pub async fn save_many<V: Serialize + Sync>(&mut self, key: &str, values: &[V]) -> KvResult<u64> {
        if values.is_empty() {
            return Ok(0);
        }

        let wire_key = self.options.wire_key(key);
        let serializer = self.options.serializer();
        let members = values
            .iter()
            .map(|value| serializer.encode(value))
            .collect::<KvResult<Vec<_>>>()?;

        track("SADD", self.protocol.sadd(&wire_key, members).await)
    }

    /// Every member of the set at `key`; empty when the key is absent.
    pub async fn get_members<T: DeserializeOwned + Send>(&mut self, key: &str) -> KvResult<Vec<T>> {
        let wire_key = self.options.wire_key(key);
        let raw = track("SMEMBERS", self.protocol.smembers(&wire_key).await)?;

        let serializer = self.options.serializer();
        raw.iter().map(|bytes| serializer.decode(bytes)).collect()
    }

    /// Every wire key starting with the key prefix followed by `prefix`.
    ///
    /// Pages of up to `batch_size` keys are requested until the cursor comes
    /// back to [`SCAN_START`] or a call yields no keys. Keys are returned in
    /// the order the server produced them and may contain duplicates if the
    /// keyspace changed during the scan.
    pub async fn scan(&mut self, prefix: &str, batch_size: usize) -> KvResult<Vec<String>> {
        let pattern = self.options.scan_pattern(prefix);
        let count = batch_size.max(1);

        let mut cursor = SCAN_START;
        let mut total = Vec::new();
        loop {
            let (next, keys) = self.scan_call(cursor, &pattern, count).await?;
            if keys.is_empty() {
                break;
            }
            total.extend(keys);
            if next == SCAN_START {
                break;
            }
            cursor = next;
        }

        debug!("Scanned {} keys matching '{}'", total.len(), pattern);
        Ok(total)
    }

    /// One logical scan call. With scan retry on, empty pages in the middle
    /// of an iteration are skipped instead of being reported.
    async fn scan_call(&mut self, cursor: u64, pattern: &str, count: usize) -> KvResult<(u64, Vec<String>)> {
        let mut cursor = cursor;
        loop {
            let (next, keys) = track("SCAN", self.protocol.scan(cursor, pattern, count).await)?;
            if !keys.is_empty() || next == SCAN_START || !self.options.scan_retry() {
                return Ok((next, keys));
            }
            cursor = next;
        }
    }

    /// Deletes every key in one call.
    ///
    /// True only when the server removed exactly as many keys as were
    /// requested. Any shortfall yields false; the number actually removed is
    /// not reported, so "3 of 5" and "0 of 5" look the same to the caller.
    pub async fn delete_all<K: AsRef<str> + Sync>(&mut self, keys: &[K]) -> KvResult<bool> {
        if keys.is_empty() {
            return Ok(true);
        }

        let wire_keys = self.options.wire_keys(keys);
        let requested = wire_keys.len() as u64;
        let removed = track("DEL", self.protocol.del(&wire_keys).await)?;

        if removed != requested {
            debug!("Deleted {} of {} requested keys", removed, requested);
        }
        Ok(removed == requested)
    }

    /// Scans for `prefix` and deletes every key found.
    pub async fn delete_matching(&mut self, prefix: &str, batch_size: usize) -> KvResult<bool> {
        let mut keys: Vec<String> = self
            .scan(prefix, batch_size)
            .await?
            .iter()
            .map(|wire_key| self.options.strip_prefix(wire_key).to_string())
            .collect();
        keys.sort_unstable();
        keys.dedup();

        self.delete_all(&keys).await
    }

    /// Round trip to the server.
    pub async fn ping(&mut self) -> KvResult<()> {
        track("PING", self.protocol.ping().await)
    }
}
