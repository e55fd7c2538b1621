//! In-memory connector used by the unit tests.

use crate::protocol::{Connector, Endpoint, Expiry, KvProtocol};
use async_trait::async_trait;
use kvlink_config::RedisSettings;
use kvlink_core::{KvError, KvResult};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

/// Settings every unit test starts from.
pub fn test_settings() -> RedisSettings {
    RedisSettings {
        prefix: Some("test_".to_string()),
        ..RedisSettings::new("cache.test", 6379, "secret", 120)
    }
}

#[derive(Debug, Clone)]
enum Stored {
    Text(Vec<u8>),
    Set(BTreeSet<Vec<u8>>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Stored,
    ttl: Option<u64>,
}

#[derive(Debug)]
struct MemoryState {
    dbs: HashMap<u8, BTreeMap<String, Entry>>,
    password: String,
    databases: u8,
    generation: u64,
    fail_connect: bool,
    fail_next_command: bool,
    connects: usize,
    auths: Vec<String>,
    selected: Vec<u8>,
    commands: Vec<(u8, &'static str)>,
    subscribers: HashMap<String, u64>,
    published: HashMap<String, Vec<Vec<u8>>>,
    sadd_calls: Vec<usize>,
    scan_patterns: Vec<String>,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            dbs: HashMap::new(),
            password: "secret".to_string(),
            databases: 16,
            generation: 0,
            fail_connect: false,
            fail_next_command: false,
            connects: 0,
            auths: Vec::new(),
            selected: Vec::new(),
            commands: Vec::new(),
            subscribers: HashMap::new(),
            published: HashMap::new(),
            sadd_calls: Vec::new(),
            scan_patterns: Vec::new(),
        }
    }
}

/// Fake server shared by every connection it hands out.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password(self, password: &str) -> Self {
        self.state.lock().unwrap().password = password.to_string();
        self
    }

    pub fn with_databases(self, databases: u8) -> Self {
        self.state.lock().unwrap().databases = databases;
        self
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state.lock().unwrap().fail_connect = fail;
    }

    /// Closes every connection handed out so far.
    pub fn break_connections(&self) {
        self.state.lock().unwrap().generation += 1;
    }

    /// The next command fails as if the socket was reset.
    pub fn fail_next_command(&self) {
        self.state.lock().unwrap().fail_next_command = true;
    }

    pub fn subscribe(&self, channel: &str) {
        *self
            .state
            .lock()
            .unwrap()
            .subscribers
            .entry(channel.to_string())
            .or_default() += 1;
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn auth_attempts(&self) -> Vec<String> {
        self.state.lock().unwrap().auths.clone()
    }

    pub fn selected(&self) -> Vec<u8> {
        self.state.lock().unwrap().selected.clone()
    }

    /// Database and name of every data command, in order.
    pub fn command_log(&self) -> Vec<(u8, &'static str)> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn published(&self, channel: &str) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .published
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }

    /// Member count of every `SADD` call.
    pub fn sadd_calls(&self) -> Vec<usize> {
        self.state.lock().unwrap().sadd_calls.clone()
    }

    pub fn scan_patterns(&self) -> Vec<String> {
        self.state.lock().unwrap().scan_patterns.clone()
    }

    pub fn contains(&self, db: u8, wire_key: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .dbs
            .get(&db)
            .is_some_and(|keys| keys.contains_key(wire_key))
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, endpoint: &Endpoint) -> KvResult<Box<dyn KvProtocol>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_connect {
            return Err(KvError::connection(&endpoint.host, endpoint.port, "Connection refused"));
        }
        state.connects += 1;

        Ok(Box::new(MemoryProtocol {
            state: Arc::clone(&self.state),
            generation: state.generation,
            db: 0,
            authed: false,
            open: true,
        }))
    }
}

struct MemoryProtocol {
    state: Arc<Mutex<MemoryState>>,
    generation: u64,
    db: u8,
    authed: bool,
    open: bool,
}

impl MemoryProtocol {
    /// Runs a data command against the selected database.
    fn run<T>(
        &mut self,
        command: &'static str,
        f: impl FnOnce(&mut MemoryState, u8) -> KvResult<T>,
    ) -> KvResult<T> {
        if !self.is_open() {
            return Err(KvError::transport(command, "connection closed"));
        }
        let mut state = self.state.lock().unwrap();
        if let Some(err) = take_failure(&mut state, command) {
            self.open = false;
            return Err(err);
        }
        if !self.authed {
            return Err(KvError::command(command, "NOAUTH Authentication required."));
        }
        state.commands.push((self.db, command));
        f(&mut state, self.db)
    }
}

fn take_failure(state: &mut MemoryState, command: &'static str) -> Option<KvError> {
    if !state.fail_next_command {
        return None;
    }
    state.fail_next_command = false;
    Some(KvError::transport(command, "Connection reset by peer"))
}

fn keys(state: &mut MemoryState, db: u8) -> &mut BTreeMap<String, Entry> {
    state.dbs.entry(db).or_default()
}

fn wrong_type(command: &'static str) -> KvError {
    KvError::command(
        command,
        "WRONGTYPE Operation against a key holding the wrong kind of value",
    )
}

fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            glob_match(&pattern[1..], text) || (!text.is_empty() && glob_match(pattern, &text[1..]))
        }
        (Some(b'?'), Some(_)) => glob_match(&pattern[1..], &text[1..]),
        (Some(p), Some(t)) if p == t => glob_match(&pattern[1..], &text[1..]),
        _ => false,
    }
}

#[async_trait]
impl KvProtocol for MemoryProtocol {
    fn is_open(&self) -> bool {
        self.open && self.state.lock().unwrap().generation == self.generation
    }

    async fn auth(&mut self, password: &str) -> KvResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = take_failure(&mut state, "AUTH") {
            self.open = false;
            return Err(err);
        }
        state.auths.push(password.to_string());
        if state.password != password {
            return Err(KvError::command(
                "AUTH",
                "WRONGPASS invalid username-password pair",
            ));
        }
        self.authed = true;
        Ok(())
    }

    async fn select(&mut self, db: u8) -> KvResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = take_failure(&mut state, "SELECT") {
            self.open = false;
            return Err(err);
        }
        state.selected.push(db);
        if db >= state.databases {
            return Err(KvError::command("SELECT", "ERR DB index is out of range"));
        }
        self.db = db;
        Ok(())
    }

    async fn ping(&mut self) -> KvResult<()> {
        self.run("PING", |_, _| Ok(()))
    }

    async fn get(&mut self, key: &str) -> KvResult<Option<Vec<u8>>> {
        self.run("GET", |state, db| match keys(state, db).get(key) {
            Some(Entry { value: Stored::Text(bytes), .. }) => Ok(Some(bytes.clone())),
            Some(_) => Err(wrong_type("GET")),
            None => Ok(None),
        })
    }

    async fn set(&mut self, key: &str, value: Vec<u8>, expiry: Expiry) -> KvResult<()> {
        self.run("SET", |state, db| {
            let ttl = match expiry {
                Expiry::Seconds(seconds) => Some(seconds),
                Expiry::Never => None,
            };
            keys(state, db).insert(
                key.to_string(),
                Entry {
                    value: Stored::Text(value),
                    ttl,
                },
            );
            Ok(())
        })
    }

    async fn set_nx_ex(&mut self, key: &str, value: Vec<u8>, seconds: u64) -> KvResult<bool> {
        self.run("SET", |state, db| {
            let keys = keys(state, db);
            if keys.contains_key(key) {
                return Ok(false);
            }
            keys.insert(
                key.to_string(),
                Entry {
                    value: Stored::Text(value),
                    ttl: Some(seconds),
                },
            );
            Ok(true)
        })
    }

    async fn ttl(&mut self, key: &str) -> KvResult<i64> {
        self.run("TTL", |state, db| {
            Ok(match keys(state, db).get(key) {
                Some(Entry { ttl: Some(seconds), .. }) => *seconds as i64,
                Some(_) => -1,
                None => -2,
            })
        })
    }

    async fn expire(&mut self, key: &str, seconds: u64) -> KvResult<bool> {
        self.run("EXPIRE", |state, db| match keys(state, db).get_mut(key) {
            Some(entry) => {
                entry.ttl = Some(seconds);
                Ok(true)
            }
            None => Ok(false),
        })
    }

    async fn get_set(&mut self, key: &str, value: Vec<u8>) -> KvResult<Option<Vec<u8>>> {
        self.run("GETSET", |state, db| {
            let keys = keys(state, db);
            let previous = match keys.get(key) {
                Some(Entry { value: Stored::Text(bytes), .. }) => Some(bytes.clone()),
                Some(_) => return Err(wrong_type("GETSET")),
                None => None,
            };
            keys.insert(
                key.to_string(),
                Entry {
                    value: Stored::Text(value),
                    ttl: None,
                },
            );
            Ok(previous)
        })
    }

    async fn del(&mut self, wire_keys: &[String]) -> KvResult<u64> {
        self.run("DEL", |state, db| {
            let keys = keys(state, db);
            Ok(wire_keys.iter().filter(|key| keys.remove(*key).is_some()).count() as u64)
        })
    }

    async fn exists(&mut self, key: &str) -> KvResult<bool> {
        self.run("EXISTS", |state, db| Ok(keys(state, db).contains_key(key)))
    }

    async fn publish(&mut self, channel: &str, message: Vec<u8>) -> KvResult<u64> {
        self.run("PUBLISH", |state, _| {
            let receivers = state.subscribers.get(channel).copied().unwrap_or(0);
            state
                .published
                .entry(channel.to_string())
                .or_default()
                .push(message);
            Ok(receivers)
        })
    }

    async fn sadd(&mut self, key: &str, members: Vec<Vec<u8>>) -> KvResult<u64> {
        self.run("SADD", |state, db| {
            state.sadd_calls.push(members.len());
            let entry = keys(state, db).entry(key.to_string()).or_insert_with(|| Entry {
                value: Stored::Set(BTreeSet::new()),
                ttl: None,
            });
            match &mut entry.value {
                Stored::Set(set) => Ok(members.into_iter().filter(|m| set.insert(m.clone())).count() as u64),
                Stored::Text(_) => Err(wrong_type("SADD")),
            }
        })
    }

    async fn smembers(&mut self, key: &str) -> KvResult<Vec<Vec<u8>>> {
        self.run("SMEMBERS", |state, db| match keys(state, db).get(key) {
            Some(Entry { value: Stored::Set(set), .. }) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type("SMEMBERS")),
            None => Ok(Vec::new()),
        })
    }

    async fn scan(&mut self, cursor: u64, pattern: &str, count: usize) -> KvResult<(u64, Vec<String>)> {
        self.run("SCAN", |state, db| {
            state.scan_patterns.push(pattern.to_string());
            let all: Vec<String> = keys(state, db).keys().cloned().collect();

            let start = (cursor as usize).min(all.len());
            let end = (start + count).min(all.len());
            let page = all[start..end]
                .iter()
                .filter(|key| glob_match(pattern.as_bytes(), key.as_bytes()))
                .cloned()
                .collect();
            let next = if end >= all.len() { 0 } else { end as u64 };
            Ok((next, page))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match(b"test_cache_*", b"test_cache_a"));
        assert!(glob_match(b"test_*", b"test_"));
        assert!(glob_match(b"a?c", b"abc"));
        assert!(!glob_match(b"test_cache_*", b"test_other"));
    }
}
