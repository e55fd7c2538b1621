//! Session lifecycle: lazy connect, database switching and teardown.

use crate::metrics;
use crate::options::{ClientOption, ClientOptions, Serializer};
use crate::protocol::{Connector, Endpoint, KvProtocol};
use kvlink_config::{ConfigSource, ConnectionConfig};
use kvlink_core::{KvError, KvResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A live connection with its selected database and client-side options.
///
/// Only a [`SessionManager`] creates sessions; callers borrow one for the
/// duration of a single operation.
pub struct Session {
    pub(crate) protocol: Box<dyn KvProtocol>,
    pub(crate) options: ClientOptions,
    db: u8,
    default_lifetime: u64,
}

impl Session {
    /// Database index this session has selected.
    #[must_use]
    pub const fn db(&self) -> u8 {
        self.db
    }

    /// Client-side options in effect.
    #[must_use]
    pub const fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Configured default key lifetime in seconds.
    #[must_use]
    pub const fn default_lifetime(&self) -> u64 {
        self.default_lifetime
    }

    /// Whether the underlying connection still works.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.protocol.is_open()
    }

    fn serves(&self, target_db: Option<u8>) -> bool {
        self.is_live() && target_db.map_or(true, |db| db == self.db)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("db", &self.db)
            .field("options", &self.options)
            .field("live", &self.is_live())
            .finish()
    }
}

/// Owns at most one [`Session`] and the configuration it was opened with.
pub struct SessionManager {
    source: ConfigSource,
    config: Option<ConnectionConfig>,
    connector: Arc<dyn Connector>,
    serializer: Serializer,
    session: Option<Session>,
    last_db: Option<u8>,
}

impl SessionManager {
    /// Creates a manager; nothing is resolved or connected yet.
    pub fn new(source: impl Into<ConfigSource>, connector: Arc<dyn Connector>) -> Self {
        Self {
            source: source.into(),
            config: None,
            connector,
            serializer: Serializer::Json,
            session: None,
            last_db: None,
        }
    }

    /// Uses another value serializer for sessions opened from now on.
    #[must_use]
    pub fn with_serializer(mut self, serializer: Serializer) -> Self {
        self.serializer = serializer;
        self
    }

    /// The resolved configuration, resolving it on first use.
    pub fn config(&mut self) -> KvResult<&ConnectionConfig> {
        let config = match self.config.take() {
            Some(config) => config,
            None => self.source.resolve()?,
        };
        Ok(self.config.insert(config))
    }

    /// Database selected by the current session, if one is open.
    #[must_use]
    pub fn current_db(&self) -> Option<u8> {
        self.session.as_ref().map(Session::db)
    }

    /// Whether a live session is held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_live)
    }

    /// Returns a live session on `target_db`, connecting if needed.
    ///
    /// `None` keeps the database of the current session, including one that
    /// was dropped since, or the configured default on a first connect.
    /// Asking for another database than the one selected runs the whole
    /// connect sequence again.
    pub async fn ensure_session(&mut self, target_db: Option<u8>) -> KvResult<&mut Session> {
        let session = match self.session.take() {
            Some(session) if session.serves(target_db) => session,
            Some(stale) => {
                if stale.is_live() {
                    info!(from = stale.db(), to = ?target_db, "Switching Redis database, reconnecting");
                    metrics::record_db_switch();
                } else {
                    info!(db = stale.db(), "Redis connection lost, reconnecting");
                }
                self.last_db = Some(stale.db());
                drop(stale);
                self.open_session(target_db).await?
            }
            None => self.open_session(target_db).await?,
        };

        self.last_db = None;
        Ok(self.session.insert(session))
    }

    /// Records the outcome of an operation run on the current session.
    ///
    /// Transport failures discard the session; non-persistent sessions are
    /// discarded after every operation.
    pub fn settle<T>(&mut self, outcome: &KvResult<T>) {
        if let Err(err) = outcome {
            if err.is_connection_failure() {
                warn!(error = %err, "Discarding Redis session after transport failure");
                self.forget_session();
                return;
            }
        }

        let persistent = self.config.as_ref().map_or(true, ConnectionConfig::persistent);
        if !persistent && self.forget_session() {
            debug!("Closed per-call Redis connection");
        }
    }

    /// Drops the session but remembers its database for the next connect.
    fn forget_session(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                self.last_db = Some(session.db());
                true
            }
            None => false,
        }
    }

    /// Drops the current session; the next operation reconnects.
    pub fn disconnect(&mut self) {
        self.last_db = None;
        if self.session.take().is_some() {
            info!("Redis session closed");
        }
    }

    async fn open_session(&mut self, target_db: Option<u8>) -> KvResult<Session> {
        let config = self.config()?.clone();
        let db = target_db
            .or(self.last_db)
            .unwrap_or_else(|| config.default_db());
        let endpoint = Endpoint::from(&config);

        info!(
            addr = %config.addr(),
            db,
            persistent = config.persistent(),
            "Connecting to Redis server"
        );

        let result = Self::connect_sequence(&*self.connector, &config, &endpoint, db, self.serializer).await;
        match &result {
            Ok(_) => {
                metrics::record_connect();
                info!(addr = %config.addr(), db, "Redis session established");
            }
            Err(err) => {
                metrics::record_connect_failure(err.error_code());
                warn!(addr = %config.addr(), db, error = %err, "Redis connect sequence failed");
            }
        }
        result
    }

    async fn connect_sequence(
        connector: &dyn Connector,
        config: &ConnectionConfig,
        endpoint: &Endpoint,
        db: u8,
        serializer: Serializer,
    ) -> KvResult<Session> {
        let mut protocol = connector.connect(endpoint).await.map_err(|err| match err {
            KvError::Connection { .. } => err,
            other => KvError::connection(&endpoint.host, endpoint.port, other),
        })?;

        let mut options = ClientOptions::default();
        options.apply(ClientOption::Prefix(config.key_prefix().to_string()))?;
        options.apply(ClientOption::Serializer(serializer))?;
        options.apply(ClientOption::ScanRetry(true))?;

        protocol
            .auth(config.password())
            .await
            .map_err(|err| {
                if err.is_connection_failure() {
                    err
                } else {
                    KvError::Authentication(err.to_string())
                }
            })?;

        protocol
            .select(db)
            .await
            .map_err(|err| {
                if err.is_connection_failure() {
                    err
                } else {
                    KvError::DatabaseSelection {
                        db,
                        message: err.to_string(),
                    }
                }
            })?;

        Ok(Session {
            protocol,
            options,
            db,
            default_lifetime: config.default_lifetime(),
        })
    }
}
