//! Redis-backed source store
//!
//! Uses the synchronous redis client. A `redis::Connection` cannot be shared
//! between threads, so connections are pooled and handed out one per call.

use crate::config::StoreSettings;
use crate::error::{StoreError, StoreResult};
use crate::store::KeyValueStore;
use parking_lot::Mutex;
use redis::{Client, Commands, Connection};
use tracing::debug;

/// A pooled Redis connection with automatic return to pool on drop
struct PooledConnection<'a> {
    /// The connection (Option for taking on drop)
    conn: Option<Connection>,
    /// Reference to the pool for returning
    store: &'a RedisStore,
}

impl PooledConnection<'_> {
    /// Get a mutable reference to the connection
    fn connection(&mut self) -> StoreResult<&mut Connection> {
        self.conn
            .as_mut()
            .ok_or_else(|| StoreError::Redis("connection already returned".into()))
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.store.available.lock().push(conn);
        }
    }
}

/// Redis store with a grow-on-demand connection pool
pub struct RedisStore {
    client: Client,
    /// Idle connections
    available: Mutex<Vec<Connection>>,
    /// URL for error messages (no password)
    display_url: String,
}

impl RedisStore {
    /// Connect to Redis and verify the connection
    pub fn connect(settings: &StoreSettings) -> StoreResult<Self> {
        let display_url = settings.to_display_string();
        let connection_failed = |reason: String| StoreError::ConnectionFailed {
            url: display_url.clone(),
            reason,
        };

        let url = settings
            .connection_url()
            .map_err(|e| connection_failed(e.to_string()))?;
        let client = Client::open(url.as_str()).map_err(|e| connection_failed(e.to_string()))?;
        let conn = client
            .get_connection()
            .map_err(|e| connection_failed(e.to_string()))?;

        debug!(url = %display_url, "Connected to Redis");

        Ok(Self {
            client,
            available: Mutex::new(vec![conn]),
            display_url,
        })
    }

    /// Acquire a connection, opening a new one if the pool is empty
    fn acquire(&self) -> StoreResult<PooledConnection<'_>> {
        let idle = self.available.lock().pop();

        let conn = match idle {
            Some(conn) => conn,
            None => self
                .client
                .get_connection()
                .map_err(|e| StoreError::ConnectionFailed {
                    url: self.display_url.clone(),
                    reason: e.to_string(),
                })?,
        };

        Ok(PooledConnection {
            conn: Some(conn),
            store: self,
        })
    }
}

impl KeyValueStore for RedisStore {
    fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let mut pooled = self.acquire()?;
        let mut keys: Vec<String> =
            pooled
                .connection()?
                .keys(pattern)
                .map_err(|e| StoreError::EnumerateFailed {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })?;

        // KEYS has no defined order
        keys.sort_unstable();
        Ok(keys)
    }

    fn read(&self, key: &str) -> StoreResult<String> {
        let mut pooled = self.acquire()?;
        let value: Option<String> =
            pooled
                .connection()?
                .get(key)
                .map_err(|e| StoreError::ReadFailed {
                    key: key.to_string(),
                    reason: e.to_string(),
                })?;

        value.ok_or_else(|| StoreError::Missing {
            key: key.to_string(),
        })
    }

    fn flush(&self) -> StoreResult<()> {
        let mut pooled = self.acquire()?;
        redis::cmd("FLUSHDB")
            .query::<()>(pooled.connection()?)
            .map_err(|e| StoreError::FlushFailed(e.to_string()))
    }
}
