//! # Redis Connection Management
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Redis Backend                                      │
//! │                                                                         │
//! │  Node startup                                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  RedisConfig::new(url) ← key prefix, reconnect backoff                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  RedisBackend::connect(config).await ← retried with exponential backoff│
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │        ConnectionManager (cloneable)     │                           │
//! │  │  multiplexed, reconnects on its own      │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ├──► entities::<Vehicle>()   MGET / SET EX / DEL / EXISTS         │
//! │       ├──► index::<Vehicle>()      GEOADD / ZREM / GEOSEARCH / ZRANGE   │
//! │       └──► lock(node_id)           SET NX PX / Lua compare-and-act      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use redis::aio::ConnectionManager;
use roam_core::Indexed;
use tracing::{info, warn};

use super::entity::RedisEntityStore;
use super::index::RedisSpatialIndex;
use super::lock::RedisLock;
use super::Keyspace;
use crate::error::{StoreError, StoreResult};

// =============================================================================
// Configuration
// =============================================================================

/// Redis backend configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = RedisConfig::new("redis://127.0.0.1:6379")
///     .key_prefix("roam")
///     .max_elapsed(Some(Duration::from_secs(60)));
/// ```
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL.
    pub url: String,

    /// Prefix of every key this node reads or writes.
    /// Default: "roam"
    pub key_prefix: String,

    /// First reconnect delay.
    /// Default: 500 milliseconds
    pub initial_backoff: Duration,

    /// Upper bound of a reconnect delay.
    /// Default: 30 seconds
    pub max_backoff: Duration,

    /// Give up connecting after this long (`None` = retry forever).
    /// Default: 2 minutes
    pub max_elapsed: Option<Duration>,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        RedisConfig {
            url: url.into(),
            key_prefix: "roam".to_string(),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            max_elapsed: Some(Duration::from_secs(120)),
        }
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn max_elapsed(mut self, max_elapsed: Option<Duration>) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: self.max_elapsed,
            ..Default::default()
        };
        backoff.reset();
        backoff
    }
}

// =============================================================================
// Backend
// =============================================================================

/// Connected Redis backend handing out typed stores.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
    keys: Keyspace,
}

impl RedisBackend {
    /// Connects, retrying with exponential backoff until `max_elapsed`.
    pub async fn connect(config: RedisConfig) -> StoreResult<Self> {
        info!(url = %config.url, prefix = %config.key_prefix, "Connecting to Redis");

        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        let mut backoff = config.create_backoff();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match ConnectionManager::new(client.clone()).await {
                Ok(conn) => {
                    info!(attempt, "Redis connection established");
                    return Ok(RedisBackend {
                        conn,
                        keys: Keyspace::new(config.key_prefix),
                    });
                }
                Err(e) => match backoff.next_backoff() {
                    Some(delay) => {
                        warn!(error = %e, attempt, ?delay, "Redis connection failed, retrying");
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(StoreError::ConnectionFailed(e.to_string())),
                },
            }
        }
    }

    /// Round-trips a PING.
    pub async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    pub fn entities<E: Indexed>(&self) -> RedisEntityStore<E> {
        RedisEntityStore::new(self.conn.clone(), self.keys.clone())
    }

    pub fn index<E: Indexed>(&self) -> RedisSpatialIndex<E> {
        RedisSpatialIndex::new(self.conn.clone(), self.keys.clone())
    }

    pub fn lock(&self, node_id: &str) -> RedisLock {
        RedisLock::new(self.conn.clone(), self.keys.clone(), node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RedisConfig::new("redis://localhost").key_prefix("test");
        assert_eq!(config.key_prefix, "test");
        assert_eq!(config.max_elapsed, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_backoff_starts_at_initial_interval() {
        let config = RedisConfig::new("redis://localhost")
            .backoff(Duration::from_millis(100), Duration::from_secs(1));
        let backoff = config.create_backoff();
        assert_eq!(backoff.current_interval, Duration::from_millis(100));
    }
}
