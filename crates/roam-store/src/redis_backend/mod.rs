//! # Redis Backends
//!
//! Cluster-shared implementations of the storage traits.
//!
//! ## Key Layout
//! ```text
//! {prefix}:{category}:{id}_{system_id}   entity JSON, SET .. EX ttl
//! {prefix}:{category}:index              sorted set, members = index id JSON
//! {prefix}:lock:{name}                   owner token, SET .. NX PX lease
//! ```

mod connection;
mod entity;
mod index;
mod lock;

pub use connection::{RedisBackend, RedisConfig};
pub use entity::RedisEntityStore;
pub use index::RedisSpatialIndex;
pub use lock::RedisLock;

use roam_core::CacheKey;

/// Key naming for one deployment prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Keyspace {
    prefix: String,
}

impl Keyspace {
    pub(crate) fn new(prefix: impl Into<String>) -> Self {
        Keyspace {
            prefix: prefix.into(),
        }
    }

    pub(crate) fn entity(&self, category: &str, key: &CacheKey) -> String {
        format!("{}:{}:{}", self.prefix, category, key)
    }

    pub(crate) fn index(&self, category: &str) -> String {
        format!("{}:{}:index", self.prefix, category)
    }

    pub(crate) fn lock(&self, name: &str) -> String {
        format!("{}:lock:{}", self.prefix, name)
    }
}
