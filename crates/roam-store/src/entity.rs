//! Entity store contract.
//!
//! A keyed, TTL-evicting cache shared across the cluster. Missing keys are
//! simply absent from `get_all` results, never an error.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use roam_core::{CacheKey, Indexed};

use crate::error::StoreResult;

#[async_trait]
pub trait EntityStore<E: Indexed>: Send + Sync {
    /// Fetches every live entry among `keys`.
    async fn get_all(&self, keys: &[CacheKey]) -> StoreResult<HashMap<CacheKey, E>>;

    /// Writes `entities` under their cache keys, each expiring after `ttl`.
    async fn put_all(&self, entities: &[E], ttl: Duration) -> StoreResult<()>;

    async fn remove_all(&self, keys: &[CacheKey]) -> StoreResult<()>;

    async fn has_key(&self, key: &CacheKey) -> StoreResult<bool>;
}
