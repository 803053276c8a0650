use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use roam_core::{CacheKey, Indexed};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::entity::EntityStore;
use crate::error::StoreResult;

struct Entry<E> {
    entity: E,
    expires_at: Instant,
}

/// In-process entity store.
///
/// Expiry is checked lazily on read against the tokio clock, so tests can
/// pause and advance time.
pub struct MemoryEntityStore<E> {
    entries: Arc<RwLock<HashMap<CacheKey, Entry<E>>>>,
}

impl<E> MemoryEntityStore<E> {
    pub fn new() -> Self {
        MemoryEntityStore {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    /// Keys of all live entries.
    pub async fn keys(&self) -> Vec<CacheKey> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .iter()
            .filter(|(_, e)| e.expires_at > now)
            .map(|(k, _)| k.clone())
            .collect()
    }
}

impl<E> Default for MemoryEntityStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for MemoryEntityStore<E> {
    fn clone(&self) -> Self {
        MemoryEntityStore {
            entries: self.entries.clone(),
        }
    }
}

#[async_trait]
impl<E: Indexed> EntityStore<E> for MemoryEntityStore<E> {
    async fn get_all(&self, keys: &[CacheKey]) -> StoreResult<HashMap<CacheKey, E>> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| {
                entries
                    .get(key)
                    .filter(|e| e.expires_at > now)
                    .map(|e| (key.clone(), e.entity.clone()))
            })
            .collect())
    }

    async fn put_all(&self, entities: &[E], ttl: Duration) -> StoreResult<()> {
        let expires_at = Instant::now() + ttl;
        let mut entries = self.entries.write().await;
        for entity in entities {
            entries.insert(
                entity.cache_key(),
                Entry {
                    entity: entity.clone(),
                    expires_at,
                },
            );
        }
        // Drop whatever already expired while holding the write lock anyway.
        let now = Instant::now();
        entries.retain(|_, e| e.expires_at > now);
        Ok(())
    }

    async fn remove_all(&self, keys: &[CacheKey]) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn has_key(&self, key: &CacheKey) -> StoreResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .is_some_and(|e| e.expires_at > now))
    }
}
