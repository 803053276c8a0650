use std::collections::HashMap;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use roam_core::{CacheKey, Indexed};
use tracing::{debug, warn};

use super::Keyspace;
use crate::entity::EntityStore;
use crate::error::{StoreError, StoreResult};

/// Entity store on plain Redis string keys holding entity JSON.
pub struct RedisEntityStore<E> {
    conn: ConnectionManager,
    keys: Keyspace,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Indexed> RedisEntityStore<E> {
    pub(crate) fn new(conn: ConnectionManager, keys: Keyspace) -> Self {
        RedisEntityStore {
            conn,
            keys,
            _entity: PhantomData,
        }
    }

    fn key(&self, key: &CacheKey) -> String {
        self.keys.entity(E::CATEGORY, key)
    }
}

impl<E> Clone for RedisEntityStore<E> {
    fn clone(&self) -> Self {
        RedisEntityStore {
            conn: self.conn.clone(),
            keys: self.keys.clone(),
            _entity: PhantomData,
        }
    }
}

/// Whole seconds for `SET .. EX`, which rejects zero.
fn expire_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl<E: Indexed> EntityStore<E> for RedisEntityStore<E> {
    async fn get_all(&self, keys: &[CacheKey]) -> StoreResult<HashMap<CacheKey, E>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let redis_keys: Vec<String> = keys.iter().map(|k| self.key(k)).collect();
        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&redis_keys)
            .query_async(&mut conn)
            .await?;

        let mut found = HashMap::with_capacity(values.len());
        for ((key, redis_key), value) in keys.iter().zip(&redis_keys).zip(values) {
            let Some(json) = value else { continue };
            match serde_json::from_str::<E>(&json) {
                Ok(entity) => {
                    found.insert(key.clone(), entity);
                }
                Err(e) => {
                    // Treated as missing; the next cycle overwrites it.
                    let err = StoreError::Corrupt {
                        key: redis_key.clone(),
                        reason: e.to_string(),
                    };
                    warn!(error = %err, "Skipping undecodable cache entry");
                }
            }
        }
        Ok(found)
    }

    async fn put_all(&self, entities: &[E], ttl: Duration) -> StoreResult<()> {
        if entities.is_empty() {
            return Ok(());
        }

        let secs = expire_secs(ttl);
        let mut pipe = redis::pipe();
        for entity in entities {
            let json = serde_json::to_string(entity)?;
            pipe.cmd("SET")
                .arg(self.key(&entity.cache_key()))
                .arg(json)
                .arg("EX")
                .arg(secs)
                .ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        debug!(category = E::CATEGORY, count = entities.len(), ttl_secs = secs, "Cache entries written");
        Ok(())
    }

    async fn remove_all(&self, keys: &[CacheKey]) -> StoreResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let redis_keys: Vec<String> = keys.iter().map(|k| self.key(k)).collect();
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("DEL").arg(&redis_keys).query_async(&mut conn).await?;
        Ok(())
    }

    async fn has_key(&self, key: &CacheKey) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let count: i64 = redis::cmd("EXISTS")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await?;
        Ok(count > 0)
    }
}
