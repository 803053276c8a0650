use std::marker::PhantomData;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use roam_core::{Coordinate, DistanceUnit, Indexed, SortOrder};
use tracing::warn;

use super::Keyspace;
use crate::error::{StoreError, StoreResult};
use crate::index::{IndexId, SpatialIndex};

/// Spatial index on a Redis geo set; members are the ids' JSON encodings.
pub struct RedisSpatialIndex<E> {
    conn: ConnectionManager,
    key: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Indexed> RedisSpatialIndex<E> {
    pub(crate) fn new(conn: ConnectionManager, keys: Keyspace) -> Self {
        RedisSpatialIndex {
            conn,
            key: keys.index(E::CATEGORY),
            _entity: PhantomData,
        }
    }

    fn encode(id: &IndexId<E>) -> StoreResult<String> {
        Ok(serde_json::to_string(id)?)
    }

    /// Decodes members, skipping anything that is not one of our ids.
    fn decode(&self, members: Vec<String>) -> Vec<IndexId<E>> {
        members
            .into_iter()
            .filter_map(|member| match serde_json::from_str(&member) {
                Ok(id) => Some(id),
                Err(e) => {
                    let err = StoreError::Corrupt {
                        key: self.key.clone(),
                        reason: format!("{e}: {member}"),
                    };
                    warn!(error = %err, "Skipping undecodable index member");
                    None
                }
            })
            .collect()
    }
}

impl<E> Clone for RedisSpatialIndex<E> {
    fn clone(&self) -> Self {
        RedisSpatialIndex {
            conn: self.conn.clone(),
            key: self.key.clone(),
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<E: Indexed> SpatialIndex<E> for RedisSpatialIndex<E> {
    async fn upsert_many(&self, entries: &[(IndexId<E>, Coordinate)]) -> StoreResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut cmd = redis::cmd("GEOADD");
        cmd.arg(&self.key);
        for (id, coordinate) in entries {
            cmd.arg(coordinate.lon).arg(coordinate.lat).arg(Self::encode(id)?);
        }

        let mut conn = self.conn.clone();
        let _: i64 = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn remove_many(&self, ids: &[IndexId<E>]) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let members = ids.iter().map(Self::encode).collect::<StoreResult<Vec<_>>>()?;
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("ZREM")
            .arg(&self.key)
            .arg(&members)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn radius(
        &self,
        center: Coordinate,
        radius: f64,
        unit: DistanceUnit,
        order: SortOrder,
    ) -> StoreResult<Vec<IndexId<E>>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = redis::cmd("GEOSEARCH")
            .arg(&self.key)
            .arg("FROMLONLAT")
            .arg(center.lon)
            .arg(center.lat)
            .arg("BYRADIUS")
            .arg(radius)
            .arg(unit.symbol())
            .arg(order.symbol())
            .query_async(&mut conn)
            .await?;
        Ok(self.decode(members))
    }

    async fn list_all(&self) -> StoreResult<Vec<IndexId<E>>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = redis::cmd("ZRANGE")
            .arg(&self.key)
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;
        Ok(self.decode(members))
    }
}
