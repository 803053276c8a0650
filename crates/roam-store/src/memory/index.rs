use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use roam_core::{Coordinate, DistanceUnit, Indexed, SortOrder};
use tokio::sync::RwLock;

use crate::error::StoreResult;
use crate::index::{IndexId, SpatialIndex};

/// In-process spatial index with linear-scan radius queries.
pub struct MemorySpatialIndex<E: Indexed> {
    members: Arc<RwLock<HashMap<IndexId<E>, Coordinate>>>,
}

impl<E: Indexed> MemorySpatialIndex<E> {
    pub fn new() -> Self {
        MemorySpatialIndex {
            members: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }
}

impl<E: Indexed> Default for MemorySpatialIndex<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Indexed> Clone for MemorySpatialIndex<E> {
    fn clone(&self) -> Self {
        MemorySpatialIndex {
            members: self.members.clone(),
        }
    }
}

#[async_trait]
impl<E: Indexed> SpatialIndex<E> for MemorySpatialIndex<E> {
    async fn upsert_many(&self, entries: &[(IndexId<E>, Coordinate)]) -> StoreResult<()> {
        let mut members = self.members.write().await;
        for (id, coordinate) in entries {
            members.insert(id.clone(), *coordinate);
        }
        Ok(())
    }

    async fn remove_many(&self, ids: &[IndexId<E>]) -> StoreResult<()> {
        let mut members = self.members.write().await;
        for id in ids {
            members.remove(id);
        }
        Ok(())
    }

    async fn radius(
        &self,
        center: Coordinate,
        radius: f64,
        unit: DistanceUnit,
        order: SortOrder,
    ) -> StoreResult<Vec<IndexId<E>>> {
        let limit = unit.to_meters(radius);
        let members = self.members.read().await;

        let mut hits: Vec<(f64, &IndexId<E>)> = members
            .iter()
            .map(|(id, coordinate)| (center.distance_meters(coordinate), id))
            .filter(|(distance, _)| *distance <= limit)
            .collect();

        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        if order == SortOrder::Descending {
            hits.reverse();
        }

        Ok(hits.into_iter().map(|(_, id)| id.clone()).collect())
    }

    async fn list_all(&self) -> StoreResult<Vec<IndexId<E>>> {
        Ok(self.members.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::tests::{namespace, vehicle};
    use roam_core::Vehicle;

    #[tokio::test]
    async fn test_radius_orders_by_distance() {
        let index = MemorySpatialIndex::<Vehicle>::new();
        let center = Coordinate::new(10.75, 59.91);

        // ~1.1 km, ~110 m, ~550 m north of the center
        let far = vehicle("far", 10.75, 59.92);
        let near = vehicle("near", 10.75, 59.911);
        let mid = vehicle("mid", 10.75, 59.915);

        let entries: Vec<_> = [&far, &near, &mid]
            .iter()
            .map(|v| (v.spatial_index_id(&namespace()), v.coordinate))
            .collect();
        index.upsert_many(&entries).await.unwrap();

        let ids: Vec<_> = index
            .radius(center, 2.0, DistanceUnit::Kilometers, SortOrder::Ascending)
            .await
            .unwrap()
            .into_iter()
            .map(|id| id.id)
            .collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);

        let ids: Vec<_> = index
            .radius(center, 600.0, DistanceUnit::Meters, SortOrder::Descending)
            .await
            .unwrap()
            .into_iter()
            .map(|id| id.id)
            .collect();
        assert_eq!(ids, vec!["mid", "near"]);
    }

    #[tokio::test]
    async fn test_remove_and_list() {
        let index = MemorySpatialIndex::<Vehicle>::new();
        let a = vehicle("a", 10.0, 59.0);
        let id = a.spatial_index_id(&namespace());
        index.upsert_many(&[(id.clone(), a.coordinate)]).await.unwrap();
        assert_eq!(index.list_all().await.unwrap(), vec![id.clone()]);

        index.remove_many(&[id]).await.unwrap();
        assert!(index.list_all().await.unwrap().is_empty());
    }
}
