//! # Geo Search Service
//!
//! The read path and orphan reconciliation. Reads are lock-free and can run
//! on any node at any time, leader or not.
//!
//! ## Radius Search
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  vehicles_nearby(query, filter)                                         │
//! │                                                                         │
//! │  1. SpatialIndex::radius(center, radius, unit, order)                  │
//! │       → ids ordered by distance                                         │
//! │  2. keep ids whose embedded attributes pass the filter                 │
//! │  3. cap to `count` (after filtering, so distance order is preserved)   │
//! │  4. EntityStore::get_all(cache keys)                                    │
//! │       → ids whose entity already expired are silently dropped          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Orphans
//! An orphan is an index member whose cache entry is gone (usually TTL
//! eviction). They are harmless for reads, which drop them in step 4, but
//! they accumulate until [`GeoSearchService::remove_vehicle_orphans`] or its
//! station counterpart runs.

use std::collections::HashSet;
use std::sync::Arc;

use roam_core::{
    Coordinate, DistanceUnit, Indexed, SortOrder, SpatialFilter, Station, StationFilter, Vehicle,
    VehicleFilter,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::entity::EntityStore;
use crate::error::StoreResult;
use crate::index::{IndexId, SpatialIndex};
use crate::Stores;

// =============================================================================
// Query
// =============================================================================

/// Radius query parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadiusQuery {
    pub center: Coordinate,
    pub radius: f64,

    #[serde(default)]
    pub unit: DistanceUnit,

    #[serde(default)]
    pub order: SortOrder,

    /// Maximum number of results, applied after filtering.
    #[serde(default)]
    pub count: Option<usize>,
}

impl RadiusQuery {
    pub fn new(center: Coordinate, radius: f64, unit: DistanceUnit) -> Self {
        RadiusQuery {
            center,
            radius,
            unit,
            order: SortOrder::Ascending,
            count: None,
        }
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

// =============================================================================
// Service
// =============================================================================

#[derive(Clone)]
pub struct GeoSearchService {
    stores: Stores,
}

impl GeoSearchService {
    pub fn new(stores: Stores) -> Self {
        GeoSearchService { stores }
    }

    pub async fn vehicles_nearby(
        &self,
        query: &RadiusQuery,
        filter: &VehicleFilter,
    ) -> StoreResult<Vec<Vehicle>> {
        nearby(&self.stores.vehicles, &self.stores.vehicle_index, query, filter).await
    }

    pub async fn stations_nearby(
        &self,
        query: &RadiusQuery,
        filter: &StationFilter,
    ) -> StoreResult<Vec<Station>> {
        nearby(&self.stores.stations, &self.stores.station_index, query, filter).await
    }

    pub async fn find_vehicle_orphans(&self) -> StoreResult<Vec<IndexId<Vehicle>>> {
        find_orphans(&self.stores.vehicles, &self.stores.vehicle_index).await
    }

    pub async fn remove_vehicle_orphans(&self) -> StoreResult<Vec<IndexId<Vehicle>>> {
        remove_orphans(&self.stores.vehicles, &self.stores.vehicle_index).await
    }

    pub async fn find_station_orphans(&self) -> StoreResult<Vec<IndexId<Station>>> {
        find_orphans(&self.stores.stations, &self.stores.station_index).await
    }

    pub async fn remove_station_orphans(&self) -> StoreResult<Vec<IndexId<Station>>> {
        remove_orphans(&self.stores.stations, &self.stores.station_index).await
    }
}

// =============================================================================
// Category-generic helpers
// =============================================================================

async fn nearby<E, F>(
    store: &Arc<dyn EntityStore<E>>,
    index: &Arc<dyn SpatialIndex<E>>,
    query: &RadiusQuery,
    filter: &F,
) -> StoreResult<Vec<E>>
where
    E: Indexed,
    F: SpatialFilter<E::Attributes>,
{
    let hits = index
        .radius(query.center, query.radius, query.unit, query.order)
        .await?;
    let total = hits.len();

    let mut matching: Vec<IndexId<E>> = hits.into_iter().filter(|id| filter.matches(id)).collect();
    if let Some(count) = query.count {
        matching.truncate(count);
    }

    let keys: Vec<_> = matching.iter().map(|id| id.cache_key()).collect();
    let mut entities = store.get_all(&keys).await?;

    // `remove` also drops a second index member pointing at the same entity.
    let results: Vec<E> = keys.iter().filter_map(|key| entities.remove(key)).collect();

    debug!(
        category = E::CATEGORY,
        hits = total,
        matched = keys.len(),
        resolved = results.len(),
        "Radius search"
    );
    Ok(results)
}

async fn find_orphans<E: Indexed>(
    store: &Arc<dyn EntityStore<E>>,
    index: &Arc<dyn SpatialIndex<E>>,
) -> StoreResult<Vec<IndexId<E>>> {
    let ids = index.list_all().await?;

    let mut live = HashSet::new();
    let mut dead = HashSet::new();
    let mut orphans = Vec::new();

    for id in ids {
        let key = id.cache_key();
        let exists = if live.contains(&key) {
            true
        } else if dead.contains(&key) {
            false
        } else if store.has_key(&key).await? {
            live.insert(key);
            true
        } else {
            dead.insert(key);
            false
        };
        if !exists {
            orphans.push(id);
        }
    }

    Ok(orphans)
}

async fn remove_orphans<E: Indexed>(
    store: &Arc<dyn EntityStore<E>>,
    index: &Arc<dyn SpatialIndex<E>>,
) -> StoreResult<Vec<IndexId<E>>> {
    let orphans = find_orphans(store, index).await?;
    if !orphans.is_empty() {
        index.remove_many(&orphans).await?;
        info!(category = E::CATEGORY, count = orphans.len(), "Removed orphaned index entries");
    }
    Ok(orphans)
}

// =============================================================================
// Unit Tests
// =============================================================================
