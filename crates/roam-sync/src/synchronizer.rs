//! # Synchronizer
//!
//! Reconciles a provider's new snapshot against its previous one and
//! mutates the entity store and spatial index accordingly.
//!
//! ## One Category, One Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  plan()                                                                 │
//! │                                                                         │
//! │  1. new_ids      = ids of valid records (invalid dropped by mapping)   │
//! │  2. ids_to_remove                                                       │
//! │       previous has data  → previous_ids − new_ids                      │
//! │       previous missing   → new_ids ∪ provider's ids in the index       │
//! │  3. current      = store.get_all(new_ids ∪ ids_to_remove)              │
//! │  4. per entity   : current id ≠ new id       → retire current id       │
//! │  5. per removal  : still cached              → retire its id           │
//! │                                                                         │
//! │  apply()   (stops at the first failing write)                          │
//! │                                                                         │
//! │  a. index.remove_many(retired ids)                                     │
//! │  b. store.remove_all(ids_to_remove)                                    │
//! │  c. store.put_all(entities, ttl)                                        │
//! │  d. index.upsert_many(new ids)                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Step (a) precedes step (d), so an entity whose attributes changed never
//! ends up with two index members once the cycle completes. A reader that
//! runs between (a) and (d) may miss it briefly.
//!
//! ## Missing Previous Snapshot
//! After a restart, or for a provider seen for the first time, there is
//! nothing to diff against. The category is then cleared and rebuilt: every
//! id the index holds for this provider is staged for removal together with
//! the new ids, and the new ids are written back in the same pass. Entities
//! that vanished while no history was kept go away; the rest survive.
//!
//! A missing *companion* feed is different: the category is skipped and the
//! stores are left untouched.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use roam_core::validation::{self, MappedBatch};
use roam_core::{
    ttl, CacheKey, Coordinate, CoreError, Delivery, FeedProvider, Indexed, ProviderNamespace,
    Station, Vehicle,
};
use roam_store::{EntityStore, IndexId, SpatialIndex, Stores};
use tracing::{debug, error, info, warn};

use crate::error::SyncResult;

// =============================================================================
// Reports
// =============================================================================

/// What one category did in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub upserted: usize,
    pub removed_from_cache: usize,
    pub removed_from_index: usize,
    pub rejected: usize,
    /// True if no previous snapshot existed and the category was rebuilt.
    pub fallback: bool,
}

/// Outcome of one category in one cycle.
#[derive(Debug)]
pub enum CategoryOutcome {
    Synced(SyncReport),

    /// Nothing was written: the snapshot or a companion feed is unusable.
    Skipped(CoreError),

    /// A write failed; later writes of this category were not attempted.
    Failed(crate::error::SyncError),
}

impl CategoryOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, CategoryOutcome::Synced(_))
    }

    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            CategoryOutcome::Synced(report) => Some(report),
            _ => None,
        }
    }
}

/// Outcome of one provider cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub system_id: String,
    pub vehicles: CategoryOutcome,
    pub stations: CategoryOutcome,
}

// =============================================================================
// Plan
// =============================================================================

/// The writes one category cycle will issue.
#[derive(Debug)]
pub struct SyncPlan<E: Indexed> {
    pub index_removals: Vec<IndexId<E>>,
    pub cache_removals: Vec<CacheKey>,
    pub upserts: Vec<E>,
    pub index_upserts: Vec<(IndexId<E>, Coordinate)>,
    pub ttl: Duration,
    pub fallback: bool,
}

// =============================================================================
// Category Synchronizer
// =============================================================================

/// Diff-and-apply for one entity category.
pub struct EntitySync<E: Indexed> {
    store: Arc<dyn EntityStore<E>>,
    index: Arc<dyn SpatialIndex<E>>,
    minimum_ttl: Duration,
}

impl<E: Indexed> EntitySync<E> {
    pub fn new(
        store: Arc<dyn EntityStore<E>>,
        index: Arc<dyn SpatialIndex<E>>,
        minimum_ttl: Duration,
    ) -> Self {
        EntitySync {
            store,
            index,
            minimum_ttl,
        }
    }

    /// Computes the writes for `batch` against `previous_ids` and current state.
    pub async fn plan(
        &self,
        namespace: &ProviderNamespace,
        previous_ids: Option<HashSet<String>>,
        batch: MappedBatch<E>,
        now: DateTime<Utc>,
    ) -> SyncResult<SyncPlan<E>> {
        let system_id = namespace.system_id.as_str();
        let new_ids: HashSet<String> = batch.entities.iter().map(|e| e.id().to_string()).collect();

        // Step 2: ids to remove, plus index members known to belong to the provider.
        let fallback = previous_ids.is_none();
        let mut listed: Vec<IndexId<E>> = Vec::new();
        let ids_to_remove: HashSet<String> = match previous_ids {
            Some(previous) => previous.difference(&new_ids).cloned().collect(),
            None => {
                listed = self
                    .index
                    .list_all()
                    .await?
                    .into_iter()
                    .filter(|id| id.namespace.system_id == system_id)
                    .collect();
                new_ids
                    .iter()
                    .cloned()
                    .chain(listed.iter().map(|id| id.id.clone()))
                    .collect()
            }
        };

        // Step 3: current cache entries of every affected key.
        let affected: Vec<CacheKey> = new_ids
            .union(&ids_to_remove)
            .map(|id| CacheKey::new(id.clone(), system_id))
            .collect();
        let current: HashMap<CacheKey, E> = self.store.get_all(&affected).await?;

        let index_upserts: Vec<(IndexId<E>, Coordinate)> = batch
            .entities
            .iter()
            .map(|e| (e.spatial_index_id(namespace), e.coordinate()))
            .collect();
        let fresh: HashSet<&IndexId<E>> = index_upserts.iter().map(|(id, _)| id).collect();

        // Steps 4 and 5: retire index ids that no longer describe a live entity.
        let mut retired: HashSet<IndexId<E>> = HashSet::new();
        for entity in &batch.entities {
            if let Some(cached) = current.get(&entity.cache_key()) {
                let old = cached.spatial_index_id(namespace);
                if !fresh.contains(&old) {
                    retired.insert(old);
                }
            }
        }
        for id in &ids_to_remove {
            if let Some(cached) = current.get(&CacheKey::new(id.clone(), system_id)) {
                let old = cached.spatial_index_id(namespace);
                if !fresh.contains(&old) {
                    retired.insert(old);
                }
            }
        }
        for id in listed {
            if !fresh.contains(&id) {
                retired.insert(id);
            }
        }

        let mut cache_removals: Vec<CacheKey> = ids_to_remove
            .into_iter()
            .map(|id| CacheKey::new(id, system_id))
            .collect();
        cache_removals.sort();

        Ok(SyncPlan {
            index_removals: retired.into_iter().collect(),
            cache_removals,
            ttl: ttl::cache_ttl(batch.last_updated, batch.ttl, self.minimum_ttl, now),
            upserts: batch.entities,
            index_upserts,
            fallback,
        })
    }

    /// Issues the plan's writes in order, stopping at the first failure.
    pub async fn apply(&self, plan: &SyncPlan<E>) -> SyncResult<()> {
        self.index.remove_many(&plan.index_removals).await?;
        self.store.remove_all(&plan.cache_removals).await?;
        self.store.put_all(&plan.upserts, plan.ttl).await?;
        self.index.upsert_many(&plan.index_upserts).await?;
        Ok(())
    }

    /// Plans and applies one cycle.
    pub async fn run(
        &self,
        namespace: &ProviderNamespace,
        previous_ids: Option<HashSet<String>>,
        batch: MappedBatch<E>,
        now: DateTime<Utc>,
    ) -> SyncResult<SyncReport> {
        let rejected = batch.rejected.len();
        for reason in &batch.rejected {
            debug!(provider = %namespace.system_id, category = E::CATEGORY, %reason, "Record rejected");
        }

        let plan = self.plan(namespace, previous_ids, batch, now).await?;
        debug!(
            provider = %namespace.system_id,
            category = E::CATEGORY,
            index_removals = plan.index_removals.len(),
            cache_removals = plan.cache_removals.len(),
            upserts = plan.upserts.len(),
            ttl_secs = plan.ttl.as_secs(),
            "Applying plan"
        );
        self.apply(&plan).await?;

        Ok(SyncReport {
            upserted: plan.upserts.len(),
            removed_from_cache: plan.cache_removals.len(),
            removed_from_index: plan.index_removals.len(),
            rejected,
            fallback: plan.fallback,
        })
    }
}

// =============================================================================
// Synchronizer
// =============================================================================

/// Runs both categories of a provider delivery.
pub struct Synchronizer {
    vehicles: EntitySync<Vehicle>,
    stations: EntitySync<Station>,
}

impl Synchronizer {
    pub fn new(stores: &Stores, minimum_ttl: Duration) -> Self {
        Synchronizer {
            vehicles: EntitySync::new(stores.vehicles.clone(), stores.vehicle_index.clone(), minimum_ttl),
            stations: EntitySync::new(stores.stations.clone(), stores.station_index.clone(), minimum_ttl),
        }
    }

    /// Synchronizes `delivery` against `previous` (the provider's last delivery).
    pub async fn synchronize(
        &self,
        provider: &FeedProvider,
        previous: Option<&Delivery>,
        delivery: &Delivery,
    ) -> CycleReport {
        self.synchronize_at(provider, previous, delivery, Utc::now()).await
    }

    pub async fn synchronize_at(
        &self,
        provider: &FeedProvider,
        previous: Option<&Delivery>,
        delivery: &Delivery,
        now: DateTime<Utc>,
    ) -> CycleReport {
        let vehicles = run_category(
            &self.vehicles,
            provider,
            validation::map_vehicles(provider, delivery),
            previous.and_then(validation::vehicle_ids),
            now,
        )
        .await;

        let stations = run_category(
            &self.stations,
            provider,
            validation::map_stations(provider, delivery),
            previous.and_then(validation::station_ids),
            now,
        )
        .await;

        CycleReport {
            system_id: provider.system_id().to_string(),
            vehicles,
            stations,
        }
    }
}

async fn run_category<E: Indexed>(
    sync: &EntitySync<E>,
    provider: &FeedProvider,
    mapped: Result<MappedBatch<E>, CoreError>,
    previous_ids: Option<HashSet<String>>,
    now: DateTime<Utc>,
) -> CategoryOutcome {
    let system_id = provider.system_id();
    let batch = match mapped {
        Ok(batch) => batch,
        Err(e @ CoreError::MissingFeed(_)) => {
            debug!(provider = %system_id, category = E::CATEGORY, reason = %e, "Nothing to synchronize");
            return CategoryOutcome::Skipped(e);
        }
        Err(e) => {
            warn!(provider = %system_id, category = E::CATEGORY, reason = %e, "Category skipped");
            return CategoryOutcome::Skipped(e);
        }
    };

    match sync.run(&provider.namespace, previous_ids, batch, now).await {
        Ok(report) => {
            info!(
                provider = %system_id,
                category = E::CATEGORY,
                upserted = report.upserted,
                removed_from_cache = report.removed_from_cache,
                removed_from_index = report.removed_from_index,
                rejected = report.rejected,
                fallback = report.fallback,
                "Category synchronized"
            );
            CategoryOutcome::Synced(report)
        }
        Err(e) => {
            error!(provider = %system_id, category = E::CATEGORY, error = %e, "Category write failed");
            CategoryOutcome::Failed(e)
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
