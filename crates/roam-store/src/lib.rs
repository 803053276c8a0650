//! # roam-store: Storage Layer
//!
//! Entity cache, spatial index and lease lock for the availability engine.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         roam-store                                      │
//! │                                                                         │
//! │   Traits (storage seams)                                                │
//! │   ┌──────────────────┐ ┌──────────────────┐ ┌──────────────────┐       │
//! │   │ EntityStore<E>   │ │ SpatialIndex<E>  │ │ DistributedLock  │       │
//! │   │ get/put/remove   │ │ upsert/remove    │ │ acquire/renew    │       │
//! │   │ has_key (TTL)    │ │ radius/list_all  │ │ release (lease)  │       │
//! │   └────────┬─────────┘ └────────┬─────────┘ └────────┬─────────┘       │
//! │            │                    │                    │                  │
//! │     ┌──────┴──────┐      ┌──────┴──────┐      ┌──────┴──────┐          │
//! │     │ memory      │      │ memory      │      │ memory      │          │
//! │     │ redis       │      │ redis (geo) │      │ redis (Lua) │          │
//! │     └─────────────┘      └─────────────┘      └─────────────┘          │
//! │                                                                         │
//! │   Stores = { vehicles, vehicle_index, stations, station_index }        │
//! │        │                                                                │
//! │        ├──► Synchronizer (roam-sync, leader only, writes)              │
//! │        └──► GeoSearchService (any node, reads + orphan repair)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency
//! The cache and the index are two independent stores with no transaction
//! between them. A reader may briefly see an index member whose entity is
//! gone (it is skipped) or both the old and the new member of an entity
//! whose attributes just changed (the entity is returned once).

pub mod entity;
pub mod error;
pub mod index;
pub mod lock;
pub mod memory;
pub mod redis_backend;
pub mod search;

use std::sync::Arc;

use roam_core::{Station, Vehicle};

pub use entity::EntityStore;
pub use error::{StoreError, StoreResult};
pub use index::{IndexId, SpatialIndex};
pub use lock::DistributedLock;
pub use memory::{MemoryEntityStore, MemoryLock, MemoryLockRegistry, MemorySpatialIndex};
pub use redis_backend::{RedisBackend, RedisConfig};
pub use search::{GeoSearchService, RadiusQuery};

/// The four stores the engine writes and the read path queries.
#[derive(Clone)]
pub struct Stores {
    pub vehicles: Arc<dyn EntityStore<Vehicle>>,
    pub vehicle_index: Arc<dyn SpatialIndex<Vehicle>>,
    pub stations: Arc<dyn EntityStore<Station>>,
    pub station_index: Arc<dyn SpatialIndex<Station>>,
}

impl Stores {
    /// Fresh process-local stores.
    pub fn in_memory() -> Self {
        Stores {
            vehicles: Arc::new(MemoryEntityStore::<Vehicle>::new()),
            vehicle_index: Arc::new(MemorySpatialIndex::<Vehicle>::new()),
            stations: Arc::new(MemoryEntityStore::<Station>::new()),
            station_index: Arc::new(MemorySpatialIndex::<Station>::new()),
        }
    }

    /// Stores on a connected Redis backend.
    pub fn redis(backend: &RedisBackend) -> Self {
        Stores {
            vehicles: Arc::new(backend.entities::<Vehicle>()),
            vehicle_index: Arc::new(backend.index::<Vehicle>()),
            stations: Arc::new(backend.entities::<Station>()),
            station_index: Arc::new(backend.index::<Station>()),
        }
    }
}
