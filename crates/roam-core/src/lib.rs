//! # roam-core: Pure Domain Model for the Availability Engine
//!
//! This crate holds everything the synchronization engine reasons about,
//! as plain values and pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Roam Architecture                                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    roam-node (binary)                           │   │
//! │  │    config ──► backends ──► SyncAgent ──► shutdown               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    roam-sync (engine)                           │   │
//! │  │    LeaderElector ──► Scheduler ──► Synchronizer                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    roam-store (storage)                         │   │
//! │  │    EntityStore • SpatialIndex • DistributedLock • GeoSearch     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ roam-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  model    │  │   feed    │  │ spatial_id│  │ validation│  │   │
//! │  │   │ Vehicle   │  │ Snapshot  │  │ CacheKey  │  │  mapping  │  │   │
//! │  │   │ Station   │  │ Delivery  │  │ IndexId   │  │  rejects  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO CACHE • NO NETWORK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`provider`] - Provider namespace and registry entries
//! - [`model`] - Entities (Vehicle, Station) and their category attributes
//! - [`feed`] - Canonical feed snapshots and per-provider deliveries
//! - [`spatial_id`] - Cache keys and composite spatial index ids
//! - [`filter`] - Predicates over spatial index ids
//! - [`validation`] - Snapshot validation and entity mapping
//! - [`ttl`] - Cache TTL computation
//! - [`geo`] - Distance units and great-circle distance
//! - [`error`] - Domain error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod feed;
pub mod filter;
pub mod geo;
pub mod model;
pub mod provider;
pub mod spatial_id;
pub mod ttl;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use feed::{Delivery, FeedKind, FeedMessage, FeedSnapshot};
pub use filter::{NamespaceFilter, SpatialFilter, StationFilter, VehicleFilter};
pub use geo::{Coordinate, DistanceUnit, SortOrder};
pub use model::{
    FormFactor, PricingPlan, PropulsionType, Station, SystemInfo, Vehicle, VehicleType,
    VehicleTypeAvailability,
};
pub use provider::{FeedProvider, ProviderNamespace};
pub use spatial_id::{
    CacheKey, Indexed, SpatialIndexId, StationAttributes, StationSpatialIndexId,
    VehicleAttributes, VehicleSpatialIndexId,
};
pub use validation::MappedBatch;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Lower bound for the TTL of a cached entity, in seconds.
///
/// A snapshot whose `last_updated + ttl` is already in the past still keeps
/// its entities alive this long, so a slow feed does not blank the map.
pub const DEFAULT_MINIMUM_TTL_SECS: u64 = 300;
