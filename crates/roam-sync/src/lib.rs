//! # roam-sync: Synchronization Engine
//!
//! Keeps the shared availability stores in step with upstream provider
//! feeds, on exactly one node of the cluster at a time.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Agent Architecture                          │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      SyncAgent (Main Orchestrator)               │  │
//! │  │                                                                  │  │
//! │  │  Spawned by roam-node; one per process                           │  │
//! │  │  Starts/stops the scheduler as leadership comes and goes         │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ElectionService │  │   Scheduler    │  │  SnapshotSource        │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Lease lock     │  │ Cycle timer    │  │ ChannelSource (push)   │    │
//! │  │ tick / renew   │  │ join_all over  │  │ SpoolSource (pull)     │    │
//! │  │ watch<NodeRole>│  │ providers      │  │ FeedAdapter            │    │
//! │  └────────────────┘  └───────┬────────┘  └────────────────────────┘    │
//! │                              ▼                                          │
//! │                     ┌────────────────┐                                  │
//! │                     │  Synchronizer  │ diff + ordered writes to        │
//! │                     │                │ EntityStore / SpatialIndex      │
//! │                     └────────────────┘                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`agent`] - Main `SyncAgent` orchestrator
//! - [`config`] - Node configuration (TOML + environment)
//! - [`election`] - Lease-based leader election
//! - [`error`] - Sync error types
//! - [`scheduler`] - Leader-only cycle loop
//! - [`source`] - Snapshot sources and feed adapters
//! - [`synchronizer`] - Diff and apply per entity category
//!
//! ## Usage
//!
//! ```rust,ignore
//! use roam_store::{MemoryLockRegistry, Stores};
//! use roam_sync::{RoamConfig, SpoolSource, SyncAgent};
//!
//! let config = Arc::new(RoamConfig::load(None)?);
//! let stores = Stores::in_memory();
//! let lock = Arc::new(MemoryLockRegistry::new().handle(config.node_id()));
//! let source = Arc::new(SpoolSource::new(&config.source.spool_dir));
//!
//! let agent = SyncAgent::new(config, &stores, lock, source).start();
//! // ...
//! agent.shutdown().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod config;
pub mod election;
pub mod error;
pub mod scheduler;
pub mod source;
pub mod synchronizer;

#[cfg(test)]
mod fixtures;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{AgentHandle, SyncAgent};
pub use config::{
    ElectionSettings, NodeConfig, RoamConfig, SourceSettings, StorageBackend, StorageSettings,
    SyncSettings,
};
pub use election::{ElectionHandle, ElectionService, LeaderElector, NodeRole, Transition};
pub use error::{SyncError, SyncResult};
pub use scheduler::{OrphanReport, Scheduler, SchedulerHandle};
pub use source::{CanonicalJsonAdapter, ChannelSource, FeedAdapter, FeedSender, SnapshotSource, SpoolSource};
pub use synchronizer::{CategoryOutcome, CycleReport, EntitySync, SyncReport, Synchronizer};
