//! # Sync Agent
//!
//! Main orchestrator of a node. Ties leadership to the scheduler.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncAgent Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                         SyncAgent                                │  │
//! │  │                                                                  │  │
//! │  │  • Starts the election service                                   │  │
//! │  │  • Watches the role channel                                      │  │
//! │  │  • Follower → Leader: starts a fresh Scheduler                   │  │
//! │  │  • Leader → Follower: stops it (in-flight cycle completes)       │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┴─────────────────────┐                  │
//! │         ▼                                           ▼                   │
//! │  ┌────────────────┐                       ┌────────────────────────┐   │
//! │  │ElectionService │ ──watch<NodeRole>──►  │ Scheduler (leader only)│   │
//! │  │ tick / lease   │                       │ source → Synchronizer  │   │
//! │  └────────────────┘                       │ orphan repair          │   │
//! │                                           └────────────────────────┘   │
//! │                                                                         │
//! │  SHUTDOWN: stop scheduler → resign (release lock) → exit               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A new scheduler starts without previous deliveries, so the first cycle
//! after (re)gaining leadership rebuilds each provider's categories. Another
//! node may have written in between.

use std::sync::Arc;

use roam_store::{DistributedLock, GeoSearchService, Stores};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::RoamConfig;
use crate::election::{ElectionHandle, ElectionService, LeaderElector, NodeRole};
use crate::error::{SyncError, SyncResult};
use crate::scheduler::{Scheduler, SchedulerHandle};
use crate::source::SnapshotSource;
use crate::synchronizer::Synchronizer;

// =============================================================================
// Sync Agent
// =============================================================================

/// Main agent wiring election, scheduling and synchronization.
pub struct SyncAgent {
    config: Arc<RoamConfig>,
    lock: Arc<dyn DistributedLock>,
    source: Arc<dyn SnapshotSource>,
    synchronizer: Arc<Synchronizer>,
    search: GeoSearchService,
}

/// Handle for observing and stopping a running agent.
pub struct AgentHandle {
    election: ElectionHandle,
    syncing_rx: watch::Receiver<bool>,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl AgentHandle {
    pub fn role(&self) -> NodeRole {
        self.election.role()
    }

    pub fn is_leader(&self) -> bool {
        self.election.is_leader()
    }

    /// True while a scheduler is running on this node.
    pub fn is_syncing(&self) -> bool {
        *self.syncing_rx.borrow()
    }

    /// Subscribes to scheduler start/stop.
    pub fn subscribe_syncing(&self) -> watch::Receiver<bool> {
        self.syncing_rx.clone()
    }

    /// Stops the scheduler, releases leadership and waits for the agent to exit.
    pub async fn shutdown(self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Agent shutdown channel closed".into()))?;
        self.task
            .await
            .map_err(|e| SyncError::ChannelError(format!("Agent task failed: {}", e)))
    }
}

impl SyncAgent {
    pub fn new(
        config: Arc<RoamConfig>,
        stores: &Stores,
        lock: Arc<dyn DistributedLock>,
        source: Arc<dyn SnapshotSource>,
    ) -> Self {
        let synchronizer = Arc::new(Synchronizer::new(stores, config.sync.minimum_ttl()));
        SyncAgent {
            config,
            lock,
            source,
            synchronizer,
            search: GeoSearchService::new(stores.clone()),
        }
    }

    /// Starts election and returns a handle.
    pub fn start(self) -> AgentHandle {
        let elector = LeaderElector::new(self.lock.clone(), self.config.election.clone());
        let election = ElectionService::new(elector).start();
        let (syncing_tx, syncing_rx) = watch::channel(false);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let task = tokio::spawn(self.run(election.clone(), syncing_tx, shutdown_rx));

        AgentHandle {
            election,
            syncing_rx,
            shutdown_tx,
            task,
        }
    }

    fn scheduler(&self) -> Scheduler {
        Scheduler::new(
            self.config.providers.clone(),
            self.source.clone(),
            self.synchronizer.clone(),
            self.config.sync.cycle_interval(),
        )
        .with_orphan_repair(self.search.clone(), self.config.sync.orphan_check_interval())
    }

    async fn run(
        self,
        election: ElectionHandle,
        syncing_tx: watch::Sender<bool>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        info!(
            node_id = %self.config.node_id(),
            providers = self.config.providers.len(),
            "Sync agent starting"
        );

        let mut role_rx = election.subscribe();
        let mut scheduler: Option<SchedulerHandle> = None;

        loop {
            tokio::select! {
                changed = role_rx.changed() => {
                    if changed.is_err() {
                        warn!("Election service stopped; stopping scheduler");
                        stop_scheduler(&mut scheduler, &syncing_tx).await;
                        break;
                    }
                    let role = *role_rx.borrow_and_update();
                    match role {
                        NodeRole::Leader if scheduler.is_none() => {
                            info!("Leader: starting scheduler");
                            scheduler = Some(self.scheduler().start());
                            syncing_tx.send_replace(true);
                        }
                        NodeRole::Follower if scheduler.is_some() => {
                            info!("Follower: stopping scheduler");
                            stop_scheduler(&mut scheduler, &syncing_tx).await;
                        }
                        _ => {}
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Sync agent shutting down");
                    stop_scheduler(&mut scheduler, &syncing_tx).await;
                    if let Err(e) = election.shutdown().await {
                        warn!(error = %e, "Election service already stopped");
                    }
                    break;
                }
            }
        }

        info!("Sync agent stopped");
    }
}

async fn stop_scheduler(scheduler: &mut Option<SchedulerHandle>, syncing_tx: &watch::Sender<bool>) {
    if let Some(handle) = scheduler.take() {
        if let Err(e) = handle.stop().await {
            error!(error = %e, "Scheduler did not stop cleanly");
        }
    }
    syncing_tx.send_replace(false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ids, provider, vehicles, SYSTEM_ID};
    use crate::source::ChannelSource;
    use async_trait::async_trait;
    use roam_core::{CacheKey, FeedMessage};
    use roam_store::{MemoryLock, MemoryLockRegistry, StoreResult};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn config() -> Arc<RoamConfig> {
        let mut config = RoamConfig::default();
        config.election.acquire_wait_ms = 0;
        config.providers = vec![provider()];
        Arc::new(config)
    }

    /// Lock whose renewals start failing once revoked.
    struct RevocableLock {
        inner: MemoryLock,
        revoked: AtomicBool,
    }

    #[async_trait]
    impl DistributedLock for RevocableLock {
        fn owner(&self) -> &str {
            self.inner.owner()
        }

        async fn try_acquire(&self, key: &str, wait: Duration, lease: Duration) -> StoreResult<bool> {
            if self.revoked.load(Ordering::SeqCst) {
                return Ok(false);
            }
            self.inner.try_acquire(key, wait, lease).await
        }

        async fn renew(&self, key: &str, lease: Duration) -> StoreResult<bool> {
            if self.revoked.load(Ordering::SeqCst) {
                return Ok(false);
            }
            self.inner.renew(key, lease).await
        }

        async fn release(&self, key: &str) -> StoreResult<bool> {
            self.inner.release(key).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_leader_runs_scheduler() {
        let stores = Stores::in_memory();
        let registry = MemoryLockRegistry::new();
        let (source, tx) = ChannelSource::new(16);

        let delivery = vehicles(ids(&["A"]));
        let messages = [
            delivery.system_information.map(FeedMessage::SystemInformation),
            delivery.vehicle_types.map(FeedMessage::VehicleTypes),
            delivery.system_pricing_plans.map(FeedMessage::SystemPricingPlans),
            delivery.free_bike_status.map(FeedMessage::FreeBikeStatus),
        ];
        for message in messages.into_iter().flatten() {
            tx.send((SYSTEM_ID.to_string(), message)).await.unwrap();
        }

        let handle = SyncAgent::new(
            config(),
            &stores,
            Arc::new(registry.handle("node-a")),
            Arc::new(source),
        )
        .start();

        let mut syncing = handle.subscribe_syncing();
        syncing.wait_for(|s| *s).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(handle.is_leader());
        assert!(stores
            .vehicles
            .has_key(&CacheKey::new("A", SYSTEM_ID))
            .await
            .unwrap());

        handle.shutdown().await.unwrap();
        assert!(registry.holder("leader").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_one_agent_syncs() {
        let stores = Stores::in_memory();
        let registry = MemoryLockRegistry::new();
        let start = |node: &str| {
            let (source, _tx) = ChannelSource::new(1);
            SyncAgent::new(config(), &stores, Arc::new(registry.handle(node)), Arc::new(source)).start()
        };
        let a = start("node-a");
        let b = start("node-b");

        for _ in 0..6 {
            tokio::time::sleep(Duration::from_secs(20)).await;
            assert!(!(a.is_syncing() && b.is_syncing()));
        }
        assert!(a.is_syncing() ^ b.is_syncing());

        a.shutdown().await.unwrap();
        b.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_lock_stops_scheduler() {
        let stores = Stores::in_memory();
        let registry = MemoryLockRegistry::new();
        let lock = Arc::new(RevocableLock {
            inner: registry.handle("node-a"),
            revoked: AtomicBool::new(false),
        });
        let (source, _tx) = ChannelSource::new(1);
        let handle = SyncAgent::new(config(), &stores, lock.clone(), Arc::new(source)).start();

        let mut syncing = handle.subscribe_syncing();
        syncing.wait_for(|s| *s).await.unwrap();

        lock.revoked.store(true, Ordering::SeqCst);
        syncing.wait_for(|s| !*s).await.unwrap();
        assert_eq!(handle.role(), NodeRole::Follower);

        handle.shutdown().await.unwrap();
    }
}
