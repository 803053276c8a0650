//! # Scheduler
//!
//! The leader-only loop that synchronizes every registered provider once
//! per cycle.
//!
//! ## Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  every cycle_interval (default 30s):                                    │
//! │                                                                         │
//! │   provider A ─┐   poll source ─► synchronize(prev_A, new) ─► prev_A=new │
//! │   provider B ─┼─► (join_all, concurrent across providers)               │
//! │   provider C ─┘   sequential within one provider (entry lock held)      │
//! │                                                                         │
//! │  source error / nothing new  → provider skipped, prev kept              │
//! │  a category write failed     → prev cleared, next cycle rebuilds        │
//! │                                                                         │
//! │  every orphan_interval (optional):                                      │
//! │   index members whose cache entry is gone → removed from the index      │
//! │                                                                         │
//! │  stop(): no new cycles; an in-flight cycle runs to completion           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use roam_core::{Delivery, FeedProvider};
use roam_store::GeoSearchService;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::source::SnapshotSource;
use crate::synchronizer::{CategoryOutcome, CycleReport, Synchronizer};

// =============================================================================
// Scheduler
// =============================================================================

/// Runs synchronization cycles over a fixed provider registry.
pub struct Scheduler {
    providers: Vec<FeedProvider>,
    source: Arc<dyn SnapshotSource>,
    synchronizer: Arc<Synchronizer>,
    cycle_interval: Duration,

    /// Last delivery offered per provider, keyed by system id.
    previous: HashMap<String, Mutex<Option<Delivery>>>,

    orphan_repair: Option<OrphanRepair>,
}

struct OrphanRepair {
    search: GeoSearchService,
    every: Duration,
}

/// Index members removed by one orphan repair pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrphanReport {
    pub vehicles: usize,
    pub stations: usize,
}

/// Handle for stopping a running scheduler.
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops scheduling and waits for an in-flight cycle to finish.
    pub async fn stop(self) -> SyncResult<()> {
        // A closed channel means the loop already exited.
        let _ = self.shutdown_tx.send(()).await;
        self.task
            .await
            .map_err(|e| SyncError::ChannelError(format!("Scheduler task failed: {}", e)))
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Scheduler {
    pub fn new(
        providers: Vec<FeedProvider>,
        source: Arc<dyn SnapshotSource>,
        synchronizer: Arc<Synchronizer>,
        cycle_interval: Duration,
    ) -> Self {
        let previous = providers
            .iter()
            .map(|p| (p.system_id().to_string(), Mutex::new(None)))
            .collect();

        Scheduler {
            providers,
            source,
            synchronizer,
            cycle_interval,
            previous,
            orphan_repair: None,
        }
    }

    /// Also removes orphaned index members every `every`.
    ///
    /// A cache entry that expires before its entity leaves the feed is never
    /// seen by the diff again, so its index member needs this pass.
    pub fn with_orphan_repair(mut self, search: GeoSearchService, every: Duration) -> Self {
        self.orphan_repair = Some(OrphanRepair { search, every });
        self
    }

    /// Spawns the cycle loop. The first cycle starts immediately.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle { shutdown_tx, task }
    }

    async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        info!(
            providers = self.providers.len(),
            interval_secs = self.cycle_interval.as_secs(),
            "Scheduler starting"
        );

        let mut ticker = interval(self.cycle_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // First repair one period after start, not alongside the first cycle.
        let mut repair_ticker = self.orphan_repair.as_ref().map(|repair| {
            let mut ticker = interval_at(Instant::now() + repair.every, repair.every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                _ = next_tick(&mut repair_ticker) => {
                    if let Err(e) = self.repair_orphans().await {
                        warn!(error = %e, "Orphan repair failed");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Scheduler shutting down");
                    break;
                }
            }
        }

        info!("Scheduler stopped");
    }

    /// Runs one cycle over all providers.
    ///
    /// Returns the reports of providers that had a delivery.
    pub async fn run_cycle(&self) -> Vec<CycleReport> {
        let reports: Vec<CycleReport> = join_all(self.providers.iter().map(|p| self.run_provider(p)))
            .await
            .into_iter()
            .flatten()
            .collect();

        debug!(
            providers = self.providers.len(),
            synchronized = reports.len(),
            "Cycle complete"
        );
        reports
    }

    /// Removes index members of both categories whose cache entry is gone.
    ///
    /// Does nothing when the scheduler was built without orphan repair.
    pub async fn repair_orphans(&self) -> SyncResult<OrphanReport> {
        let Some(repair) = &self.orphan_repair else {
            return Ok(OrphanReport::default());
        };

        let report = OrphanReport {
            vehicles: repair.search.remove_vehicle_orphans().await?.len(),
            stations: repair.search.remove_station_orphans().await?.len(),
        };

        if report == OrphanReport::default() {
            debug!("No orphaned index entries");
        } else {
            info!(
                vehicles = report.vehicles,
                stations = report.stations,
                "Removed orphaned index entries"
            );
        }
        Ok(report)
    }

    async fn run_provider(&self, provider: &FeedProvider) -> Option<CycleReport> {
        let system_id = provider.system_id();
        let Some(slot) = self.previous.get(system_id) else {
            error!(provider = %system_id, "Provider missing from scheduler state");
            return None;
        };
        let mut previous = slot.lock().await;

        let delivery = match self.source.poll(provider).await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => {
                debug!(provider = %system_id, "No new delivery");
                return None;
            }
            Err(e) => {
                warn!(provider = %system_id, error = %e, "Snapshot source failed");
                return None;
            }
        };

        let report = self
            .synchronizer
            .synchronize(provider, previous.as_ref(), &delivery)
            .await;

        let failed = matches!(report.vehicles, CategoryOutcome::Failed(_))
            || matches!(report.stations, CategoryOutcome::Failed(_));
        if failed {
            warn!(provider = %system_id, "Write failed; next cycle rebuilds from scratch");
            *previous = None;
        } else {
            *previous = Some(delivery);
        }

        Some(report)
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
