//! # Leader Election Module
//!
//! Decides which node runs the synchronization loop.
//!
//! ## Election Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Lease-Based Leader Election                          │
//! │                                                                         │
//! │  EVERY TICK (default 30s):                                              │
//! │  ─────────────────────────                                              │
//! │  Follower → try_acquire(lock_key, wait, lease)                          │
//! │               true   → Leader        (Acquired)                         │
//! │               false  → Follower      (StillFollower)                    │
//! │  Leader   → renew(lock_key, lease)                                      │
//! │               true   → Leader        (Renewed)                          │
//! │               false  → Follower      (Lost)                             │
//! │                                                                         │
//! │  LEASE (default 60s, must be ≥ 2 × tick):                               │
//! │  ────────────────────────────────────────                               │
//! │  • one missed renewal does not cost leadership                          │
//! │  • a crashed leader blocks the cluster for at most one lease            │
//! │  • exclusivity lives in the lock backend, never in local state          │
//! │                                                                         │
//! │  STATE TRANSITIONS:                                                     │
//! │                                                                         │
//! │  ┌────────────┐      Acquired       ┌─────────────┐                     │
//! │  │  FOLLOWER  │ ──────────────────▶ │   LEADER    │ ◀──┐ Renewed        │
//! │  └────────────┘ ◀────────────────── └─────────────┘ ───┘                │
//! │                    Lost / resign                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`LeaderElector`] is the state machine: one [`tick`](LeaderElector::tick)
//! per call, no timers. [`ElectionService`] drives it on an interval and
//! publishes the role on a `watch` channel.

use std::sync::Arc;

use roam_store::DistributedLock;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ElectionSettings;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Node Role
// =============================================================================

/// Current role of this node in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeRole {
    /// Not holding the lock. Initial state.
    #[default]
    Follower,
    /// Holding the lock; runs the scheduler.
    Leader,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::Follower => write!(f, "follower"),
            NodeRole::Leader => write!(f, "leader"),
        }
    }
}

/// Transition taken by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Acquired,
    Renewed,
    Lost,
    StillFollower,
}

impl Transition {
    /// Role after the transition.
    pub fn role(&self) -> NodeRole {
        match self {
            Transition::Acquired | Transition::Renewed => NodeRole::Leader,
            Transition::Lost | Transition::StillFollower => NodeRole::Follower,
        }
    }

    /// True if the role differs from the one before the tick.
    pub fn is_change(&self) -> bool {
        matches!(self, Transition::Acquired | Transition::Lost)
    }
}

// =============================================================================
// Leader Elector
// =============================================================================

/// Leadership state machine over a [`DistributedLock`].
pub struct LeaderElector {
    lock: Arc<dyn DistributedLock>,
    settings: ElectionSettings,
    role: NodeRole,
}

impl LeaderElector {
    pub fn new(lock: Arc<dyn DistributedLock>, settings: ElectionSettings) -> Self {
        LeaderElector {
            lock,
            settings,
            role: NodeRole::Follower,
        }
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn is_leader(&self) -> bool {
        self.role == NodeRole::Leader
    }

    pub fn settings(&self) -> &ElectionSettings {
        &self.settings
    }

    /// Evaluates the transition rule once.
    ///
    /// A backend error counts as a failed acquisition or renewal.
    pub async fn tick(&mut self) -> Transition {
        let key = self.settings.lock_key.as_str();
        let transition = match self.role {
            NodeRole::Follower => {
                match self
                    .lock
                    .try_acquire(key, self.settings.acquire_wait(), self.settings.lease())
                    .await
                {
                    Ok(true) => Transition::Acquired,
                    Ok(false) => Transition::StillFollower,
                    Err(e) => {
                        warn!(lock = key, error = %e, "Lock acquisition failed");
                        Transition::StillFollower
                    }
                }
            }
            NodeRole::Leader => match self.lock.renew(key, self.settings.lease()).await {
                Ok(true) => Transition::Renewed,
                Ok(false) => Transition::Lost,
                Err(e) => {
                    warn!(lock = key, error = %e, "Lease renewal failed");
                    Transition::Lost
                }
            },
        };

        self.role = transition.role();
        match transition {
            Transition::Acquired => info!(owner = %self.lock.owner(), "Became leader"),
            Transition::Lost => warn!(owner = %self.lock.owner(), "Lost leadership"),
            Transition::Renewed => debug!("Leadership renewed"),
            Transition::StillFollower => debug!("Lock held elsewhere; staying follower"),
        }
        transition
    }

    /// Steps down, releasing the lock if this node holds it.
    pub async fn resign(&mut self) {
        if self.role != NodeRole::Leader {
            return;
        }
        self.role = NodeRole::Follower;
        match self.lock.release(&self.settings.lock_key).await {
            Ok(true) => info!("Released leadership"),
            Ok(false) => debug!("Lock was no longer ours at release"),
            Err(e) => warn!(error = %e, "Lock release failed; lease will expire"),
        }
    }
}

// =============================================================================
// Election Service
// =============================================================================

/// Commands that can be sent to the election service.
#[derive(Debug)]
pub enum ElectionCommand {
    /// Resign and stop; acknowledged once the lock is released.
    Shutdown { done: oneshot::Sender<()> },
}

/// Handle for interacting with the election service.
#[derive(Clone)]
pub struct ElectionHandle {
    role_rx: watch::Receiver<NodeRole>,
    cmd_tx: mpsc::Sender<ElectionCommand>,
}

impl ElectionHandle {
    /// Returns the current role.
    pub fn role(&self) -> NodeRole {
        *self.role_rx.borrow()
    }

    pub fn is_leader(&self) -> bool {
        self.role() == NodeRole::Leader
    }

    /// Subscribes to role changes.
    pub fn subscribe(&self) -> watch::Receiver<NodeRole> {
        self.role_rx.clone()
    }

    /// Stops the election loop, releasing leadership first.
    pub async fn shutdown(&self) -> SyncResult<()> {
        let (done, ack) = oneshot::channel();
        self.cmd_tx
            .send(ElectionCommand::Shutdown { done })
            .await
            .map_err(|_| SyncError::ChannelError("Election command channel closed".into()))?;
        ack.await
            .map_err(|_| SyncError::ChannelError("Election service dropped shutdown ack".into()))
    }
}

/// Periodic driver for a [`LeaderElector`].
pub struct ElectionService {
    elector: LeaderElector,
    role_tx: watch::Sender<NodeRole>,
}

impl ElectionService {
    pub fn new(elector: LeaderElector) -> Self {
        let (role_tx, _) = watch::channel(elector.role());
        ElectionService { elector, role_tx }
    }

    /// Starts the election loop and returns a handle.
    ///
    /// The first tick runs immediately.
    pub fn start(self) -> ElectionHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let handle = ElectionHandle {
            role_rx: self.role_tx.subscribe(),
            cmd_tx,
        };

        tokio::spawn(async move {
            self.run(cmd_rx).await;
        });

        handle
    }

    async fn run(mut self, mut cmd_rx: mpsc::Receiver<ElectionCommand>) {
        let tick_interval = self.elector.settings().tick_interval();
        info!(
            lock = %self.elector.settings().lock_key,
            tick_secs = tick_interval.as_secs(),
            lease_secs = self.elector.settings().lease_secs,
            "Election service started"
        );

        let mut ticker = interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    self.elector.resign().await;
                    self.role_tx.send_replace(NodeRole::Follower);
                    info!("Election service shutting down");
                    if let Some(ElectionCommand::Shutdown { done }) = cmd {
                        let _ = done.send(());
                    }
                    break;
                }
                _ = ticker.tick() => {
                    let transition = self.elector.tick().await;
                    if transition.is_change() {
                        self.role_tx.send_replace(transition.role());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roam_store::MemoryLockRegistry;
    use std::time::Duration;
    use tokio::time::advance;

    fn settings() -> ElectionSettings {
        ElectionSettings {
            lock_key: "leader".into(),
            tick_interval_secs: 30,
            lease_secs: 60,
            acquire_wait_ms: 0,
        }
    }

    fn elector(registry: &MemoryLockRegistry, node: &str) -> LeaderElector {
        LeaderElector::new(Arc::new(registry.handle(node)), settings())
    }

    #[test]
    fn test_node_role_display() {
        assert_eq!(NodeRole::Leader.to_string(), "leader");
        assert_eq!(NodeRole::Follower.to_string(), "follower");
        assert_eq!(NodeRole::default(), NodeRole::Follower);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutual_exclusion_until_lease_expires() {
        let registry = MemoryLockRegistry::new();
        let mut a = elector(&registry, "node-a");
        let mut b = elector(&registry, "node-b");

        assert_eq!(a.tick().await, Transition::Acquired);
        assert_eq!(b.tick().await, Transition::StillFollower);
        assert!(a.is_leader() && !b.is_leader());

        // `a` stops renewing. Before the lease runs out `b` cannot take over.
        advance(Duration::from_secs(59)).await;
        assert_eq!(b.tick().await, Transition::StillFollower);

        advance(Duration::from_secs(2)).await;
        assert_eq!(b.tick().await, Transition::Acquired);

        // The stale leader finds out on its next tick.
        assert_eq!(a.tick().await, Transition::Lost);
        assert!(!a.is_leader() && b.is_leader());
    }

    #[tokio::test(start_paused = true)]
    async fn test_renewal_keeps_leadership() {
        let registry = MemoryLockRegistry::new();
        let mut a = elector(&registry, "node-a");
        let mut b = elector(&registry, "node-b");

        assert_eq!(a.tick().await, Transition::Acquired);
        for _ in 0..10 {
            advance(Duration::from_secs(30)).await;
            assert_eq!(a.tick().await, Transition::Renewed);
            assert_eq!(b.tick().await, Transition::StillFollower);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lapsed_lease_without_competitor_is_renewed() {
        let registry = MemoryLockRegistry::new();
        let mut a = elector(&registry, "node-a");

        assert_eq!(a.tick().await, Transition::Acquired);
        advance(Duration::from_secs(61)).await;
        assert!(registry.holder("leader").await.is_none());

        assert_eq!(a.tick().await, Transition::Renewed);
        assert!(a.is_leader());
        assert!(registry.holder("leader").await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resign_releases_lock() {
        let registry = MemoryLockRegistry::new();
        let mut a = elector(&registry, "node-a");
        let mut b = elector(&registry, "node-b");

        a.tick().await;
        a.resign().await;
        assert_eq!(a.role(), NodeRole::Follower);
        assert!(registry.holder("leader").await.is_none());
        assert_eq!(b.tick().await, Transition::Acquired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_publishes_role_and_releases_on_shutdown() {
        let registry = MemoryLockRegistry::new();
        let handle = ElectionService::new(elector(&registry, "node-a")).start();

        let mut rx = handle.subscribe();
        rx.wait_for(|role| *role == NodeRole::Leader).await.unwrap();
        assert!(handle.is_leader());

        handle.shutdown().await.unwrap();
        assert_eq!(handle.role(), NodeRole::Follower);
        assert!(registry.holder("leader").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_services_never_both_lead() {
        let registry = MemoryLockRegistry::new();
        let a = ElectionService::new(elector(&registry, "node-a")).start();
        let b = ElectionService::new(elector(&registry, "node-b")).start();

        for _ in 0..8 {
            advance(Duration::from_secs(15)).await;
            tokio::task::yield_now().await;
            assert!(!(a.is_leader() && b.is_leader()));
        }
        assert!(a.is_leader() ^ b.is_leader());

        a.shutdown().await.unwrap();
        b.shutdown().await.unwrap();
    }
}
