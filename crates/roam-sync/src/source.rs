//! # Snapshot Sources
//!
//! Where provider deliveries come from.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PUSH  producer ──(system_id, FeedMessage)──► ChannelSource            │
//! │        one message per feed kind per provider; folded into the         │
//! │        provider's latest Delivery, handed out once per change          │
//! │                                                                         │
//! │  PULL  <spool>/<system_id>/<feed_kind>.json ──FeedAdapter──► Delivery  │
//! │        SpoolSource re-reads the files on every poll                    │
//! │                                                                         │
//! │  Both ──► Scheduler::poll(provider) ──► Synchronizer                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Format versions are an adapter concern. Every [`FeedAdapter`] produces
//! the canonical [`FeedMessage`], so nothing downstream knows which wire
//! format a provider speaks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use roam_core::{Delivery, FeedKind, FeedMessage, FeedProvider, FeedSnapshot};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Traits
// =============================================================================

/// Hands the scheduler the latest delivery of a provider.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Latest delivery, or `None` if there is nothing new to synchronize.
    async fn poll(&self, provider: &FeedProvider) -> SyncResult<Option<Delivery>>;
}

/// Translates one wire format into canonical feed messages.
pub trait FeedAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse(&self, kind: FeedKind, bytes: &[u8]) -> SyncResult<FeedMessage>;
}

// =============================================================================
// Canonical JSON Adapter
// =============================================================================

/// Reads the engine's own JSON shape of [`FeedSnapshot`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalJsonAdapter;

impl CanonicalJsonAdapter {
    fn snapshot<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> SyncResult<FeedSnapshot<T>> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl FeedAdapter for CanonicalJsonAdapter {
    fn name(&self) -> &'static str {
        "canonical-json"
    }

    fn parse(&self, kind: FeedKind, bytes: &[u8]) -> SyncResult<FeedMessage> {
        Ok(match kind {
            FeedKind::SystemInformation => FeedMessage::SystemInformation(Self::snapshot(bytes)?),
            FeedKind::VehicleTypes => FeedMessage::VehicleTypes(Self::snapshot(bytes)?),
            FeedKind::SystemPricingPlans => FeedMessage::SystemPricingPlans(Self::snapshot(bytes)?),
            FeedKind::FreeBikeStatus => FeedMessage::FreeBikeStatus(Self::snapshot(bytes)?),
            FeedKind::StationInformation => FeedMessage::StationInformation(Self::snapshot(bytes)?),
            FeedKind::StationStatus => FeedMessage::StationStatus(Self::snapshot(bytes)?),
        })
    }
}

// =============================================================================
// Channel Source (push)
// =============================================================================

/// Sender half handed to producers.
pub type FeedSender = mpsc::Sender<(String, FeedMessage)>;

struct Pending {
    delivery: Delivery,
    changed: bool,
}

/// Push-style source fed through an mpsc channel.
pub struct ChannelSource {
    rx: Mutex<mpsc::Receiver<(String, FeedMessage)>>,
    pending: Mutex<HashMap<String, Pending>>,
}

impl ChannelSource {
    pub fn new(buffer: usize) -> (Self, FeedSender) {
        let (tx, rx) = mpsc::channel(buffer);
        let source = ChannelSource {
            rx: Mutex::new(rx),
            pending: Mutex::new(HashMap::new()),
        };
        (source, tx)
    }

    /// Folds every queued message into the per-provider deliveries.
    async fn drain(&self) {
        let mut rx = self.rx.lock().await;
        let mut pending = self.pending.lock().await;
        while let Ok((system_id, message)) = rx.try_recv() {
            debug!(provider = %system_id, feed = %message.kind(), "Feed message received");
            let entry = pending.entry(system_id).or_insert_with(|| Pending {
                delivery: Delivery::default(),
                changed: false,
            });
            message.apply_to(&mut entry.delivery);
            entry.changed = true;
        }
    }
}

#[async_trait]
impl SnapshotSource for ChannelSource {
    async fn poll(&self, provider: &FeedProvider) -> SyncResult<Option<Delivery>> {
        self.drain().await;
        let mut pending = self.pending.lock().await;
        Ok(match pending.get_mut(provider.system_id()) {
            Some(entry) if entry.changed => {
                entry.changed = false;
                Some(entry.delivery.clone())
            }
            _ => None,
        })
    }
}

// =============================================================================
// Spool Source (pull)
// =============================================================================

/// Pull-style source reading one file per feed kind per provider.
pub struct SpoolSource {
    root: PathBuf,
    adapter: Arc<dyn FeedAdapter>,
}

impl SpoolSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_adapter(root, Arc::new(CanonicalJsonAdapter))
    }

    pub fn with_adapter(root: impl Into<PathBuf>, adapter: Arc<dyn FeedAdapter>) -> Self {
        SpoolSource {
            root: root.into(),
            adapter,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of one feed file.
    pub fn feed_path(&self, system_id: &str, kind: FeedKind) -> PathBuf {
        self.root.join(system_id).join(format!("{}.json", kind.as_str()))
    }

    async fn read(&self, system_id: &str, kind: FeedKind) -> SyncResult<Option<FeedMessage>> {
        let path = self.feed_path(system_id, kind);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SyncError::SourceFailed(format!("{}: {}", path.display(), e)));
            }
        };
        self.adapter.parse(kind, &bytes).map(Some)
    }
}

#[async_trait]
impl SnapshotSource for SpoolSource {
    async fn poll(&self, provider: &FeedProvider) -> SyncResult<Option<Delivery>> {
        let system_id = provider.system_id();
        let mut delivery = Delivery::default();

        for kind in FeedKind::ALL {
            match self.read(system_id, kind).await {
                Ok(Some(message)) => message.apply_to(&mut delivery),
                Ok(None) => {}
                Err(e) => warn!(
                    provider = %system_id,
                    feed = %kind,
                    adapter = self.adapter.name(),
                    error = %e,
                    "Unreadable feed file; treating as absent"
                ),
            }
        }

        if delivery.is_empty() {
            debug!(provider = %system_id, dir = %self.root.join(system_id).display(), "No feed files");
            return Ok(None);
        }
        Ok(Some(delivery))
    }
}
