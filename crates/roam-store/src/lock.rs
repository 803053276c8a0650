//! # Distributed Lock
//!
//! Lease-based mutual exclusion. Each handle carries its own owner token,
//! so "held by me" is a property of the handle, not of the process.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  try_acquire(key, wait, lease)                                          │
//! │    free or expired      → take it, lease starts          → true         │
//! │    held by this handle  → extend lease                   → true         │
//! │    held by another      → retry until `wait` elapses     → false        │
//! │                                                                         │
//! │  renew(key, lease)      held by this handle → extend     → true         │
//! │                         free or expired     → take it    → true         │
//! │                         held by another                  → false        │
//! │                                                                         │
//! │  release(key)           held by this handle → delete     → true         │
//! │                                                                         │
//! │  A crashed holder never releases: the lease expires on its own.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Losing contention is reported as `Ok(false)`. `Err` means the backend
//! itself failed, and callers treat it like a lost lock.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Interval between acquisition attempts while waiting.
pub const ACQUIRE_RETRY_INTERVAL: Duration = Duration::from_millis(50);

#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Owner token of this handle.
    fn owner(&self) -> &str;

    async fn try_acquire(&self, key: &str, wait: Duration, lease: Duration) -> StoreResult<bool>;

    async fn renew(&self, key: &str, lease: Duration) -> StoreResult<bool>;

    async fn release(&self, key: &str) -> StoreResult<bool>;
}

/// Builds a unique owner token for a node.
pub fn owner_token(node_id: &str) -> String {
    format!("{}:{}", node_id, uuid::Uuid::new_v4())
}
