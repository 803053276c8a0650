use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::StoreResult;
use crate::lock::{owner_token, DistributedLock, ACQUIRE_RETRY_INTERVAL};

struct Lease {
    owner: String,
    expires_at: Instant,
}

/// Shared lock table standing in for the cluster-wide lock service.
///
/// Every simulated node gets its own [`MemoryLock`] handle via
/// [`MemoryLockRegistry::handle`].
#[derive(Clone, Default)]
pub struct MemoryLockRegistry {
    leases: Arc<Mutex<HashMap<String, Lease>>>,
}

impl MemoryLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self, node_id: &str) -> MemoryLock {
        MemoryLock {
            registry: self.clone(),
            owner: owner_token(node_id),
        }
    }

    /// Current holder of `key`, if its lease is still running.
    pub async fn holder(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.leases
            .lock()
            .await
            .get(key)
            .filter(|l| l.expires_at > now)
            .map(|l| l.owner.clone())
    }
}

/// One node's handle on a [`MemoryLockRegistry`].
#[derive(Clone)]
pub struct MemoryLock {
    registry: MemoryLockRegistry,
    owner: String,
}

impl MemoryLock {
    async fn attempt(&self, key: &str, lease: Duration) -> bool {
        let now = Instant::now();
        let mut leases = self.registry.leases.lock().await;
        match leases.get_mut(key) {
            Some(current) if current.expires_at > now && current.owner != self.owner => false,
            Some(current) => {
                current.owner = self.owner.clone();
                current.expires_at = now + lease;
                true
            }
            None => {
                leases.insert(
                    key.to_string(),
                    Lease {
                        owner: self.owner.clone(),
                        expires_at: now + lease,
                    },
                );
                true
            }
        }
    }
}

#[async_trait]
impl DistributedLock for MemoryLock {
    fn owner(&self) -> &str {
        &self.owner
    }

    async fn try_acquire(&self, key: &str, wait: Duration, lease: Duration) -> StoreResult<bool> {
        let deadline = Instant::now() + wait;
        loop {
            if self.attempt(key, lease).await {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(ACQUIRE_RETRY_INTERVAL.min(wait)).await;
        }
    }

    async fn renew(&self, key: &str, lease: Duration) -> StoreResult<bool> {
        Ok(self.attempt(key, lease).await)
    }

    async fn release(&self, key: &str) -> StoreResult<bool> {
        let mut leases = self.registry.leases.lock().await;
        if leases.get(key).is_some_and(|l| l.owner == self.owner) {
            leases.remove(key);
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEASE: Duration = Duration::from_secs(60);
    const WAIT: Duration = Duration::from_secs(1);

    #[tokio::test(start_paused = true)]
    async fn test_exclusive_until_lease_expires() {
        let registry = MemoryLockRegistry::new();
        let a = registry.handle("node-a");
        let b = registry.handle("node-b");

        assert!(a.try_acquire("leader", WAIT, LEASE).await.unwrap());
        assert!(!b.try_acquire("leader", WAIT, LEASE).await.unwrap());

        // The failed attempt above waited one second already.
        tokio::time::advance(Duration::from_secs(58)).await;
        assert!(!b.try_acquire("leader", Duration::ZERO, LEASE).await.unwrap());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(b.try_acquire("leader", Duration::ZERO, LEASE).await.unwrap());
        assert_eq!(registry.holder("leader").await.as_deref(), Some(b.owner()));
        assert!(!a.renew("leader", LEASE).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_renew_extends_and_release_frees() {
        let registry = MemoryLockRegistry::new();
        let a = registry.handle("node-a");
        let b = registry.handle("node-b");

        assert!(a.try_acquire("leader", WAIT, LEASE).await.unwrap());
        tokio::time::advance(Duration::from_secs(50)).await;
        assert!(a.renew("leader", LEASE).await.unwrap());
        tokio::time::advance(Duration::from_secs(50)).await;
        assert!(!b.try_acquire("leader", Duration::ZERO, LEASE).await.unwrap());

        assert!(!b.release("leader").await.unwrap());
        assert!(a.release("leader").await.unwrap());
        assert!(b.try_acquire("leader", Duration::ZERO, LEASE).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_renew_retakes_lapsed_free_lease() {
        let registry = MemoryLockRegistry::new();
        let a = registry.handle("node-a");
        let b = registry.handle("node-b");

        assert!(a.try_acquire("leader", WAIT, LEASE).await.unwrap());
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(registry.holder("leader").await.is_none());

        assert!(a.renew("leader", LEASE).await.unwrap());
        assert_eq!(registry.holder("leader").await.as_deref(), Some(a.owner()));
        assert!(!b.renew("leader", LEASE).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reacquire_by_holder_succeeds() {
        let registry = MemoryLockRegistry::new();
        let a = registry.handle("node-a");
        assert!(a.try_acquire("leader", WAIT, LEASE).await.unwrap());
        assert!(a.try_acquire("leader", WAIT, LEASE).await.unwrap());
    }
}
