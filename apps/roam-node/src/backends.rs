//! Storage and lock backends selected by `[storage] backend`.

use std::sync::Arc;

use roam_store::{DistributedLock, MemoryLockRegistry, RedisBackend, RedisConfig, Stores};
use roam_sync::{RoamConfig, StorageBackend};
use tracing::info;

/// Everything the agent and the orphan monitor share.
pub struct Backends {
    pub stores: Stores,
    pub lock: Arc<dyn DistributedLock>,
}

impl Backends {
    pub async fn build(config: &RoamConfig) -> anyhow::Result<Self> {
        match config.storage.backend {
            StorageBackend::Memory => {
                info!("Using in-memory stores; leadership is local to this process");
                Ok(Backends {
                    stores: Stores::in_memory(),
                    lock: Arc::new(MemoryLockRegistry::new().handle(config.node_id())),
                })
            }
            StorageBackend::Redis => {
                let redis = RedisBackend::connect(
                    RedisConfig::new(config.storage.redis_url.clone())
                        .key_prefix(config.storage.key_prefix.clone()),
                )
                .await?;
                redis.ping().await?;
                info!(prefix = %config.storage.key_prefix, "Connected to Redis");
                Ok(Backends {
                    stores: Stores::redis(&redis),
                    lock: Arc::new(redis.lock(config.node_id())),
                })
            }
        }
    }
}
