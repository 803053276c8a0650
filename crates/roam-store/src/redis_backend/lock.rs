use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use tokio::time::Instant;

use super::Keyspace;
use crate::error::StoreResult;
use crate::lock::{owner_token, DistributedLock, ACQUIRE_RETRY_INTERVAL};

/// Extends the lease only if the caller still owns the key.
const RENEW_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return 0
";

/// Deletes the key only if the caller still owns it.
const RELEASE_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
";

/// Lease lock on a single Redis key whose value is the owner token.
#[derive(Clone)]
pub struct RedisLock {
    conn: ConnectionManager,
    keys: Keyspace,
    owner: String,
}

impl RedisLock {
    pub(crate) fn new(conn: ConnectionManager, keys: Keyspace, node_id: &str) -> Self {
        RedisLock {
            conn,
            keys,
            owner: owner_token(node_id),
        }
    }

    async fn set_if_absent(&self, key: &str, lease: Duration) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(&self.owner)
            .arg("NX")
            .arg("PX")
            .arg(lease_millis(lease))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn compare_and(&self, script: &str, key: &str, extra: Option<u64>) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let script = Script::new(script);
        let mut invocation = script.key(key);
        invocation.arg(&self.owner);
        if let Some(extra) = extra {
            invocation.arg(extra);
        }
        let result: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(result == 1)
    }
}

fn lease_millis(lease: Duration) -> u64 {
    u64::try_from(lease.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl DistributedLock for RedisLock {
    fn owner(&self) -> &str {
        &self.owner
    }

    async fn try_acquire(&self, key: &str, wait: Duration, lease: Duration) -> StoreResult<bool> {
        let key = self.keys.lock(key);
        let deadline = Instant::now() + wait;
        loop {
            if self.set_if_absent(&key, lease).await?
                || self
                    .compare_and(RENEW_SCRIPT, &key, Some(lease_millis(lease)))
                    .await?
            {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(ACQUIRE_RETRY_INTERVAL.min(wait)).await;
        }
    }

    async fn renew(&self, key: &str, lease: Duration) -> StoreResult<bool> {
        let key = self.keys.lock(key);
        // A lapsed lease nobody else took is retaken.
        Ok(self
            .compare_and(RENEW_SCRIPT, &key, Some(lease_millis(lease)))
            .await?
            || self.set_if_absent(&key, lease).await?)
    }

    async fn release(&self, key: &str) -> StoreResult<bool> {
        let key = self.keys.lock(key);
        self.compare_and(RELEASE_SCRIPT, &key, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_millis() {
        assert_eq!(lease_millis(Duration::from_secs(60)), 60_000);
        assert_eq!(lease_millis(Duration::ZERO), 1);
    }
}
