//! Cache TTL for entities of one snapshot.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Remaining validity of a snapshot, never below `minimum`.
///
/// `max(last_updated + ttl - now, minimum)`, all in whole seconds.
pub fn cache_ttl(last_updated: i64, ttl: u64, minimum: Duration, now: DateTime<Utc>) -> Duration {
    let ttl = i64::try_from(ttl).unwrap_or(i64::MAX);
    let remaining = last_updated.saturating_add(ttl).saturating_sub(now.timestamp());
    let remaining = u64::try_from(remaining).unwrap_or(0);
    Duration::from_secs(remaining).max(minimum)
}
