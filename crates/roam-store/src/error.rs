//! # Store Error Types
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  redis::RedisError / serde_json::Error                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds context and categorization            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SyncError (roam-sync) ← Cycle aborted for one category, logged        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Storage backend errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not establish a backend connection.
    ///
    /// ## When This Occurs
    /// - Redis URL is malformed
    /// - Redis is unreachable and retries are exhausted
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A backend command failed.
    #[error("Redis command failed: {0}")]
    Redis(#[from] redis::RedisError),

    /// A value could not be encoded for storage.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be decoded.
    ///
    /// ## When This Occurs
    /// - Entity schema changed between deployments
    /// - Key written by an unrelated client
    #[error("Corrupt value at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl StoreError {
    /// Returns true if retrying the operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::ConnectionFailed(_) => true,
            StoreError::Redis(e) => e.is_io_error() || e.is_timeout() || e.is_connection_dropped(),
            StoreError::Serialization(_) | StoreError::Corrupt { .. } => false,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorization() {
        assert!(StoreError::ConnectionFailed("refused".into()).is_retryable());
        assert!(!StoreError::Corrupt {
            key: "k".into(),
            reason: "bad json".into()
        }
        .is_retryable());
    }
}
