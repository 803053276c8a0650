//! # Sync Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Snapshot     │  │       Storage           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Category       │  │  Store (cache/index/    │ │
//! │  │  ConfigLoad     │  │   (CoreError)   │  │         lock backend)   │ │
//! │  │  UnknownProvider│  │  SourceFailed   │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                    │
//! │  │    Internal     │   None of these is fatal to the process: a cycle  │
//! │  │  ShuttingDown   │   logs them and moves on to the next provider.    │
//! │  │  ChannelError   │                                                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use roam_core::CoreError;
use roam_store::StoreError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read or parse the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// A snapshot arrived for a system id that is not in the registry.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    // =========================================================================
    // Snapshot Errors
    // =========================================================================
    /// The category cannot be synchronized this cycle.
    #[error("Category skipped: {0}")]
    Category(#[from] CoreError),

    /// A snapshot source could not deliver.
    #[error("Snapshot source failed: {0}")]
    SourceFailed(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// Cache, index or lock backend failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Component is shutting down.
    #[error("Shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::SourceFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SourceFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if the next cycle may succeed without intervention.
    ///
    /// ## Retryable Errors
    /// - Store backend I/O failures
    /// - Missing companion feeds (the provider may publish them later)
    /// - Source read failures
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Store(e) => e.is_retryable(),
            SyncError::Category(_) | SyncError::SourceFailed(_) => true,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::UnknownProvider(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roam_core::FeedKind;

    #[test]
    fn test_categorization() {
        let skipped: SyncError = CoreError::MissingCompanionFeed(FeedKind::SystemInformation).into();
        assert!(skipped.is_retryable());
        assert!(!skipped.is_config_error());

        assert!(SyncError::InvalidConfig("lease too short".into()).is_config_error());
        assert!(!SyncError::ShuttingDown.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err: SyncError = CoreError::MissingFeed(FeedKind::StationStatus).into();
        assert!(err.to_string().contains("station_status"));
    }
}
