//! # Node Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     ROAM_NODE_ID=node-a                                                │
//! │     ROAM_BACKEND=redis                                                 │
//! │     ROAM_REDIS_URL=redis://cache:6379                                  │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/roam/roam.toml (Linux)                                   │
//! │     ~/Library/Application Support/org.roam.roam/roam.toml (macOS)      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     in-memory backend, generated node id, no providers                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [node]
//! id = "node-a"
//!
//! [election]
//! lock_key = "leader"
//! tick_interval_secs = 30
//! lease_secs = 60          # must be at least 2 × tick_interval_secs
//!
//! [sync]
//! cycle_interval_secs = 30
//! minimum_ttl_secs = 300
//!
//! [storage]
//! backend = "redis"        # memory | redis
//! redis_url = "redis://127.0.0.1:6379"
//!
//! [source]
//! spool_dir = "/var/lib/roam/spool"
//!
//! [[providers]]
//! system_id = "voioslo"
//! codespace = "YVO"
//! operator_id = "YVO:Operator:voi"
//! language = "nb"
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use roam_core::{FeedProvider, DEFAULT_MINIMUM_TTL_SECS};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Node
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node identifier, part of the lock owner token and every log line.
    /// Auto-generated if not provided.
    #[serde(default = "default_node_id")]
    pub id: String,
}

fn default_node_id() -> String {
    Uuid::new_v4().to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            id: default_node_id(),
        }
    }
}

// =============================================================================
// Election
// =============================================================================

/// Leader election timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSettings {
    /// Name of the cluster-wide lock.
    #[serde(default = "default_lock_key")]
    pub lock_key: String,

    /// Heartbeat: how often leadership is acquired or renewed (seconds).
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Lease on the lock (seconds). A crashed leader blocks others this long.
    #[serde(default = "default_lease")]
    pub lease_secs: u64,

    /// How long one acquisition attempt waits for a busy lock (milliseconds).
    #[serde(default = "default_acquire_wait")]
    pub acquire_wait_ms: u64,
}

fn default_lock_key() -> String {
    "leader".to_string()
}

fn default_tick_interval() -> u64 {
    30
}

fn default_lease() -> u64 {
    60
}

fn default_acquire_wait() -> u64 {
    1000
}

impl Default for ElectionSettings {
    fn default() -> Self {
        ElectionSettings {
            lock_key: default_lock_key(),
            tick_interval_secs: default_tick_interval(),
            lease_secs: default_lease(),
            acquire_wait_ms: default_acquire_wait(),
        }
    }
}

impl ElectionSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }

    pub fn acquire_wait(&self) -> Duration {
        Duration::from_millis(self.acquire_wait_ms)
    }
}

// =============================================================================
// Sync
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Period of the synchronization loop while leader (seconds).
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,

    /// Floor of every cache entry's TTL (seconds).
    #[serde(default = "default_minimum_ttl")]
    pub minimum_ttl_secs: u64,

    /// Period of the leader's orphaned-index repair pass (seconds).
    #[serde(default = "default_orphan_check_interval")]
    pub orphan_check_interval_secs: u64,
}

fn default_cycle_interval() -> u64 {
    30
}

fn default_minimum_ttl() -> u64 {
    DEFAULT_MINIMUM_TTL_SECS
}

fn default_orphan_check_interval() -> u64 {
    300
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            cycle_interval_secs: default_cycle_interval(),
            minimum_ttl_secs: default_minimum_ttl(),
            orphan_check_interval_secs: default_orphan_check_interval(),
        }
    }
}

impl SyncSettings {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn minimum_ttl(&self) -> Duration {
        Duration::from_secs(self.minimum_ttl_secs)
    }

    pub fn orphan_check_interval(&self) -> Duration {
        Duration::from_secs(self.orphan_check_interval_secs)
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Which store implementation the node runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process-local stores and lock. Single node only.
    #[default]
    Memory,

    /// Shared Redis: cache, geo index and lock.
    Redis,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            "redis" => Ok(StorageBackend::Redis),
            other => Err(SyncError::InvalidConfig(format!(
                "Unknown storage backend: '{}'. Valid options: memory, redis",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Prefix of every Redis key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_key_prefix() -> String {
    "roam".to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            backend: StorageBackend::default(),
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

// =============================================================================
// Source
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Directory holding `<system_id>/<feed_kind>.json` snapshots.
    #[serde(default = "default_spool_dir")]
    pub spool_dir: PathBuf,
}

fn default_spool_dir() -> PathBuf {
    PathBuf::from("spool")
}

impl Default for SourceSettings {
    fn default() -> Self {
        SourceSettings {
            spool_dir: default_spool_dir(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoamConfig {
    #[serde(default)]
    pub node: NodeConfig,

    #[serde(default)]
    pub election: ElectionSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub source: SourceSettings,

    /// Provider registry.
    #[serde(default)]
    pub providers: Vec<FeedProvider>,
}

impl RoamConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (roam.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| SyncError::ConfigLoadFailed(format!("{}: {}", path.display(), e)))?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> SyncResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.node.id.is_empty() {
            return Err(SyncError::InvalidConfig("node.id must not be empty".into()));
        }

        if self.election.tick_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "election.tick_interval_secs must be greater than 0".into(),
            ));
        }

        // One missed renewal must not cost the lease.
        if self.election.lease_secs < self.election.tick_interval_secs.saturating_mul(2) {
            return Err(SyncError::InvalidConfig(format!(
                "election.lease_secs ({}) must be at least twice tick_interval_secs ({})",
                self.election.lease_secs, self.election.tick_interval_secs
            )));
        }

        if self.sync.cycle_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "sync.cycle_interval_secs must be greater than 0".into(),
            ));
        }

        if self.sync.orphan_check_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "sync.orphan_check_interval_secs must be greater than 0".into(),
            ));
        }

        if self.storage.backend == StorageBackend::Redis
            && !self.storage.redis_url.starts_with("redis://")
            && !self.storage.redis_url.starts_with("rediss://")
        {
            return Err(SyncError::InvalidConfig(format!(
                "storage.redis_url must start with redis:// or rediss://, got: {}",
                self.storage.redis_url
            )));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.system_id().is_empty() {
                return Err(SyncError::InvalidConfig("provider system_id must not be empty".into()));
            }
            if !seen.insert(provider.system_id()) {
                return Err(SyncError::InvalidConfig(format!(
                    "duplicate provider system_id: {}",
                    provider.system_id()
                )));
            }
        }

        Ok(())
    }

    /// Applies `ROAM_*` overrides read through `var`.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(id) = var("ROAM_NODE_ID") {
            debug!(node_id = %id, "Overriding node id from environment");
            self.node.id = id;
        }

        if let Some(backend) = var("ROAM_BACKEND") {
            match backend.parse() {
                Ok(parsed) => self.storage.backend = parsed,
                Err(_) => warn!(backend = %backend, "Unknown storage backend in environment"),
            }
        }

        if let Some(url) = var("ROAM_REDIS_URL") {
            debug!(url = %url, "Overriding Redis URL from environment");
            self.storage.redis_url = url;
        }

        if let Some(prefix) = var("ROAM_KEY_PREFIX") {
            self.storage.key_prefix = prefix;
        }

        if let Some(dir) = var("ROAM_SPOOL_DIR") {
            self.source.spool_dir = PathBuf::from(dir);
        }

        if let Some(secs) = var("ROAM_TICK_SECS").and_then(|v| v.parse().ok()) {
            self.election.tick_interval_secs = secs;
        }

        if let Some(secs) = var("ROAM_LEASE_SECS").and_then(|v| v.parse().ok()) {
            self.election.lease_secs = secs;
        }

        if let Some(secs) = var("ROAM_CYCLE_SECS").and_then(|v| v.parse().ok()) {
            self.sync.cycle_interval_secs = secs;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "roam", "roam")
            .map(|dirs| dirs.config_dir().join("roam.toml"))
    }

    pub fn node_id(&self) -> &str {
        &self.node.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = RoamConfig::default();
        assert!(!config.node.id.is_empty());
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.sync.minimum_ttl(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lease_must_cover_two_ticks() {
        let mut config = RoamConfig::default();
        config.election.tick_interval_secs = 30;
        config.election.lease_secs = 59;
        let err = config.validate().unwrap_err();
        assert!(err.is_config_error());

        config.election.lease_secs = 60;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_huge_tick_interval_is_rejected_without_overflow() {
        let mut config = RoamConfig::default();
        config.election.tick_interval_secs = u64::MAX;
        config.election.lease_secs = u64::MAX - 1;
        assert!(config.validate().unwrap_err().is_config_error());
    }

    #[test]
    fn test_parse_file_with_providers() {
        let config = RoamConfig::from_toml(
            r#"
            [node]
            id = "node-a"

            [storage]
            backend = "redis"
            redis_url = "redis://cache:6379"

            [[providers]]
            system_id = "voioslo"
            codespace = "YVO"
            operator_id = "YVO:Operator:voi"
            language = "nb"
            pricing_plans = ["YVO:PricingPlan:basic"]

            [[providers]]
            system_id = "bysykkel"
            codespace = "YOS"
            operator_id = "YOS:Operator:bysykkel"
            language = "nb"
            "#,
        )
        .unwrap();

        assert_eq!(config.node_id(), "node-a");
        assert_eq!(config.storage.backend, StorageBackend::Redis);
        assert_eq!(config.election.lease_secs, 60);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(
            config.providers[0].pricing_plan_override(),
            Some("YVO:PricingPlan:basic")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_providers_rejected() {
        let mut config = RoamConfig::default();
        let provider = FeedProvider::new(roam_core::ProviderNamespace::new("a", "A", "A:Operator:a", "en"));
        config.providers = vec![provider.clone(), provider];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("ROAM_NODE_ID", "node-b"),
            ("ROAM_BACKEND", "redis"),
            ("ROAM_REDIS_URL", "redis://other:6379"),
            ("ROAM_LEASE_SECS", "90"),
            ("ROAM_TICK_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = RoamConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.node_id(), "node-b");
        assert_eq!(config.storage.backend, StorageBackend::Redis);
        assert_eq!(config.storage.redis_url, "redis://other:6379");
        assert_eq!(config.election.lease_secs, 90);
        assert_eq!(config.election.tick_interval_secs, 30);
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("Redis".parse::<StorageBackend>().unwrap(), StorageBackend::Redis);
        assert!("postgres".parse::<StorageBackend>().is_err());
    }
}
