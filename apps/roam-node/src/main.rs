//! # Roam Node
//!
//! One member of the availability cluster.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Roam Node                                        │
//! │                                                                         │
//! │  config ──► backends ──► SyncAgent ──► (leader) Scheduler ──► Stores   │
//! │                                         sync cycles + orphan repair     │
//! │                                                                         │
//! │  Ctrl+C / SIGTERM ──► stop scheduler ──► release lock ──► exit         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod backends;

use std::path::PathBuf;
use std::sync::Arc;

use roam_sync::{RoamConfig, SpoolSource, SyncAgent};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::backends::Backends;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting roam node...");

    // Load configuration
    let config = Arc::new(RoamConfig::load(std::env::var_os("ROAM_CONFIG").map(PathBuf::from))?);
    info!(
        node_id = %config.node_id(),
        backend = %config.storage.backend,
        providers = config.providers.len(),
        spool_dir = %config.source.spool_dir.display(),
        "Configuration loaded"
    );
    if config.providers.is_empty() {
        warn!("No providers configured; this node will only hold leadership");
    }

    let backends = Backends::build(&config).await?;

    let source = Arc::new(SpoolSource::new(config.source.spool_dir.clone()));
    let agent = SyncAgent::new(config.clone(), &backends.stores, backends.lock.clone(), source).start();

    shutdown_signal().await;

    agent.shutdown().await?;

    info!("Node shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
