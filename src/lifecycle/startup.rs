//! Startup orchestration.
//!
//! # Order
//! 1. Metrics exporter (if enabled)
//! 2. Token store and request guard
//! 3. Config watcher and signal handler
//! 4. Listener, last, so traffic only arrives once everything is ready
//!
//! Any failure here is fatal.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::{watcher::ConfigWatcher, ConfigError, GuardConfig};
use crate::guard::RequestGuard;
use crate::http::GuardServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("token store error: {0}")]
    Store(#[from] StoreError),

    #[error("config watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start every subsystem and serve until a termination signal.
pub async fn run(config: GuardConfig, config_path: Option<PathBuf>) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let guard = RequestGuard::from_config(&config).await?;

    // the watcher must stay alive for updates to keep flowing
    let (_watcher, config_updates) = match &config_path {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (Some(watcher.run()?), rx)
        }
        None => {
            let (_, rx) = mpsc::unbounded_channel();
            (None, rx)
        }
    };

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_handler(Arc::clone(&shutdown));

    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = GuardServer::new(config, guard);

    match tls {
        Some(tls) => server.run_tls(&tls, config_updates, server_shutdown).await?,
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            server.run(listener, config_updates, server_shutdown).await?
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
