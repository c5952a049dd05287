//! Token store subsystem.
//!
//! # Data Flow
//! ```text
//! CsrfGuard::issue  → set(session_key, digest, ttl)
//! CsrfGuard::verify → get(session_key)
//! CsrfGuard::revoke → delete(session_key)
//! sweeper task      → purge_expired() every store.sweep_interval_secs
//! ```
//!
//! # Design Decisions
//! - Only digests are stored, never raw tokens
//! - Backend chosen once at startup by `build`
//! - `set` and `delete` are idempotent, `get` has no side effects, so an
//!   abandoned call never leaves a half-written record
//! - Timeouts are applied by the caller, not the backend

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{StoreBackend, StoreConfig};
use crate::security::codec::TokenDigest;
use crate::security::identity::SessionKey;

pub use memory::InMemoryTokenStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisTokenStore;

/// Failure talking to a token store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store backend {0:?} is not compiled into this build")]
    Unsupported(StoreBackend),

    #[error("store misconfigured: {0}")]
    Config(String),
}

/// Per-session storage of the current token digest.
///
/// Implementations must tolerate concurrent calls from many in-flight requests.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Digest stored for `key`, or `None` when absent or expired.
    async fn get(&self, key: &SessionKey) -> Result<Option<TokenDigest>, StoreError>;

    /// Insert or overwrite the digest for `key` with a fresh expiry.
    async fn set(&self, key: &SessionKey, digest: TokenDigest, ttl: Duration) -> Result<(), StoreError>;

    /// Remove the record for `key`. No error if absent.
    async fn delete(&self, key: &SessionKey) -> Result<(), StoreError>;

    /// Drop expired records, returning how many were removed.
    ///
    /// Backends with server-side expiry keep the default.
    async fn purge_expired(&self) -> usize {
        0
    }

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Construct the backend selected in configuration.
pub async fn build(config: &StoreConfig) -> Result<Arc<dyn TokenStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryTokenStore::new())),
        #[cfg(feature = "redis")]
        StoreBackend::Redis => {
            let url = config
                .url
                .as_deref()
                .ok_or_else(|| StoreError::Config("store.url is required for redis".into()))?;
            let store = RedisTokenStore::connect(url, &config.key_prefix).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis"))]
        StoreBackend::Redis => Err(StoreError::Unsupported(StoreBackend::Redis)),
    }
}

/// Periodically purge expired records until shutdown.
pub fn spawn_sweeper(
    store: Arc<dyn TokenStore>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = store.purge_expired().await;
                    if removed > 0 {
                        tracing::debug!(store = store.name(), removed, "Purged expired CSRF records");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!(store = store.name(), "Token store sweeper stopping");
                    break;
                }
            }
        }
    })
}
