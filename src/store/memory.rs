//! In-process token store.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{StoreError, TokenStore};
use crate::security::codec::TokenDigest;
use crate::security::identity::SessionKey;

#[derive(Debug, Clone, Copy)]
struct TokenRecord {
    digest: TokenDigest,
    expires_at: Instant,
}

impl TokenRecord {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// DashMap-backed store for single-instance deployments.
///
/// Records expire lazily on read and are dropped by `purge_expired`.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    records: DashMap<String, TokenRecord>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, live or not.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop everything (test reset, shutdown).
    pub fn clear(&self) {
        self.records.clear();
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get(&self, key: &SessionKey) -> Result<Option<TokenDigest>, StoreError> {
        let now = Instant::now();
        Ok(self
            .records
            .get(key.as_str())
            .filter(|r| r.is_live(now))
            .map(|r| r.digest))
    }

    async fn set(&self, key: &SessionKey, digest: TokenDigest, ttl: Duration) -> Result<(), StoreError> {
        let record = TokenRecord {
            digest,
            expires_at: Instant::now() + ttl,
        };
        self.records.insert(key.as_str().to_string(), record);
        Ok(())
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), StoreError> {
        self.records.remove(key.as_str());
        Ok(())
    }

    async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.records.len();
        // retain locks one shard at a time
        self.records.retain(|_, record| record.is_live(now));
        before.saturating_sub(self.records.len())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
