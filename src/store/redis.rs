//! Redis token store.
//!
//! Shares token records across guard instances. Requires the `redis` feature.
//! Expiry is delegated to Redis (`SET ... EX`).

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{StoreError, TokenStore};
use crate::security::codec::TokenDigest;
use crate::security::identity::SessionKey;

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Redis-backed store for multi-instance deployments.
pub struct RedisTokenStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisTokenStore {
    /// Connect to `url` (e.g. "redis://localhost:6379").
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, StoreError> {
        tracing::debug!(prefix = %prefix, "Connecting to Redis token store");

        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self {
            conn,
            prefix: prefix.to_string(),
        })
    }

    fn key(&self, key: &SessionKey) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn get(&self, key: &SessionKey) -> Result<Option<TokenDigest>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(self.key(key)).await?;
        match value {
            None => Ok(None),
            Some(bytes) => TokenDigest::from_slice(&bytes)
                .map(Some)
                .ok_or_else(|| StoreError::Backend(format!("corrupt digest of {} bytes", bytes.len()))),
        }
    }

    async fn set(&self, key: &SessionKey, digest: TokenDigest, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(self.key(key), digest.as_bytes().to_vec(), seconds)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.key(key)).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
