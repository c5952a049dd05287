//! Session-bound CSRF protection.
//!
//! # States
//! - ISSUE: safe methods. A fresh token is generated, its digest stored under
//!   the session key, and the raw token handed back for the cookie.
//! - VERIFY: every other method. The candidate is checked against the stored
//!   digest.
//!
//! # Decision table (VERIFY)
//! ```text
//! no candidate               → CSRF_MISSING
//! no stored digest           → CSRF_EXPIRED
//! digest mismatch            → CSRF_INVALID
//! match                      → pass (stored digest kept for its full TTL)
//! store error / timeout      → STORE_UNAVAILABLE
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::error::GuardError;
use crate::observability::metrics;
use crate::security::codec::{self, Secret};
use crate::security::identity::SessionKey;
use crate::store::{StoreError, TokenStore};

/// Raw token issued on the current request.
///
/// Inserted into request extensions so handlers can render it into forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken(pub String);

impl IssuedToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Issues and verifies tokens bound to a session key.
pub struct CsrfGuard {
    store: Arc<dyn TokenStore>,
    secret: ArcSwap<Secret>,
    ttl: Duration,
    store_timeout: Duration,
}

impl CsrfGuard {
    pub fn new(store: Arc<dyn TokenStore>, secret: Secret, ttl: Duration, store_timeout: Duration) -> Self {
        Self {
            store,
            secret: ArcSwap::from_pointee(secret),
            ttl,
            store_timeout,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Generate, store and return a new token for `key`, replacing any previous one.
    pub async fn issue(&self, key: &SessionKey) -> Result<IssuedToken, GuardError> {
        let token = codec::generate_token();
        let digest = codec::hash_token(&token, &self.secret.load());

        self.bounded("set", self.store.set(key, digest, self.ttl)).await?;

        metrics::record_csrf_issued("session");
        tracing::trace!(session_key = %key, "Issued CSRF token");
        Ok(IssuedToken(token))
    }

    /// Check a submitted token for `key`.
    pub async fn verify(&self, key: &SessionKey, candidate: Option<&str>) -> Result<(), GuardError> {
        let candidate = candidate.ok_or(GuardError::CsrfMissing)?;

        let stored = self
            .bounded("get", self.store.get(key))
            .await?
            .ok_or(GuardError::CsrfExpired)?;

        if codec::verify_token(candidate, &stored, &self.secret.load()) {
            Ok(())
        } else {
            Err(GuardError::CsrfInvalid)
        }
    }

    /// Forget the token for `key` (logout).
    pub async fn revoke(&self, key: &SessionKey) -> Result<(), GuardError> {
        self.bounded("delete", self.store.delete(key)).await?;
        tracing::debug!(session_key = %key, "Revoked CSRF token");
        Ok(())
    }

    /// Replace the HMAC secret. Every outstanding token stops verifying.
    pub fn rotate_secret(&self, secret: Secret) {
        self.secret.store(Arc::new(secret));
        tracing::warn!("CSRF secret rotated, outstanding tokens invalidated");
    }

    /// Run a store call under the configured timeout, failing closed.
    async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, GuardError> {
        let result = match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.store_timeout)),
        };

        result.map_err(|err| {
            tracing::error!(store = self.store.name(), op, error = %err, "Token store call failed");
            metrics::record_store_error(op);
            GuardError::StoreUnavailable(err)
        })
    }
}
