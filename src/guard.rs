//! Request guard assembly.
//!
//! # Responsibilities
//! - Build the identity, rate limit and CSRF components from a `GuardConfig`
//! - Wrap an application `Router` with the middleware stack and token endpoint
//! - Run background sweepers for the limiter and token store
//! - Apply hot-reloaded configuration (secret rotation, limit changes)
//!
//! # Layer order
//! ```text
//! request → identity → rate limit → CSRF → handler
//! ```
//! Rate limiting runs before CSRF so that token guessing counts against the
//! caller's budget.

use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    http::{HeaderName, Method},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{CsrfConfig, CsrfStrategy, GuardConfig, SecretString};
use crate::error::GuardError;
use crate::http::middleware::{
    csrf_middleware, identity_middleware, CookieSettings, CsrfState, Protection,
};
use crate::http::token::{issue_token, TokenEndpoint};
use crate::security::codec::Secret;
use crate::security::csrf::CsrfGuard;
use crate::security::double_submit::DoubleSubmitGuard;
use crate::security::extract::TokenSources;
use crate::security::identity::{IdentityResolver, SessionKey};
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter, RatePolicy};
use crate::store::{self, StoreError, TokenStore};

/// CSRF protection and rate limiting for an axum application.
pub struct RequestGuard {
    identity: Arc<IdentityResolver>,
    limiter: Arc<RateLimiter>,
    rate_limit_enabled: bool,
    csrf: Arc<CsrfState>,
    token_endpoint: Arc<TokenEndpoint>,
    token_path: String,
    store: Arc<dyn TokenStore>,
    limiter_sweep: Duration,
    store_sweep: Duration,
    secret: Mutex<Option<SecretString>>,
}

impl RequestGuard {
    /// Build the store named in the config, then the guard around it.
    pub async fn from_config(config: &GuardConfig) -> Result<Self, StoreError> {
        let store = store::build(&config.store).await?;
        Ok(Self::new(config, store))
    }

    /// Build a guard over an existing store. `config` is assumed validated.
    pub fn new(config: &GuardConfig, store: Arc<dyn TokenStore>) -> Self {
        let csrf_config = &config.csrf;
        let ttl = Duration::from_secs(csrf_config.ttl_secs);

        let protection = match csrf_config.strategy {
            CsrfStrategy::Session => Protection::Session(CsrfGuard::new(
                Arc::clone(&store),
                resolve_secret(csrf_config),
                ttl,
                Duration::from_millis(config.store.timeout_ms),
            )),
            CsrfStrategy::DoubleSubmit => {
                tracing::warn!(
                    "Double-submit CSRF strategy selected; tokens are not bound to a session"
                );
                Protection::DoubleSubmit(DoubleSubmitGuard::new())
            }
        };

        let sources = TokenSources {
            header: HeaderName::from_str(&csrf_config.header_name)
                .unwrap_or_else(|_| HeaderName::from_static("x-csrf-token")),
            field: csrf_config.field_name.clone(),
            // double submit never reads the query string
            allow_query: csrf_config.allow_query_token
                && csrf_config.strategy == CsrfStrategy::Session,
            max_body_size: config.security.max_body_size,
        };

        let safe_methods = csrf_config
            .ignore_methods
            .iter()
            .filter_map(|m| Method::from_str(&m.to_ascii_uppercase()).ok())
            .collect();

        let csrf = CsrfState {
            protection,
            safe_methods,
            sources,
            cookie: CookieSettings::from_config(&csrf_config.cookie_name, &csrf_config.cookie, ttl),
        };

        tracing::info!(
            strategy = csrf_config.strategy.as_str(),
            store = store.name(),
            ttl_secs = csrf_config.ttl_secs,
            rate_limit = config.rate_limit.enabled,
            "Request guard configured"
        );

        Self {
            identity: Arc::new(IdentityResolver::from_config(&config.identity)),
            limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
            rate_limit_enabled: config.rate_limit.enabled,
            csrf: Arc::new(csrf),
            token_endpoint: Arc::new(TokenEndpoint {
                cookie_name: csrf_config.cookie_name.clone(),
                header_name: csrf_config.header_name.clone(),
            }),
            token_path: csrf_config.token_endpoint.clone(),
            store,
            limiter_sweep: Duration::from_secs(config.rate_limit.sweep_interval_secs),
            store_sweep: Duration::from_secs(config.store.sweep_interval_secs),
            secret: Mutex::new(csrf_config.secret.clone()),
        }
    }

    /// Add the token endpoint and wrap `router` in the guard middleware.
    pub fn protect(&self, router: Router) -> Router {
        let mut router = router
            .route(
                &self.token_path,
                get(issue_token).with_state(Arc::clone(&self.token_endpoint)),
            )
            .layer(from_fn_with_state(Arc::clone(&self.csrf), csrf_middleware));

        if self.rate_limit_enabled {
            router = router.layer(from_fn_with_state(
                Arc::clone(&self.limiter),
                rate_limit_middleware,
            ));
        }

        router.layer(from_fn_with_state(Arc::clone(&self.identity), identity_middleware))
    }

    /// The session-bound guard, when that strategy is active.
    pub fn csrf_guard(&self) -> Option<&CsrfGuard> {
        match &self.csrf.protection {
            Protection::Session(guard) => Some(guard),
            Protection::DoubleSubmit(_) => None,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Drop the stored token for a session, e.g. on logout.
    pub async fn revoke(&self, key: &SessionKey) -> Result<(), GuardError> {
        match self.csrf_guard() {
            Some(guard) => guard.revoke(key).await,
            None => Ok(()),
        }
    }

    /// Start the limiter and store sweepers; both stop on `shutdown`.
    pub fn spawn_sweepers(&self, shutdown: &broadcast::Receiver<()>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(2);
        if self.rate_limit_enabled {
            handles.push(self.limiter.spawn_sweeper(self.limiter_sweep, shutdown.resubscribe()));
        }
        if self.csrf_guard().is_some() {
            handles.push(store::spawn_sweeper(
                Arc::clone(&self.store),
                self.store_sweep,
                shutdown.resubscribe(),
            ));
        }
        handles
    }

    /// Release in-memory limiter state on shutdown.
    pub fn clear(&self) {
        self.limiter.clear();
    }

    /// Apply a reloaded config.
    ///
    /// Only the secret and rate limits change at runtime; everything else
    /// needs a restart.
    pub fn apply_update(&self, config: &GuardConfig) {
        self.limiter.update_policy(RatePolicy::from_config(&config.rate_limit));
        tracing::info!(
            window_ms = config.rate_limit.window_ms,
            max_requests = config.rate_limit.max_requests,
            rules = config.rate_limit.rules.len(),
            "Rate limit policy updated; other sections apply after a restart"
        );

        let Some(guard) = self.csrf_guard() else {
            return;
        };
        let mut current = match self.secret.lock() {
            Ok(current) => current,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *current == config.csrf.secret {
            return;
        }
        match &config.csrf.secret {
            Some(secret) if !secret.is_empty() => {
                guard.rotate_secret(Secret::new(secret.expose().as_bytes().to_vec()));
                *current = config.csrf.secret.clone();
            }
            _ => {
                tracing::warn!("CSRF secret removed from config; keeping the current secret");
            }
        }
    }
}

fn resolve_secret(config: &CsrfConfig) -> Secret {
    match &config.secret {
        Some(secret) if !secret.is_empty() => Secret::new(secret.expose().as_bytes().to_vec()),
        _ => {
            tracing::warn!(
                "No CSRF secret configured; using a random one. Tokens will not survive a restart \
                 or verify across instances"
            );
            Secret::generate()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CsrfStrategy, RateLimitRule};
    use crate::store::InMemoryTokenStore;

    fn config() -> GuardConfig {
        let mut config = GuardConfig::default();
        config.csrf.secret = Some(SecretString::new("a".repeat(32)));
        config
    }

    fn guard(config: &GuardConfig) -> RequestGuard {
        RequestGuard::new(config, Arc::new(InMemoryTokenStore::new()))
    }

    #[tokio::test]
    async fn test_session_strategy_exposes_guard() {
        let guard = guard(&config());
        assert!(guard.csrf_guard().is_some());
    }

    #[tokio::test]
    async fn test_double_submit_has_no_session_guard() {
        let mut config = config();
        config.csrf.strategy = CsrfStrategy::DoubleSubmit;
        let guard = guard(&config);

        assert!(guard.csrf_guard().is_none());
        assert!(!guard.csrf.sources.allow_query);
        guard.revoke(&SessionKey::from("user:1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_rotates_changed_secret() {
        let config = config();
        let guard = guard(&config);
        let key = SessionKey::from("user:1");
        let session = guard.csrf_guard().unwrap();
        let token = session.issue(&key).await.unwrap();

        // unchanged secret keeps tokens valid
        guard.apply_update(&config);
        session.verify(&key, Some(token.as_str())).await.unwrap();

        let mut rotated = config.clone();
        rotated.csrf.secret = Some(SecretString::new("b".repeat(32)));
        guard.apply_update(&rotated);
        assert!(matches!(
            session.verify(&key, Some(token.as_str())).await,
            Err(GuardError::CsrfInvalid)
        ));
    }

    #[tokio::test]
    async fn test_update_swaps_rate_limits() {
        let config = config();
        let guard = guard(&config);

        let mut updated = config.clone();
        updated.rate_limit.rules.push(RateLimitRule {
            path: "/api/login".into(),
            window_ms: 60_000,
            max_requests: 1,
        });
        guard.apply_update(&updated);

        assert!(guard.limiter().check("10.0.0.1", "/api/login").is_admitted());
        assert!(!guard.limiter().check("10.0.0.1", "/api/login").is_admitted());
    }

    #[tokio::test]
    async fn test_sweepers_stop_on_shutdown() {
        let guard = guard(&config());
        let (tx, rx) = broadcast::channel(1);
        let handles = guard.spawn_sweepers(&rx);
        assert_eq!(handles.len(), 2);

        tx.send(()).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
