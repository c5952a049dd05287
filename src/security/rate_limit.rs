//! Fixed-window rate limiting middleware.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::error::GuardError;
use crate::observability::metrics;
use crate::security::identity::ClientContext;

/// Requests admitted per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub max_requests: u64,
    pub window: Duration,
}

impl Limit {
    pub fn new(max_requests: u64, window: Duration) -> Self {
        Self { max_requests, window }
    }
}

/// Default limit plus per-route overrides.
#[derive(Debug, Clone)]
pub struct RatePolicy {
    default: Limit,
    rules: HashMap<String, Limit>,
}

impl RatePolicy {
    pub fn new(default: Limit) -> Self {
        Self {
            default,
            rules: HashMap::new(),
        }
    }

    pub fn with_rule(mut self, path: impl AsRef<str>, limit: Limit) -> Self {
        self.rules.insert(normalize_path(path.as_ref()), limit);
        self
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        let default = Limit::new(config.max_requests, Duration::from_millis(config.window_ms));
        config.rules.iter().fold(Self::new(default), |policy, rule| {
            policy.with_rule(
                rule.path.clone(),
                Limit::new(rule.max_requests, Duration::from_millis(rule.window_ms)),
            )
        })
    }

    pub fn limit_for(&self, route: &str) -> Limit {
        self.rules.get(route).copied().unwrap_or(self.default)
    }

    pub fn has_rule(&self, route: &str) -> bool {
        self.rules.contains_key(route)
    }
}

/// Canonical form of a request path for rate limit keys.
///
/// Empty and `.` segments are dropped, `..` pops a segment and a trailing
/// slash is removed, so spellings an upstream would treat as one route share
/// one window.
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Metric label for a limited request.
///
/// Router patterns and configured rules form a bounded set; any other
/// client-chosen path collapses into `"fallback"`.
fn route_label<'a>(matched: bool, route: &'a str, has_rule: bool) -> &'a str {
    if matched || has_rule {
        route
    } else {
        "fallback"
    }
}

/// Counter state for one `client:route` key.
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    reset_at: Instant,
}

impl Window {
    fn empty(now: Instant, window: Duration) -> Self {
        Self {
            count: 0,
            reset_at: now + window,
        }
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admitted {
        limit: u64,
        remaining: u64,
        reset_after: Duration,
    },
    Limited {
        limit: u64,
        retry_after_secs: u64,
    },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted { .. })
    }
}

/// Whole seconds until `remaining` elapses, rounded up, at least one.
fn ceil_secs(remaining: Duration) -> u64 {
    (remaining.as_millis() as u64).div_ceil(1000).max(1)
}

/// Fixed-window limiter keyed by `client_id:route`.
///
/// Each check updates its window under the DashMap entry lock, so concurrent
/// requests for the same key cannot both slip past the threshold.
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    policy: ArcSwap<RatePolicy>,
}

impl RateLimiter {
    pub fn new(policy: RatePolicy) -> Self {
        Self {
            windows: DashMap::new(),
            policy: ArcSwap::from_pointee(policy),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(RatePolicy::from_config(config))
    }

    /// Swap in new limits. Existing windows keep their reset time.
    pub fn update_policy(&self, policy: RatePolicy) {
        self.policy.store(Arc::new(policy));
    }

    pub fn check(&self, client_id: &str, route: &str) -> Decision {
        self.check_at(client_id, route, Instant::now())
    }

    pub fn check_at(&self, client_id: &str, route: &str, now: Instant) -> Decision {
        let limit = self.policy.load().limit_for(route);
        let key = format!("{}:{}", client_id, route);

        let mut entry = self
            .windows
            .entry(key)
            .or_insert_with(|| Window::empty(now, limit.window));
        let window = entry.value_mut();
        if now > window.reset_at {
            *window = Window::empty(now, limit.window);
        }

        window.count = window.count.saturating_add(1);
        let reset_after = window.reset_at.saturating_duration_since(now);
        if window.count > limit.max_requests {
            Decision::Limited {
                limit: limit.max_requests,
                retry_after_secs: ceil_secs(reset_after),
            }
        } else {
            Decision::Admitted {
                limit: limit.max_requests,
                remaining: limit.max_requests.saturating_sub(window.count),
                reset_after,
            }
        }
    }

    /// Whether `route` has its own limit rather than the default.
    pub fn has_rule(&self, route: &str) -> bool {
        self.policy.load().has_rule(route)
    }

    /// Remove windows whose reset time has passed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        // retain locks one shard at a time
        self.windows.retain(|_, window| now <= window.reset_at);
        let remaining = self.windows.len();
        metrics::record_window_count(remaining);
        before.saturating_sub(remaining)
    }

    /// Number of tracked windows.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Drop all windows (test reset, shutdown).
    pub fn clear(&self) {
        self.windows.clear();
    }

    /// Sweep on a fixed interval until shutdown.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = limiter.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, active = limiter.len(), "Swept expired rate limit windows");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Rate limit sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}

/// Middleware function for fixed-window rate limiting.
///
/// Expects `ClientContext` from the identity middleware; falls back to a
/// shared "unknown" client.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client_id = request
        .extensions()
        .get::<ClientContext>()
        .map(|ctx| ctx.client_id.clone())
        .unwrap_or_else(|| "unknown".to_string());
    let matched = request.extensions().get::<MatchedPath>().map(|p| p.as_str().to_string());
    let is_matched = matched.is_some();
    // unmatched (proxied) paths are client-written; normalise before keying
    let route = matched.unwrap_or_else(|| normalize_path(request.uri().path()));

    match limiter.check(&client_id, &route) {
        Decision::Admitted {
            limit,
            remaining,
            reset_after,
        } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            headers.insert("x-ratelimit-reset", HeaderValue::from(ceil_secs(reset_after)));
            response
        }
        Decision::Limited { retry_after_secs, .. } => {
            tracing::warn!(client = %client_id, route = %route, retry_after_secs, "Rate limit exceeded");
            metrics::record_rate_limited(route_label(is_matched, &route, limiter.has_rule(&route)));
            GuardError::RateLimited { retry_after_secs }.into_response()
        }
    }
}
