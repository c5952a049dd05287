//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the request guard.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Application the guard forwards admitted requests to.
    pub upstream: Option<UpstreamConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// CSRF protection settings.
    pub csrf: CsrfConfig,

    /// How requests are mapped to session keys.
    pub identity: IdentityConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Token store backend.
    pub store: StoreConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Upstream application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Which CSRF enforcement strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CsrfStrategy {
    /// Session-bound tokens verified against the token store.
    #[default]
    Session,
    /// Stateless cookie/header equality.
    DoubleSubmit,
}

impl CsrfStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CsrfStrategy::Session => "session",
            CsrfStrategy::DoubleSubmit => "double_submit",
        }
    }
}

/// HMAC secret as it appears in the config file.
///
/// Never printed by `Debug`.
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([redacted])")
    }
}

/// CSRF protection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Enforcement strategy.
    pub strategy: CsrfStrategy,

    /// HMAC key. Generated per process when absent.
    pub secret: Option<SecretString>,

    /// Token lifetime in seconds.
    pub ttl_secs: u64,

    /// Request header carrying the token.
    pub header_name: String,

    /// Cookie carrying the raw token.
    pub cookie_name: String,

    /// Form/JSON body field and query parameter carrying the token.
    pub field_name: String,

    /// Methods that issue tokens instead of verifying them.
    pub ignore_methods: Vec<String>,

    /// Accept the token from the query string as a last resort.
    pub allow_query_token: bool,

    /// Path of the token issuance endpoint.
    pub token_endpoint: String,

    /// Cookie attributes.
    pub cookie: CookieConfig,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            strategy: CsrfStrategy::Session,
            secret: None,
            ttl_secs: 3600,
            header_name: "x-csrf-token".to_string(),
            cookie_name: "_csrf".to_string(),
            field_name: "_csrf".to_string(),
            ignore_methods: vec!["GET".to_string(), "HEAD".to_string(), "OPTIONS".to_string()],
            allow_query_token: true,
            token_endpoint: "/api/csrf-token".to_string(),
            cookie: CookieConfig::default(),
        }
    }
}

/// SameSite cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    #[default]
    Strict,
    Lax,
    None,
}

/// CSRF cookie attributes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Hide the cookie from client script. Header submission then needs the token endpoint.
    pub http_only: bool,

    /// Only send over HTTPS.
    pub secure: bool,

    pub same_site: SameSitePolicy,

    pub path: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            http_only: false,
            secure: true,
            same_site: SameSitePolicy::Strict,
            path: "/".to_string(),
        }
    }
}

/// Session identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IdentityConfig {
    /// Header set by a trusted authenticating proxy carrying the principal id.
    pub principal_header: Option<String>,

    /// Take the client IP from the first `X-Forwarded-For` entry.
    pub trust_forwarded_for: bool,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Requests admitted per window.
    pub max_requests: u64,

    /// Interval of the expired-window sweep in seconds.
    pub sweep_interval_secs: u64,

    /// Per-path overrides.
    pub rules: Vec<RateLimitRule>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 60_000,
            max_requests: 100,
            sweep_interval_secs: 60,
            rules: Vec::new(),
        }
    }
}

/// Rate limit override for a single route path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimitRule {
    pub path: String,
    pub window_ms: u64,
    pub max_requests: u64,
}

/// Token store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

/// Token store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Connection URL for networked backends.
    pub url: Option<String>,

    /// Prefix for keys written to networked backends.
    pub key_prefix: String,

    /// Upper bound on a single store call in milliseconds.
    pub timeout_ms: u64,

    /// Interval of the expired-record sweep in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            url: None,
            key_prefix: "csrf".to_string(),
            timeout_ms: 250,
            sweep_interval_secs: 300,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes buffered while looking for a token.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
