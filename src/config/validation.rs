//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, secret length)
//! - Check that header names and methods parse
//! - Detect conflicting cookie attributes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::{HeaderName, Method};
use thiserror::Error;

use crate::config::schema::{GuardConfig, SameSitePolicy, StoreBackend};

/// Minimum HMAC key length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("csrf.secret must be at least {MIN_SECRET_LEN} bytes (got {0})")]
    SecretTooShort(usize),

    #[error("csrf.ttl_secs must be greater than zero")]
    ZeroTtl,

    #[error("{field} is not a valid header name: {value:?}")]
    InvalidHeaderName { field: &'static str, value: String },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be an absolute path: {value:?}")]
    InvalidPath { field: &'static str, value: String },

    #[error("csrf.ignore_methods contains an invalid method: {0:?}")]
    InvalidMethod(String),

    #[error("csrf.cookie.same_site = \"none\" requires csrf.cookie.secure = true")]
    InsecureSameSiteNone,

    #[error("{field} must be greater than zero")]
    ZeroLimit { field: String },

    #[error("store.url is required for the {0:?} backend")]
    MissingStoreUrl(StoreBackend),

    #[error("store.timeout_ms must be greater than zero")]
    ZeroStoreTimeout,

    #[error("{field} is not a valid address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if let Some(upstream) = &config.upstream {
        if upstream
            .address
            .parse::<axum::http::uri::Authority>()
            .is_err()
        {
            errors.push(ValidationError::InvalidAddress {
                field: "upstream.address",
                value: upstream.address.clone(),
            });
        }
    }

    let csrf = &config.csrf;
    if let Some(secret) = &csrf.secret {
        let len = secret.expose().len();
        if len < MIN_SECRET_LEN {
            errors.push(ValidationError::SecretTooShort(len));
        }
    }
    if csrf.ttl_secs == 0 {
        errors.push(ValidationError::ZeroTtl);
    }
    if HeaderName::from_bytes(csrf.header_name.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidHeaderName {
            field: "csrf.header_name",
            value: csrf.header_name.clone(),
        });
    }
    if csrf.cookie_name.is_empty() {
        errors.push(ValidationError::Empty { field: "csrf.cookie_name" });
    }
    if csrf.field_name.is_empty() {
        errors.push(ValidationError::Empty { field: "csrf.field_name" });
    }
    if !csrf.token_endpoint.starts_with('/') {
        errors.push(ValidationError::InvalidPath {
            field: "csrf.token_endpoint",
            value: csrf.token_endpoint.clone(),
        });
    }
    for method in &csrf.ignore_methods {
        if Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidMethod(method.clone()));
        }
    }
    if csrf.cookie.same_site == SameSitePolicy::None && !csrf.cookie.secure {
        errors.push(ValidationError::InsecureSameSiteNone);
    }

    if let Some(header) = &config.identity.principal_header {
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName {
                field: "identity.principal_header",
                value: header.clone(),
            });
        }
    }

    let limits = &config.rate_limit;
    if limits.window_ms == 0 {
        errors.push(ValidationError::ZeroLimit { field: "rate_limit.window_ms".into() });
    }
    if limits.max_requests == 0 {
        errors.push(ValidationError::ZeroLimit { field: "rate_limit.max_requests".into() });
    }
    if limits.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroLimit { field: "rate_limit.sweep_interval_secs".into() });
    }
    for rule in &limits.rules {
        if rule.window_ms == 0 {
            errors.push(ValidationError::ZeroLimit {
                field: format!("rate_limit.rules[{}].window_ms", rule.path),
            });
        }
        if rule.max_requests == 0 {
            errors.push(ValidationError::ZeroLimit {
                field: format!("rate_limit.rules[{}].max_requests", rule.path),
            });
        }
    }

    let store = &config.store;
    if store.backend != StoreBackend::Memory && store.url.as_deref().unwrap_or_default().is_empty() {
        errors.push(ValidationError::MissingStoreUrl(store.backend));
    }
    if store.timeout_ms == 0 {
        errors.push(ValidationError::ZeroStoreTimeout);
    }
    if store.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroLimit { field: "store.sweep_interval_secs".into() });
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
