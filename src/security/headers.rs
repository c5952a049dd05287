//! Security response headers.
//!
//! # Responsibilities
//! - Stamp deterministic hardening headers on every response
//! - Leave headers the application already set untouched
//!
//! # Design Decisions
//! - Built from tower-http `SetResponseHeaderLayer::if_not_present`
//! - No per-request state; purely a boundary collaborator of the guard

use axum::{
    http::{header, HeaderValue},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

/// Adds `X-Content-Type-Options`, `X-Frame-Options` and `Referrer-Policy`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityHeaderInjector;

impl SecurityHeaderInjector {
    pub fn apply(self, router: Router) -> Router {
        router
            .layer(SetResponseHeaderLayer::if_not_present(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("DENY"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::REFERRER_POLICY,
                HeaderValue::from_static("strict-origin-when-cross-origin"),
            ))
    }
}
