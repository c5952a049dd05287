//! Request guard: CSRF protection and fixed-window rate limiting for axum.
//!
//! Embed it with [`RequestGuard::protect`] or run the `request-guard` binary
//! as a sidecar in front of an upstream service.

pub mod config;
pub mod error;
pub mod guard;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod store;

pub use config::schema::GuardConfig;
pub use error::GuardError;
pub use guard::RequestGuard;
pub use http::GuardServer;
pub use lifecycle::Shutdown;
pub use security::{ClientContext, IssuedToken, Principal};
