//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → middleware/identity.rs (client context)
//!     → rate limit (security::rate_limit)
//!     → middleware/csrf.rs (issue or verify)
//!     → token.rs (token endpoint) or proxy.rs (upstream)
//!     → Send to client
//! ```

pub mod middleware;
pub mod proxy;
pub mod server;
pub mod token;

pub use server::GuardServer;
pub use token::TokenResponse;
