//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → identity.rs (principal or fingerprint → session key, client id)
//!     → rate_limit.rs (fixed window per client + route)
//!     → extract.rs (header → body → query candidate)
//!     → csrf.rs / double_submit.rs (issue on safe methods, verify otherwise)
//!     → Pass to application
//! Outgoing response:
//!     → headers.rs (hardening headers)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Fail closed: reject on any security check failure, including store errors
//! - No trust in client input; session keys never come from body or query

pub mod codec;
pub mod csrf;
pub mod double_submit;
pub mod extract;
pub mod headers;
pub mod identity;
pub mod rate_limit;

pub use codec::{Secret, TokenDigest};
pub use csrf::{CsrfGuard, IssuedToken};
pub use double_submit::DoubleSubmitGuard;
pub use headers::SecurityHeaderInjector;
pub use identity::{ClientContext, IdentityResolver, Principal, SessionIdentity, SessionKey};
pub use rate_limit::{Decision, Limit, RateLimiter, RatePolicy};
