//! Guard middleware, outermost first: identity → rate limit → CSRF.

pub mod csrf;
pub mod identity;

pub use csrf::{csrf_middleware, CookieSettings, CsrfState, Protection};
pub use identity::identity_middleware;
