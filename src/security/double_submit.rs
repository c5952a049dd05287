//! Stateless double-submit cookie protection.
//!
//! Safe requests get a fresh random token in a client-readable cookie and
//! nothing is stored server-side. Unsafe requests must echo the cookie value
//! in the header or body field. This only holds as long as other origins
//! cannot read or write the cookie, so it is weaker than the session-bound
//! guard and is meant for replicated instances without a shared store.

use crate::error::GuardError;
use crate::observability::metrics;
use crate::security::codec;
use crate::security::csrf::IssuedToken;

#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleSubmitGuard;

impl DoubleSubmitGuard {
    pub fn new() -> Self {
        Self
    }

    pub fn issue(&self) -> IssuedToken {
        metrics::record_csrf_issued("double_submit");
        IssuedToken(codec::generate_token())
    }

    /// Both values must be present, non-empty and equal.
    pub fn verify(&self, cookie: Option<&str>, submitted: Option<&str>) -> Result<(), GuardError> {
        match (cookie, submitted) {
            (Some(cookie), Some(submitted))
                if !cookie.is_empty() && codec::values_match(cookie, submitted) =>
            {
                Ok(())
            }
            _ => Err(GuardError::CsrfMismatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_pair_passes() {
        let guard = DoubleSubmitGuard::new();
        let token = guard.issue();
        assert!(guard.verify(Some(token.as_str()), Some(token.as_str())).is_ok());
    }

    #[test]
    fn test_cookie_only_rejected() {
        let guard = DoubleSubmitGuard::new();
        let token = guard.issue();
        assert!(matches!(
            guard.verify(Some(token.as_str()), None),
            Err(GuardError::CsrfMismatch)
        ));
    }

    #[test]
    fn test_header_only_rejected() {
        let guard = DoubleSubmitGuard::new();
        let token = guard.issue();
        assert!(matches!(
            guard.verify(None, Some(token.as_str())),
            Err(GuardError::CsrfMismatch)
        ));
    }

    #[test]
    fn test_mismatch_rejected() {
        let guard = DoubleSubmitGuard::new();
        let a = guard.issue();
        let b = guard.issue();
        assert!(matches!(
            guard.verify(Some(a.as_str()), Some(b.as_str())),
            Err(GuardError::CsrfMismatch)
        ));
    }

    #[test]
    fn test_empty_pair_rejected() {
        let guard = DoubleSubmitGuard::new();
        assert!(guard.verify(Some(""), Some("")).is_err());
    }
}
