//! Guard verdict errors and their HTTP rendering.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Why a request was denied before reaching downstream handlers.
#[derive(Debug, Clone, Error)]
pub enum GuardError {
    #[error("CSRF token missing")]
    CsrfMissing,

    #[error("CSRF token expired")]
    CsrfExpired,

    #[error("CSRF token invalid")]
    CsrfInvalid,

    #[error("CSRF token mismatch")]
    CsrfMismatch,

    #[error("Too many requests")]
    RateLimited { retry_after_secs: u64 },

    #[error("Token store unavailable")]
    StoreUnavailable(#[source] StoreError),

    #[error("Request body too large")]
    PayloadTooLarge,
}

impl GuardError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            GuardError::CsrfMissing => "CSRF_MISSING",
            GuardError::CsrfExpired => "CSRF_EXPIRED",
            GuardError::CsrfInvalid => "CSRF_INVALID",
            GuardError::CsrfMismatch => "CSRF_MISMATCH",
            GuardError::RateLimited { .. } => "RATE_LIMITED",
            GuardError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            GuardError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GuardError::CsrfMissing
            | GuardError::CsrfExpired
            | GuardError::CsrfInvalid
            | GuardError::CsrfMismatch => StatusCode::FORBIDDEN,
            GuardError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GuardError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GuardError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    fn message(&self) -> String {
        match self {
            GuardError::CsrfMissing => {
                "A CSRF token is required in the request header, body or query".to_string()
            }
            GuardError::CsrfExpired => {
                "No valid CSRF token for this session; fetch a new one".to_string()
            }
            GuardError::CsrfInvalid => "The submitted CSRF token does not match".to_string(),
            GuardError::CsrfMismatch => {
                "CSRF cookie and submitted token are missing or differ".to_string()
            }
            GuardError::RateLimited { retry_after_secs } => {
                format!("Rate limit exceeded, retry in {} seconds", retry_after_secs)
            }
            GuardError::StoreUnavailable(_) => {
                "CSRF verification is temporarily unavailable".to_string()
            }
            GuardError::PayloadTooLarge => {
                "Request body exceeds the size that can be checked for a CSRF token".to_string()
            }
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    message: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        let retry_after = match &self {
            GuardError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            message: self.message(),
            code: self.code(),
            retry_after,
        };

        let mut response = (self.status(), Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
