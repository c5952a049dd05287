//! Token endpoint for single-page clients.
//!
//! The CSRF middleware has already issued a token by the time this handler
//! runs (GET is a safe method), so the handler only echoes it back as JSON.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::GuardError;
use crate::security::csrf::IssuedToken;
use crate::store::StoreError;

/// Names the client needs to submit the token back.
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    pub cookie_name: String,
    pub header_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub csrf_token: String,
    pub cookie_name: String,
    pub header_name: String,
}

pub async fn issue_token(
    State(endpoint): State<Arc<TokenEndpoint>>,
    request: Request<Body>,
) -> Response {
    let Some(token) = request.extensions().get::<IssuedToken>() else {
        // issue failed upstream in the middleware, already logged
        return GuardError::StoreUnavailable(StoreError::Backend(
            "token could not be issued".to_string(),
        ))
        .into_response();
    };

    let body = TokenResponse {
        csrf_token: token.as_str().to_string(),
        cookie_name: endpoint.cookie_name.clone(),
        header_name: endpoint.header_name.clone(),
    };

    let mut response = Json(body).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
