//! Locating the submitted CSRF token on a request.
//!
//! Priority is header, then body field, then query parameter. The body is only
//! buffered when the header is absent and the content type is a form or JSON.

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderName, Request, Uri},
};
use axum_extra::extract::cookie::CookieJar;

use crate::error::GuardError;

/// Where to look for a submitted token.
#[derive(Debug, Clone)]
pub struct TokenSources {
    pub header: HeaderName,
    pub field: String,
    pub allow_query: bool,
    pub max_body_size: usize,
}

enum BodyKind {
    Form,
    Json,
}

fn body_kind(headers: &HeaderMap) -> Option<BodyKind> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    if mime == "application/x-www-form-urlencoded" {
        Some(BodyKind::Form)
    } else if mime == "application/json" || mime.ends_with("+json") {
        Some(BodyKind::Json)
    } else {
        None
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn header_token(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| non_empty(v.to_string()))
}

pub fn query_token(uri: &Uri, field: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == field)
        .and_then(|(_, v)| non_empty(v.into_owned()))
}

fn body_token(kind: &BodyKind, bytes: &[u8], field: &str) -> Option<String> {
    match kind {
        BodyKind::Form => url::form_urlencoded::parse(bytes)
            .find(|(k, _)| k == field)
            .and_then(|(_, v)| non_empty(v.into_owned())),
        BodyKind::Json => {
            let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
            value
                .get(field)
                .and_then(|v| v.as_str())
                .and_then(|v| non_empty(v.to_string()))
        }
    }
}

/// Value of the named cookie, if sent.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(name)
        .and_then(|c| non_empty(c.value().to_string()))
}

/// Find the candidate token, returning the request rebuilt around any buffered body.
pub async fn candidate_token(
    request: Request<Body>,
    sources: &TokenSources,
) -> Result<(Request<Body>, Option<String>), GuardError> {
    if let Some(token) = header_token(request.headers(), &sources.header) {
        return Ok((request, Some(token)));
    }

    let (request, from_body) = match body_kind(request.headers()) {
        Some(kind) => {
            let (parts, body) = request.into_parts();
            let bytes = read_body(body, sources.max_body_size).await?;
            let token = body_token(&kind, &bytes, &sources.field);
            (Request::from_parts(parts, Body::from(bytes)), token)
        }
        None => (request, None),
    };
    if from_body.is_some() {
        return Ok((request, from_body));
    }

    let from_query = if sources.allow_query {
        query_token(request.uri(), &sources.field)
    } else {
        None
    };
    Ok((request, from_query))
}

async fn read_body(body: Body, limit: usize) -> Result<Bytes, GuardError> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        tracing::debug!(error = %e, limit, "Could not buffer request body for CSRF check");
        GuardError::PayloadTooLarge
    })
}
