//! Forwarding admitted requests to the protected upstream.
//!
//! # Responsibilities
//! - Rewrite the request URI to the upstream authority
//! - Strip hop-by-hop headers in both directions
//! - Append the caller to X-Forwarded-For
//!
//! # Design Decisions
//! - No retries: unsafe methods reach here and must not be replayed
//! - Without an upstream every unmatched request is a 404

use std::net::SocketAddr;
use std::str::FromStr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri, Version,
    },
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::UpstreamConfig;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Clone)]
pub struct ProxyState {
    upstream: Option<Authority>,
    client: Client<HttpConnector, Body>,
}

impl ProxyState {
    pub fn new(upstream: Option<&UpstreamConfig>) -> Self {
        let upstream = upstream.and_then(|u| match Authority::from_str(&u.address) {
            Ok(authority) => Some(authority),
            Err(e) => {
                tracing::error!(address = %u.address, error = %e, "Invalid upstream address, proxying disabled");
                None
            }
        });
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { upstream, client }
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, client: SocketAddr) {
    let ip = client.ip().to_string();
    let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{}, {}", existing, ip),
        None => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

pub async fn proxy_handler(State(state): State<ProxyState>, request: Request<Body>) -> Response {
    let Some(authority) = state.upstream.clone() else {
        return (StatusCode::NOT_FOUND, "No upstream configured").into_response();
    };

    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let (mut parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();

    strip_hop_by_hop(&mut parts.headers);
    if let Some(addr) = client {
        append_forwarded_for(&mut parts.headers, addr);
    }

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(authority);
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Could not build upstream URI");
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };
    parts.version = Version::HTTP_11;

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
