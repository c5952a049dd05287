//! Attaches the caller's `ClientContext` to the request.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::security::identity::IdentityResolver;

pub async fn identity_middleware(
    State(resolver): State<Arc<IdentityResolver>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let ctx = resolver.context(&request);
    tracing::trace!(session_key = %ctx.session_key, client = %ctx.client_id, "Resolved client identity");
    request.extensions_mut().insert(ctx);
    next.run(request).await
}
