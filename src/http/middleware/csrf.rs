//! CSRF enforcement middleware.
//!
//! Safe methods pass through after a token is issued and set as a cookie.
//! Everything else must present a token accepted by the configured strategy.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::config::{CookieConfig, SameSitePolicy};
use crate::error::GuardError;
use crate::observability::metrics;
use crate::security::csrf::{CsrfGuard, IssuedToken};
use crate::security::double_submit::DoubleSubmitGuard;
use crate::security::extract::{self, TokenSources};
use crate::security::identity::{ClientContext, IdentityResolver};

/// The enforcement strategy selected at startup.
pub enum Protection {
    Session(CsrfGuard),
    DoubleSubmit(DoubleSubmitGuard),
}

/// Attributes of the cookie carrying the raw token.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSitePolicy,
    pub max_age: Duration,
}

impl CookieSettings {
    pub fn from_config(name: &str, config: &CookieConfig, max_age: Duration) -> Self {
        Self {
            name: name.to_string(),
            path: config.path.clone(),
            http_only: config.http_only,
            secure: config.secure,
            same_site: config.same_site,
            max_age,
        }
    }

    fn header_value(&self, token: &IssuedToken) -> Option<HeaderValue> {
        let same_site = match self.same_site {
            SameSitePolicy::Strict => SameSite::Strict,
            SameSitePolicy::Lax => SameSite::Lax,
            SameSitePolicy::None => SameSite::None,
        };
        let cookie = Cookie::build((self.name.clone(), token.as_str().to_string()))
            .path(self.path.clone())
            .http_only(self.http_only)
            .secure(self.secure)
            .same_site(same_site)
            .max_age(time::Duration::seconds(self.max_age.as_secs() as i64))
            .build();
        HeaderValue::from_str(&cookie.to_string()).ok()
    }
}

/// Middleware state shared by every request.
pub struct CsrfState {
    pub protection: Protection,
    pub safe_methods: Vec<Method>,
    pub sources: TokenSources,
    pub cookie: CookieSettings,
}

impl CsrfState {
    fn is_safe(&self, method: &Method) -> bool {
        self.safe_methods.contains(method)
    }

    fn strategy(&self) -> &'static str {
        match self.protection {
            Protection::Session(_) => "session",
            Protection::DoubleSubmit(_) => "double_submit",
        }
    }

    async fn issue(&self, ctx: &ClientContext) -> Option<IssuedToken> {
        match &self.protection {
            // a failed issue never blocks a safe request; the error is already logged
            Protection::Session(guard) => guard.issue(&ctx.session_key).await.ok(),
            Protection::DoubleSubmit(guard) => Some(guard.issue()),
        }
    }

    async fn verify(&self, request: Request<Body>, ctx: &ClientContext) -> Result<Request<Body>, GuardError> {
        match &self.protection {
            Protection::Session(guard) => {
                let (request, candidate) = extract::candidate_token(request, &self.sources).await?;
                guard.verify(&ctx.session_key, candidate.as_deref()).await?;
                Ok(request)
            }
            Protection::DoubleSubmit(guard) => {
                let cookie = extract::cookie_value(request.headers(), &self.cookie.name);
                let (request, candidate) = extract::candidate_token(request, &self.sources).await?;
                guard.verify(cookie.as_deref(), candidate.as_deref())?;
                Ok(request)
            }
        }
    }
}

pub async fn csrf_middleware(
    State(state): State<Arc<CsrfState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let ctx = match request.extensions().get::<ClientContext>() {
        Some(ctx) => ctx.clone(),
        None => IdentityResolver::default().context(&request),
    };

    if state.is_safe(request.method()) {
        let issued = state.issue(&ctx).await;
        if let Some(token) = &issued {
            request.extensions_mut().insert(token.clone());
        }

        let mut response = next.run(request).await;
        if let Some(value) = issued.as_ref().and_then(|t| state.cookie.header_value(t)) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        return response;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    match state.verify(request, &ctx).await {
        Ok(request) => next.run(request).await,
        Err(err) => {
            tracing::warn!(
                session_key = %ctx.session_key,
                method = %method,
                path = %path,
                strategy = state.strategy(),
                code = err.code(),
                "CSRF check failed"
            );
            metrics::record_csrf_rejected(err.code());
            err.into_response()
        }
    }
}
