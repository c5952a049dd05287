//! Session identity resolution.
//!
//! Maps a request to the key its CSRF token is bound to. Authenticated
//! principals get `user:<id>`; everyone else gets `anon:<sha256(ip|ua)>` so
//! pre-login forms can still obtain and submit a token.

use std::net::{IpAddr, SocketAddr};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderName, Request},
};
use sha2::{Digest, Sha256};

use crate::config::IdentityConfig;

/// Authenticated principal id, inserted as a request extension by the
/// authentication layer in front of the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal(pub String);

/// Who a request belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionIdentity {
    Authenticated { id: String },
    Anonymous { fingerprint: String },
}

/// Opaque key a CSRF token record is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl SessionIdentity {
    /// Pure derivation from the principal (if any) and the client fingerprint.
    pub fn resolve(principal: Option<&str>, remote_ip: &str, user_agent: &str) -> Self {
        match principal.filter(|id| !id.is_empty()) {
            Some(id) => SessionIdentity::Authenticated { id: id.to_string() },
            None => {
                let mut hasher = Sha256::new();
                hasher.update(remote_ip.as_bytes());
                hasher.update(b"|");
                hasher.update(user_agent.as_bytes());
                SessionIdentity::Anonymous {
                    fingerprint: hex::encode(hasher.finalize()),
                }
            }
        }
    }

    pub fn session_key(&self) -> SessionKey {
        match self {
            SessionIdentity::Authenticated { id } => SessionKey(format!("user:{}", id)),
            SessionIdentity::Anonymous { fingerprint } => SessionKey(format!("anon:{}", fingerprint)),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionIdentity::Authenticated { .. })
    }
}

/// Everything the guard layers need to know about the caller.
///
/// Inserted into request extensions by the identity middleware.
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub identity: SessionIdentity,
    pub session_key: SessionKey,
    /// Rate limit identity: the principal when known, the client IP otherwise.
    pub client_id: String,
}

/// Reads principal and fingerprint inputs off a request.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    principal_header: Option<HeaderName>,
    trust_forwarded_for: bool,
}

impl IdentityResolver {
    pub fn new(principal_header: Option<HeaderName>, trust_forwarded_for: bool) -> Self {
        Self {
            principal_header,
            trust_forwarded_for,
        }
    }

    pub fn from_config(config: &IdentityConfig) -> Self {
        let principal_header = config
            .principal_header
            .as_deref()
            .and_then(|h| HeaderName::from_bytes(h.as_bytes()).ok());
        Self::new(principal_header, config.trust_forwarded_for)
    }

    pub fn context(&self, request: &Request<Body>) -> ClientContext {
        let principal = self.principal(request);
        let remote_ip = self.remote_ip(request);
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        let identity = SessionIdentity::resolve(principal.as_deref(), &remote_ip, user_agent);
        let client_id = match &identity {
            SessionIdentity::Authenticated { id } => format!("user:{}", id),
            SessionIdentity::Anonymous { .. } => remote_ip,
        };

        ClientContext {
            session_key: identity.session_key(),
            identity,
            client_id,
        }
    }

    fn principal(&self, request: &Request<Body>) -> Option<String> {
        if let Some(Principal(id)) = request.extensions().get::<Principal>() {
            return Some(id.clone());
        }
        let header = self.principal_header.as_ref()?;
        request
            .headers()
            .get(header)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
    }

    fn remote_ip(&self, request: &Request<Body>) -> String {
        if self.trust_forwarded_for {
            let forwarded = request
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .and_then(|v| v.trim().parse::<IpAddr>().ok());
            if let Some(ip) = forwarded {
                return ip.to_string();
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}
