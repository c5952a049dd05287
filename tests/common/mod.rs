//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request, Response, StatusCode},
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tower::ServiceExt;

use request_guard::config::{GuardConfig, SecretString};
use request_guard::security::IssuedToken;
use request_guard::store::InMemoryTokenStore;
use request_guard::RequestGuard;

pub const SECRET: &str = "integration_test_secret_32_bytes!";
pub const CLIENT: &str = "203.0.113.7:51000";
pub const USER_AGENT: &str = "integration-test/1.0";

pub fn test_config() -> GuardConfig {
    let mut config = GuardConfig::default();
    config.csrf.secret = Some(SecretString::new(SECRET));
    config
}

/// A small application with a form page and two protected endpoints.
pub fn app_routes() -> Router {
    Router::new()
        .route(
            "/form",
            get(|Extension(token): Extension<IssuedToken>| async move {
                format!("<input type=\"hidden\" name=\"_csrf\" value=\"{}\">", token.as_str())
            }),
        )
        .route(
            "/api/trips",
            post(|body: String| async move { (StatusCode::CREATED, body) })
                .options(|| async { StatusCode::NO_CONTENT }),
        )
        .route("/api/login", post(|| async { Json(json!({"ok": true})) }))
        .route("/api/logout", post(|| async { StatusCode::NO_CONTENT }))
}

pub fn guarded_app(config: &GuardConfig) -> (Router, Arc<RequestGuard>) {
    let guard = Arc::new(RequestGuard::new(config, Arc::new(InMemoryTokenStore::new())));
    (guard.protect(app_routes()), guard)
}

/// Request from the default test client.
pub fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    request_from(method, uri, CLIENT)
}

pub fn request_from(method: Method, uri: &str, client: &str) -> axum::http::request::Builder {
    let addr: SocketAddr = client.parse().unwrap();
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::USER_AGENT, USER_AGENT)
        .extension(ConnectInfo(addr))
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Value of the named cookie from the response's Set-Cookie headers.
pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| {
            let pair = v.split(';').next()?;
            let (k, value) = pair.split_once('=')?;
            (k.trim() == name).then(|| value.trim().to_string())
        })
}

/// Fetch a token from the token endpoint as the default client.
pub async fn fetch_token(app: &Router) -> String {
    let response = send(app, request(Method::GET, "/api/csrf-token").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["csrfToken"].as_str().unwrap().to_string()
}

/// Start a backend that answers every request with a JSON echo of what it saw.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (read, mut write) = socket.into_split();
                let mut reader = BufReader::new(read);

                let mut request_line = String::new();
                if reader.read_line(&mut request_line).await.unwrap_or(0) == 0 {
                    return;
                }
                let mut headers = serde_json::Map::new();
                let mut content_length = 0usize;
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                        break;
                    }
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((k, v)) = line.split_once(':') {
                        let k = k.trim().to_ascii_lowercase();
                        if k == "content-length" {
                            content_length = v.trim().parse().unwrap_or(0);
                        }
                        headers.insert(k, Value::String(v.trim().to_string()));
                    }
                }
                let mut body = vec![0u8; content_length];
                let _ = reader.read_exact(&mut body).await;

                let mut parts = request_line.split_whitespace();
                let echo = json!({
                    "method": parts.next().unwrap_or_default(),
                    "path": parts.next().unwrap_or_default(),
                    "headers": headers,
                    "body": String::from_utf8_lossy(&body),
                })
                .to_string();
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    echo.len(),
                    echo
                );
                let _ = write.write_all(response.as_bytes()).await;
                let _ = write.shutdown().await;
            });
        }
    });

    addr
}
