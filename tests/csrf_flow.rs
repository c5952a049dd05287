//! End-to-end CSRF behaviour through the guarded router.

mod common;

use axum::{
    body::Body,
    http::{header, Method, StatusCode},
};
use request_guard::config::{CsrfStrategy, SecretString};
use request_guard::security::{Principal, SessionKey};

use common::*;

#[tokio::test]
async fn test_token_endpoint_then_post_succeeds() {
    let (app, _) = guarded_app(&test_config());

    let response = send(&app, request(Method::GET, "/api/csrf-token").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    let cookie = set_cookie(&response, "_csrf").expect("token cookie");

    let json = body_json(response).await;
    let token = json["csrfToken"].as_str().unwrap();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(json["cookieName"], "_csrf");
    assert_eq!(json["headerName"], "x-csrf-token");
    assert_eq!(cookie, token);

    let response = send(
        &app,
        request(Method::POST, "/api/trips")
            .header("X-CSRF-Token", token)
            .body(Body::from("trip"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_text(response).await, "trip");
}

#[tokio::test]
async fn test_post_without_token_is_rejected() {
    let (app, _) = guarded_app(&test_config());
    fetch_token(&app).await;

    let response = send(&app, request(Method::POST, "/api/trips").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let json = body_json(response).await;
    assert_eq!(json["error"], "CSRF token missing");
    assert_eq!(json["code"], "CSRF_MISSING");
}

#[tokio::test]
async fn test_rotated_secret_invalidates_token() {
    let config = test_config();
    let (app, guard) = guarded_app(&config);
    let token = fetch_token(&app).await;

    let mut rotated = config.clone();
    rotated.csrf.secret = Some(SecretString::new("another_secret_that_is_32_bytes!!"));
    guard.apply_update(&rotated);

    let response = send(
        &app,
        request(Method::POST, "/api/trips")
            .header("x-csrf-token", token)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "CSRF_INVALID");
}

#[tokio::test]
async fn test_no_session_record_is_expired() {
    let (app, _) = guarded_app(&test_config());

    let response = send(
        &app,
        request(Method::POST, "/api/trips")
            .header("x-csrf-token", "a".repeat(64))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "CSRF_EXPIRED");
}

#[tokio::test]
async fn test_form_page_renders_token_and_form_post_passes() {
    let (app, _) = guarded_app(&test_config());

    let response = send(&app, request(Method::GET, "/form").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie(&response, "_csrf").unwrap();
    let html = body_text(response).await;
    assert!(html.contains(&cookie));

    let response = send(
        &app,
        request(Method::POST, "/api/trips")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("dest=paris&_csrf={}", cookie)))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    // the handler still sees the whole body
    assert_eq!(body_text(response).await, format!("dest=paris&_csrf={}", cookie));
}

#[tokio::test]
async fn test_json_body_and_query_token() {
    let (app, _) = guarded_app(&test_config());
    let token = fetch_token(&app).await;

    let response = send(
        &app,
        request(Method::POST, "/api/trips")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(format!(r#"{{"_csrf":"{}"}}"#, token)))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(
        &app,
        request(Method::POST, &format!("/api/trips?_csrf={}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_query_token_disabled() {
    let mut config = test_config();
    config.csrf.allow_query_token = false;
    let (app, _) = guarded_app(&config);
    let token = fetch_token(&app).await;

    let response = send(
        &app,
        request(Method::POST, &format!("/api/trips?_csrf={}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(body_json(response).await["code"], "CSRF_MISSING");
}

#[tokio::test]
async fn test_token_bound_to_anonymous_fingerprint() {
    let (app, _) = guarded_app(&test_config());
    let token = fetch_token(&app).await;

    // different IP, same user agent: a different anonymous session
    let response = send(
        &app,
        request_from(Method::POST, "/api/trips", "198.51.100.9:4000")
            .header("x-csrf-token", &token)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // different user agent from the same IP
    let response = send(
        &app,
        request(Method::POST, "/api/trips")
            .header(header::USER_AGENT, "other-agent")
            .header("x-csrf-token", &token)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_principal_header_binds_token_to_user() {
    let mut config = test_config();
    config.identity.principal_header = Some("x-user-id".into());
    let (app, _) = guarded_app(&config);

    let response = send(
        &app,
        request(Method::GET, "/api/csrf-token")
            .header("x-user-id", "alice")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    let token = body_json(response).await["csrfToken"].as_str().unwrap().to_string();

    // same user from another network still passes
    let response = send(
        &app,
        request_from(Method::POST, "/api/trips", "198.51.100.9:4000")
            .header("x-user-id", "alice")
            .header("x-csrf-token", &token)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(
        &app,
        request(Method::POST, "/api/trips")
            .header("x-user-id", "mallory")
            .header("x-csrf-token", &token)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_principal_extension_wins_over_header() {
    let mut config = test_config();
    config.identity.principal_header = Some("x-user-id".into());
    let (app, _) = guarded_app(&config);

    let response = send(
        &app,
        request(Method::GET, "/api/csrf-token")
            .extension(Principal("alice".into()))
            .header("x-user-id", "mallory")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    let token = body_json(response).await["csrfToken"].as_str().unwrap().to_string();

    let response = send(
        &app,
        request(Method::POST, "/api/trips")
            .header("x-user-id", "alice")
            .header("x-csrf-token", &token)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_revoke_on_logout() {
    let mut config = test_config();
    config.identity.principal_header = Some("x-user-id".into());
    let (app, guard) = guarded_app(&config);

    let response = send(
        &app,
        request(Method::GET, "/api/csrf-token")
            .header("x-user-id", "alice")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    let token = body_json(response).await["csrfToken"].as_str().unwrap().to_string();

    guard.revoke(&SessionKey::from("user:alice")).await.unwrap();

    let response = send(
        &app,
        request(Method::POST, "/api/trips")
            .header("x-user-id", "alice")
            .header("x-csrf-token", &token)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(body_json(response).await["code"], "CSRF_EXPIRED");
}

#[tokio::test]
async fn test_cookie_attributes() {
    let (app, _) = guarded_app(&test_config());
    let response = send(&app, request(Method::GET, "/form").body(Body::empty()).unwrap()).await;

    let raw = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(raw.starts_with("_csrf="));
    assert!(raw.contains("Secure"));
    assert!(raw.contains("SameSite=Strict"));
    assert!(raw.contains("Path=/"));
    assert!(raw.contains("Max-Age=3600"));
    assert!(!raw.contains("HttpOnly"));
}

#[tokio::test]
async fn test_head_and_options_are_safe() {
    let (app, _) = guarded_app(&test_config());
    let response = send(&app, request(Method::HEAD, "/form").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response, "_csrf").is_some());

    // a protected path, no token
    let response = send(&app, request(Method::OPTIONS, "/api/trips").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(set_cookie(&response, "_csrf").is_some());
}

#[tokio::test]
async fn test_double_submit_strategy() {
    let mut config = test_config();
    config.csrf.strategy = CsrfStrategy::DoubleSubmit;
    let (app, guard) = guarded_app(&config);
    assert!(guard.csrf_guard().is_none());

    let response = send(&app, request(Method::GET, "/api/csrf-token").body(Body::empty()).unwrap()).await;
    let cookie = set_cookie(&response, "_csrf").unwrap();
    let token = body_json(response).await["csrfToken"].as_str().unwrap().to_string();
    assert_eq!(cookie, token);

    // cookie and header agree
    let response = send(
        &app,
        request_from(Method::POST, "/api/trips", "198.51.100.9:4000")
            .header(header::COOKIE, format!("_csrf={}", cookie))
            .header("x-csrf-token", &token)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // header without the cookie
    let response = send(
        &app,
        request(Method::POST, "/api/trips")
            .header("x-csrf-token", &token)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "CSRF_MISMATCH");

    // query string is never accepted for double submit
    let response = send(
        &app,
        request(Method::POST, &format!("/api/trips?_csrf={}", token))
            .header(header::COOKIE, format!("_csrf={}", cookie))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(body_json(response).await["code"], "CSRF_MISMATCH");
}

#[tokio::test]
async fn test_oversized_form_body_rejected() {
    let mut config = test_config();
    config.security.max_body_size = 64;
    let (app, _) = guarded_app(&config);
    fetch_token(&app).await;

    let response = send(
        &app,
        request(Method::POST, "/api/trips")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("data={}", "x".repeat(128))))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
