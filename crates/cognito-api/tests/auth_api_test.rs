//! Session cookie handling: protected routes, /me, logout, health.

mod common;

use axum::http::{Method, StatusCode};
use chrono::Utc;

use cognito_api::auth::{Claims, JwtCodec};
use cognito_core::UserRepository;
use common::{TestApp, TEST_SECRET};

#[tokio::test]
async fn test_root_and_health_are_public() {
    let app = TestApp::new().await;

    let root = app.request(Method::GET, "/", None, None).await;
    assert_eq!(root.status, StatusCode::OK);
    assert_eq!(root.body["name"], "Cognito API");

    let health = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "healthy");
    assert_eq!(health.body["database"], "ok");
    assert_eq!(health.body["llm"]["cloud"], true);
}

#[tokio::test]
async fn test_protected_route_without_cookie_is_401() {
    let app = TestApp::new().await;

    let res = app.request(Method::GET, "/api/entries", None, None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "Not authenticated");
    assert_eq!(res.body["detail"], "Not authenticated");
    assert_eq!(
        res.headers.get("www-authenticate").and_then(|v| v.to_str().ok()),
        Some("Bearer")
    );
}

#[tokio::test]
async fn test_expired_and_forged_tokens_are_rejected() {
    let app = TestApp::new().await;
    let now = Utc::now().timestamp();

    let expired = JwtCodec::new(TEST_SECRET, 24)
        .encode(&Claims {
            email: "writer@example.com".to_string(),
            name: None,
            picture: None,
            exp: now - 60,
            iat: now - 3600,
        })
        .unwrap();
    let res = app
        .get("/api/auth/me", &format!("cognito_auth={}", expired))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "Token has expired");

    let forged = JwtCodec::new("some-other-secret", 24)
        .encode(&Claims {
            email: "writer@example.com".to_string(),
            name: None,
            picture: None,
            exp: now + 3600,
            iat: now,
        })
        .unwrap();
    let res = app
        .get("/api/auth/me", &format!("cognito_auth={}", forged))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "Invalid authentication token");
}

#[tokio::test]
async fn test_me_returns_signed_in_user() {
    let app = TestApp::new().await;
    let (user, cookie) = app.sign_in("writer@example.com").await;

    let res = app.get("/api/auth/me", &cookie).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["id"], user.id.to_string());
    assert_eq!(res.body["email"], "writer@example.com");
    assert!(res.body.get("refresh_token").is_none());
}

#[tokio::test]
async fn test_valid_token_for_unknown_user_creates_it() {
    let app = TestApp::new().await;
    let now = Utc::now().timestamp();
    let token = app
        .state
        .jwt
        .encode(&Claims {
            email: "new@example.com".to_string(),
            name: Some("New Writer".to_string()),
            picture: None,
            exp: now + 3600,
            iat: now,
        })
        .unwrap();

    let res = app
        .get("/api/auth/me", &format!("cognito_auth={}", token))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["name"], "New Writer");

    let stored = app.db.users.fetch_by_email("new@example.com").await.unwrap();
    assert!(stored.is_some());
}

#[tokio::test]
async fn test_logout_clears_cookie_and_refresh_token() {
    let app = TestApp::new().await;
    let (user, cookie) = app.sign_in("writer@example.com").await;
    app.db
        .users
        .store_refresh_token(&user.email, Some("google-refresh"), None)
        .await
        .unwrap();

    let res = app
        .request(Method::POST, "/api/auth/logout", Some(&cookie), None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);

    let cleared = res.cookie_starting_with("cognito_auth=").unwrap();
    assert!(cleared.contains("Max-Age=0"));
    assert!(cleared.contains("HttpOnly"));

    let stored = app.db.users.fetch_refresh_token(&user.email).await.unwrap();
    assert!(stored.is_none());
}

#[tokio::test]
async fn test_logout_without_cookie_still_succeeds() {
    let app = TestApp::new().await;

    let res = app.request(Method::POST, "/api/auth/logout", None, None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.cookie_starting_with("cognito_auth=").is_some());
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = TestApp::new().await;

    let res = app.request(Method::GET, "/health", None, None).await;
    assert!(res.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_rate_limit_rejects_excess_requests() {
    let mut settings = common::test_settings();
    settings.rate_limit_enabled = true;
    settings.rate_limit_requests = 1;
    settings.rate_limit_period_secs = 3600;
    let app = TestApp::with_settings(settings).await;

    let first = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(first.status, StatusCode::OK);

    let second = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(second.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.body["error"], "rate_limit_exceeded");
}
