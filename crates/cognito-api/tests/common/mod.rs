//! Shared helpers for API integration tests.
//!
//! Each test gets a fresh in-memory database and mock LLM backends, and
//! drives the router with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use cognito_api::{app, AppState, Settings};
use cognito_core::{GenerationBackend, User};
use cognito_db::test_fixtures::{create_test_user, test_database};
use cognito_db::Database;
use cognito_inference::mock::MockGenerationBackend;
use cognito_inference::{LlmRouter, RetryPolicy};

pub const TEST_SECRET: &str = "integration-test-secret";

pub fn test_settings() -> Settings {
    Settings {
        jwt_secret: TEST_SECRET.to_string(),
        cookie_secure: false,
        google_client_id: "client-id".to_string(),
        google_client_secret: "client-secret".to_string(),
        ..Settings::default()
    }
}

pub struct TestApp {
    pub db: Database,
    pub state: AppState,
    pub cloud: MockGenerationBackend,
    pub local: MockGenerationBackend,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// All `Set-Cookie` header values.
    pub fn cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect()
    }

    pub fn cookie_starting_with(&self, prefix: &str) -> Option<String> {
        self.cookies().into_iter().find(|c| c.starts_with(prefix))
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_backends(
            MockGenerationBackend::new().with_fixed_response("Cloud reply"),
            MockGenerationBackend::new().with_fixed_response("Local reply"),
        )
        .await
    }

    pub async fn with_backends(cloud: MockGenerationBackend, local: MockGenerationBackend) -> Self {
        Self::build(test_settings(), Some(cloud), local).await
    }

    pub async fn with_settings(settings: Settings) -> Self {
        Self::build(
            settings,
            Some(MockGenerationBackend::new().with_fixed_response("Cloud reply")),
            MockGenerationBackend::new().with_fixed_response("Local reply"),
        )
        .await
    }

    pub async fn without_cloud() -> Self {
        Self::build(
            test_settings(),
            None,
            MockGenerationBackend::new().with_fixed_response("Local reply"),
        )
        .await
    }

    async fn build(
        settings: Settings,
        cloud: Option<MockGenerationBackend>,
        local: MockGenerationBackend,
    ) -> Self {
        let db = test_database().await;
        let cloud_backend = cloud.clone().map(|b| Arc::new(b) as Arc<dyn GenerationBackend>);
        let llm = LlmRouter::new(cloud_backend, Arc::new(local.clone()))
            .with_retry_policy(RetryPolicy::immediate(3));
        let state = AppState::new(db.clone(), llm, settings).expect("app state");

        Self {
            db,
            state,
            cloud: cloud.unwrap_or_default(),
            local,
        }
    }

    pub fn router(&self) -> Router {
        app(self.state.clone())
    }

    /// Create a user and return it with a valid session cookie.
    pub async fn sign_in(&self, email: &str) -> (User, String) {
        let user = create_test_user(&self.db, email).await;
        let token = self.state.jwt.issue(&user).expect("issue token");
        (user, format!("cognito_auth={}", token))
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, cookie: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(cookie), None).await
    }

    pub async fn post(&self, uri: &str, cookie: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(cookie), Some(body)).await
    }

    pub async fn put(&self, uri: &str, cookie: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(cookie), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, cookie: &str) -> TestResponse {
        self.request(Method::DELETE, uri, Some(cookie), None).await
    }
}
