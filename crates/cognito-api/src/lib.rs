//! # cognito-api
//!
//! HTTP API for the Cognito journal: Google sign-in with cookie sessions,
//! entries and goals, LLM chat and refine, and offline-first sync.
//!
//! The binary in `main.rs` wires configuration, logging, the database and
//! the LLM backends, then serves [`app`].

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod services;
pub mod state;

use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

pub use config::Settings;
pub use error::ApiError;
pub use state::AppState;

use handlers::{auth as auth_handlers, chat, entries, goals, health, sync};

/// Request ID generator using UUIDv7 (time-ordered).
#[derive(Clone, Copy)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Build the full router with middleware.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.settings);
    let max_body_bytes = state.settings.max_body_bytes;

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        // Auth
        .route("/api/auth/login", get(auth_handlers::login))
        .route("/api/auth/callback", get(auth_handlers::callback))
        .route("/api/auth/me", get(auth_handlers::me))
        .route("/api/auth/logout", post(auth_handlers::logout))
        .route("/api/auth/refresh", post(auth_handlers::refresh))
        // Entries
        .route(
            "/api/entries",
            get(entries::list_entries).post(entries::create_entry),
        )
        .route(
            "/api/entries/:id",
            get(entries::get_entry).put(entries::update_entry),
        )
        .route("/api/entries/:id/versions", get(entries::list_entry_versions))
        // Goals
        .route("/api/goals", get(goals::list_goals).post(goals::create_goal))
        .route(
            "/api/goals/:id",
            get(goals::get_goal)
                .put(goals::update_goal)
                .delete(goals::delete_goal),
        )
        // Chat
        .route("/api/chat", post(chat::send_message))
        .route("/api/chat/refine", post(chat::refine_entry))
        .route("/api/chat/refine/queue", post(chat::queue_refine))
        .route("/api/chat/refine/status", get(chat::refine_status))
        // Sync
        .route("/api/sync", post(sync::sync))
        // Middleware
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

/// CORS for the PWA origin(s); credentials are required for the cookie.
fn cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .allowed_origins()
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            tracing::warn!(subsystem = "api", "Rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "rate_limit_exceeded",
                    "detail": "Too many requests. Please wait before retrying."
                })),
            ));
        }
    }
    Ok(next.run(request).await)
}
