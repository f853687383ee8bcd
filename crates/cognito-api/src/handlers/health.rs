//! Liveness endpoints.

use axum::{extract::State, response::IntoResponse, Json};
use tracing::warn;

use crate::AppState;

/// GET /
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Cognito API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /health
///
/// Reports `degraded` when the database does not answer.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.db.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            warn!(subsystem = "api", error = %e, "Health check database ping failed");
            "unavailable"
        }
    };
    let status = if database == "ok" { "healthy" } else { "degraded" };

    Json(serde_json::json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
        "llm": {
            "cloud": state.llm.has_cloud_backend(),
        },
    }))
}
