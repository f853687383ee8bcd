//! Sync HTTP handler.

use axum::{extract::State, Json};

use cognito_core::{SyncRequest, SyncResponse};

use crate::auth::CurrentUser;
use crate::extract::ApiJson;
use crate::services::{ChatService, SyncService};
use crate::{ApiError, AppState};

/// Reconcile the client's offline queue and return the server delta.
///
/// POST /api/sync
///
/// # Returns
/// - 200 OK with applied/skipped entity ids, server changes and the
///   timestamp to send as `last_synced_at` next time
pub async fn sync(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
    ApiJson(req): ApiJson<SyncRequest>,
) -> Result<Json<SyncResponse>, ApiError> {
    let chat = ChatService::new(state.db.clone(), state.llm.clone());
    let service = SyncService::new(state.db.clone(), chat);
    Ok(Json(service.sync(user.id, req).await?))
}
