//! Chat and refine HTTP handlers.

use axum::{
    extract::State,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::extract::{ApiJson, ApiQuery};
use crate::services::chat_service::{
    ChatRequest, ChatResponse, QueueRefineRequest, QueueRefineResponse, RefineRequest,
    RefineResponse, RefineStatusResponse,
};
use crate::services::ChatService;
use crate::{ApiError, AppState};

fn chat_service(state: &AppState) -> ChatService {
    ChatService::new(state.db.clone(), state.llm.clone())
}

/// Send a message and get the assistant's reply.
///
/// POST /api/chat
///
/// # Returns
/// - 200 OK `{response, conversation_id, entry_id}`
/// - 404 Not Found for an unknown entry or conversation
/// - 503 Service Unavailable when the LLM call fails
pub async fn send_message(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let response = chat_service(&state).send_message(user.id, req).await?;
    Ok(Json(response))
}

/// Turn the entry's conversations into a journal write-up.
///
/// POST /api/chat/refine
pub async fn refine_entry(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
    ApiJson(req): ApiJson<RefineRequest>,
) -> Result<Json<RefineResponse>, ApiError> {
    let response = chat_service(&state)
        .refine_entry(user.id, req.entry_id, req.use_local_model)
        .await?;
    Ok(Json(response))
}

/// Queue a refine to run during the next sync.
///
/// POST /api/chat/refine/queue
pub async fn queue_refine(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
    ApiJson(req): ApiJson<QueueRefineRequest>,
) -> Result<Json<QueueRefineResponse>, ApiError> {
    let response = chat_service(&state).queue_refine(user.id, req.entry_id).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct RefineStatusQuery {
    pub entry_id: Uuid,
}

/// GET /api/chat/refine/status?entry_id=
pub async fn refine_status(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
    ApiQuery(query): ApiQuery<RefineStatusQuery>,
) -> Result<Json<RefineStatusResponse>, ApiError> {
    let response = chat_service(&state)
        .refine_status(user.id, query.entry_id)
        .await?;
    Ok(Json(response))
}
