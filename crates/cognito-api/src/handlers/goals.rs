//! Goal HTTP handlers.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use cognito_core::{CreateGoalRequest, Goal, GoalRepository, UpdateGoalRequest};

use crate::auth::CurrentUser;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::{ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ListGoalsQuery {
    pub active: Option<bool>,
}

fn goal_not_found() -> ApiError {
    ApiError::NotFound("Goal not found".to_string())
}

/// GET /api/goals?active=
pub async fn list_goals(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
    ApiQuery(query): ApiQuery<ListGoalsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let goals = state.db.goals.list(user.id, query.active).await?;
    Ok(Json(json!({ "goals": goals })))
}

/// GET /api/goals/:id
pub async fn get_goal(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Goal>, ApiError> {
    let goal = state
        .db
        .goals
        .fetch(user.id, id)
        .await?
        .ok_or_else(goal_not_found)?;
    Ok(Json(goal))
}

/// POST /api/goals
pub async fn create_goal(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
    ApiJson(req): ApiJson<CreateGoalRequest>,
) -> Result<(StatusCode, Json<Goal>), ApiError> {
    if req.category.trim().is_empty() {
        return Err(ApiError::BadRequest("category must not be empty".to_string()));
    }
    let goal = state.db.goals.insert(user.id, None, req).await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

/// PUT /api/goals/:id
///
/// A body with no fields returns the goal unchanged.
pub async fn update_goal(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateGoalRequest>,
) -> Result<Json<Goal>, ApiError> {
    let goal = state
        .db
        .goals
        .update(user.id, id, req)
        .await?
        .ok_or_else(goal_not_found)?;
    Ok(Json(goal))
}

/// Soft delete: the goal stays, marked inactive.
///
/// DELETE /api/goals/:id
pub async fn delete_goal(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.db.goals.delete(user.id, id, true).await? {
        return Err(goal_not_found());
    }
    Ok(Json(json!({ "success": true })))
}
