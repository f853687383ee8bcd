//! Authenticated-user extractor.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::{debug, info};

use cognito_core::defaults::AUTH_COOKIE_NAME;
use cognito_core::{User, UserRepository};

use super::cookies::read_cookie;
use super::jwt::{Claims, TokenError};
use crate::{ApiError, AppState};

/// The signed-in user, resolved from the `cognito_auth` cookie.
///
/// Usage:
/// ```ignore
/// async fn my_handler(CurrentUser { user, .. }: CurrentUser) -> impl IntoResponse {
///     // user.id scopes every query
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub claims: Claims,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = read_cookie(&parts.headers, AUTH_COOKIE_NAME)
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

        let claims = state.jwt.decode(&token).map_err(|e| match e {
            TokenError::Expired => ApiError::Unauthorized("Token has expired".to_string()),
            TokenError::Invalid => {
                ApiError::Unauthorized("Invalid authentication token".to_string())
            }
        })?;

        let user = match state.db.users.fetch_by_email(&claims.email).await? {
            Some(user) => user,
            None => {
                // Valid token for a user row that no longer exists (e.g. a fresh database).
                let user = state.db.users.upsert_by_email(&claims.profile()).await?;
                info!(subsystem = "auth", user_id = %user.id, "Created user from session token");
                user
            }
        };
        debug!(subsystem = "auth", user_id = %user.id, "Request authenticated");

        Ok(CurrentUser { user, claims })
    }
}
