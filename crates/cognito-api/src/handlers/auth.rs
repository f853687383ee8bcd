//! Google sign-in HTTP handlers.
//!
//! Flow: `/api/auth/login` redirects to Google with a random `state` that is
//! also stored in a short-lived cookie; Google redirects back to
//! `/api/auth/callback`, which checks the state, exchanges the code, stores
//! the Google refresh token and sets the session cookie. `/api/auth/refresh`
//! uses the stored refresh token to renew an expired session silently.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use rand::RngCore;
use serde::Deserialize;
use tracing::{info, warn};

use cognito_core::defaults::{AUTH_COOKIE_NAME, OAUTH_STATE_COOKIE_NAME, REFRESH_TOKEN_TTL_DAYS};
use cognito_core::{User, UserProfile, UserRepository};

use crate::auth::cookies::{
    auth_cookie, clear_auth_cookie, clear_oauth_state_cookie, oauth_state_cookie, read_cookie,
};
use crate::auth::CurrentUser;
use crate::extract::ApiQuery;
use crate::{ApiError, AppState};

/// 302 to `location`, setting each cookie.
fn redirect_with_cookies(location: &str, cookies: Vec<String>) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(location) {
        headers.insert(header::LOCATION, value);
    }
    append_cookies(headers, cookies);
    response
}

fn append_cookies(headers: &mut HeaderMap, cookies: Vec<String>) {
    for cookie in cookies {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => warn!(subsystem = "auth", error = %e, "Dropping unrepresentable cookie"),
        }
    }
}

fn success_with_cookie(cookie: String) -> Response {
    let mut response = Json(serde_json::json!({ "success": true })).into_response();
    append_cookies(response.headers_mut(), vec![cookie]);
    response
}

fn refresh_token_expiry() -> chrono::DateTime<Utc> {
    Utc::now() + Duration::days(REFRESH_TOKEN_TTL_DAYS)
}

fn random_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Start Google sign-in.
///
/// GET /api/auth/login
pub async fn login(State(state): State<AppState>) -> Response {
    let oauth_state = random_state();
    let url = state.oauth.authorization_url(&oauth_state);
    redirect_with_cookies(&url, vec![oauth_state_cookie(&state.settings, &oauth_state)])
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
    pub state: Option<String>,
}

/// Google redirects here after consent.
///
/// GET /api/auth/callback
///
/// # Returns
/// - 302 Found to the frontend with the session cookie set
/// - 302 Found to `/login?error=...` when the user cancelled or the state
///   does not match
/// - 400 Bad Request when Google's answer is unusable
/// - 403 Forbidden when the account is not the allowed one
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<CallbackQuery>,
) -> Result<Response, ApiError> {
    let settings = &state.settings;
    let clear_state = clear_oauth_state_cookie(settings);

    if let Some(error) = &query.error {
        info!(subsystem = "auth", oauth_error = %error, "OAuth cancelled");
        return Ok(redirect_with_cookies(
            &format!("{}/login?error=oauth_cancelled", settings.frontend_url),
            vec![clear_state],
        ));
    }

    if let Some(expected) = read_cookie(&headers, OAUTH_STATE_COOKIE_NAME) {
        if query.state.as_deref() != Some(expected.as_str()) {
            warn!(subsystem = "auth", "OAuth state mismatch");
            return Ok(redirect_with_cookies(
                &format!("{}/login?error=invalid_state", settings.frontend_url),
                vec![clear_state],
            ));
        }
    }

    let code = query
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing authorization code".to_string()))?;

    let tokens = state
        .oauth
        .exchange_code(code)
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid authorization code: {}", e)))?;
    let access_token = tokens
        .access_token
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("No access token received".to_string()))?;

    let userinfo = state
        .oauth
        .fetch_userinfo(access_token)
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to fetch user info: {}", e)))?;
    let email = userinfo
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No email in user info".to_string()))?;

    if !settings.is_email_allowed(&email) {
        warn!(subsystem = "auth", "Sign-in attempt from an account that is not allowed");
        return Err(ApiError::Forbidden("Email not authorized".to_string()));
    }

    let profile = UserProfile {
        email,
        name: userinfo.name,
        picture: userinfo.picture,
    };
    let user = state.db.users.upsert_by_email(&profile).await?;
    state.db.users.update_last_login(&user.email, Some(&profile)).await?;
    if let Some(refresh_token) = tokens.refresh_token.as_deref() {
        state
            .db
            .users
            .store_refresh_token(&user.email, Some(refresh_token), Some(refresh_token_expiry()))
            .await?;
    }

    let user = signed_in_user(&state, user).await?;
    let jwt = state.jwt.issue(&user)?;
    info!(subsystem = "auth", user_id = %user.id, "User signed in");

    Ok(redirect_with_cookies(
        &settings.frontend_url,
        vec![auth_cookie(settings, &jwt), clear_state],
    ))
}

/// Re-read the user so the token carries the freshest profile.
async fn signed_in_user(state: &AppState, user: User) -> Result<User, ApiError> {
    Ok(state.db.users.fetch(user.id).await?.unwrap_or(user))
}

/// GET /api/auth/me
pub async fn me(CurrentUser { user, .. }: CurrentUser) -> Json<User> {
    Json(user)
}

/// Sign out: forget the Google refresh token and clear the session cookie.
///
/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    if let Some(token) = read_cookie(&headers, AUTH_COOKIE_NAME) {
        if let Ok(claims) = state.jwt.decode_allow_expired(&token) {
            state
                .db
                .users
                .store_refresh_token(&claims.email, None, None)
                .await?;
            info!(subsystem = "auth", "User signed out");
        }
    }
    Ok(success_with_cookie(clear_auth_cookie(&state.settings)))
}

/// Renew the session with the stored Google refresh token.
///
/// POST /api/auth/refresh
///
/// Accepts an expired session cookie as long as its signature is valid.
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let token = read_cookie(&headers, AUTH_COOKIE_NAME)
        .ok_or_else(|| ApiError::Unauthorized("No authentication token".to_string()))?;
    let claims = state
        .jwt
        .decode_allow_expired(&token)
        .map_err(|_| ApiError::Unauthorized("Invalid token".to_string()))?;

    let user = state
        .db
        .users
        .fetch_by_email(&claims.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("No refresh token available".to_string()))?;
    let stored = state
        .db
        .users
        .fetch_refresh_token(&user.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("No refresh token available".to_string()))?;

    let tokens = match state.oauth.refresh_access_token(&stored.token).await {
        Ok(tokens) => tokens,
        Err(e) => {
            warn!(subsystem = "auth", user_id = %user.id, error = %e, "Google refresh failed, clearing stored token");
            state.db.users.store_refresh_token(&user.email, None, None).await?;
            return Err(ApiError::Unauthorized(format!("Token refresh failed: {}", e)));
        }
    };
    let access_token = tokens
        .access_token
        .as_deref()
        .ok_or_else(|| ApiError::Unauthorized("No access token from refresh".to_string()))?;

    let userinfo = state
        .oauth
        .fetch_userinfo(access_token)
        .await
        .map_err(|e| ApiError::Unauthorized(format!("Failed to verify user: {}", e)))?;

    let profile = UserProfile {
        email: user.email.clone(),
        name: userinfo.name,
        picture: userinfo.picture,
    };
    state.db.users.update_last_login(&user.email, Some(&profile)).await?;
    if let Some(rotated) = tokens.refresh_token.as_deref() {
        state
            .db
            .users
            .store_refresh_token(&user.email, Some(rotated), Some(refresh_token_expiry()))
            .await?;
    }

    let user = signed_in_user(&state, user).await?;
    let jwt = state.jwt.issue(&user)?;
    info!(subsystem = "auth", user_id = %user.id, "Session refreshed");

    Ok(success_with_cookie(auth_cookie(&state.settings, &jwt)))
}
