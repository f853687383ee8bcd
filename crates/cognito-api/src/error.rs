//! HTTP error responses.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

/// Error returned by handlers.
///
/// Rendered as `{"error": message, "detail": message}`; the `detail` key keeps
/// older clients that read FastAPI-style errors working.
#[derive(Debug)]
pub enum ApiError {
    Internal(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    Unprocessable(String),
    Conflict(String),
    ServiceUnavailable(String),
}

impl From<cognito_core::Error> for ApiError {
    fn from(err: cognito_core::Error) -> Self {
        use cognito_core::Error;

        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            Error::Forbidden(msg) => ApiError::Forbidden(msg),
            Error::Inference(msg) | Error::Config(msg) => {
                ApiError::ServiceUnavailable(format!("LLM service error: {}", msg))
            }
            err @ (Error::RateLimited(_) | Error::Request(_)) => {
                ApiError::ServiceUnavailable(format!("LLM service error: {}", err))
            }
            Error::Database(sqlx_err) => {
                let msg = sqlx_err.to_string();
                if msg.contains("UNIQUE constraint failed") {
                    return ApiError::Conflict(msg);
                }
                ApiError::Internal(format!("Database error: {}", msg))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Internal(msg) => {
                tracing::error!(subsystem = "api", error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::ServiceUnavailable(msg) => {
                tracing::warn!(subsystem = "api", error = %msg, "Upstream service unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
        };

        let body = Json(serde_json::json!({
            "error": message,
            "detail": message,
        }));

        if status == StatusCode::UNAUTHORIZED {
            return (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response();
        }
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cognito_core::Error;

    fn status_of(err: Error) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_core_error_mapping() {
        assert_eq!(status_of(Error::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(Error::InvalidInput("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(Error::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(Error::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_of(Error::Inference("x".into())), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(Error::RateLimited("x".into())), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(Error::Internal("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_llm_error_message() {
        match ApiError::from(Error::Inference("Max retries exceeded: 429".into())) {
            ApiError::ServiceUnavailable(msg) => {
                assert_eq!(msg, "LLM service error: Max retries exceeded: 429")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unauthorized_sets_challenge_header() {
        let response = ApiError::Unauthorized("Not authenticated".into()).into_response();
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }
}
