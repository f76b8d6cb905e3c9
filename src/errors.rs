use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::auth::middleware::Rejection;
use crate::directory::DirectoryError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("not found: {0}")]
    NotFound(&'static str),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        match rejection.status() {
            StatusCode::FORBIDDEN => AppError::Forbidden(rejection.public_message()),
            _ => AppError::Unauthorized(rejection.public_message()),
        }
    }
}

impl From<DirectoryError> for AppError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::UsernameTaken => AppError::Validation("username already exists".into()),
            DirectoryError::UnknownUser => AppError::NotFound("user not found"),
            DirectoryError::Database(e) => AppError::Database(e),
            DirectoryError::Hash(msg) => AppError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_type, code, msg) = match &self {
            AppError::Validation(msg) => ("invalid_request_error", "validation_failed", msg.clone()),
            AppError::InvalidCredentials => (
                "authentication_error",
                "invalid_credentials",
                "invalid username or password".to_string(),
            ),
            AppError::Unauthorized(msg) => ("authentication_error", "unauthorized", msg.to_string()),
            AppError::Forbidden(msg) => ("permission_error", "forbidden", msg.to_string()),
            AppError::NotFound(msg) => ("not_found_error", "not_found", msg.to_string()),
            AppError::Upstream(e) => {
                tracing::warn!("crawl daemon error: {}", e);
                (
                    "upstream_error",
                    "upstream_failed",
                    "crawl daemon request failed".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                ("internal_error", "internal_server_error", "internal server error".to_string())
            }
            AppError::Redis(e) => {
                tracing::error!("Redis error: {}", e);
                ("internal_error", "internal_server_error", "internal server error".to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                ("internal_error", "internal_server_error", "internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        let mut response = (status, body).into_response();

        // Bearer challenge on token failures
        if status == StatusCode::UNAUTHORIZED && !matches!(self, AppError::InvalidCredentials) {
            response.headers_mut().insert(
                "www-authenticate",
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::codec::CodecError;

    #[test]
    fn test_rejections_map_to_status() {
        let e: AppError = Rejection::MissingToken.into();
        assert_eq!(e.status(), StatusCode::UNAUTHORIZED);

        let e: AppError = Rejection::AccountInactive.into();
        assert_eq!(e.status(), StatusCode::FORBIDDEN);

        let e: AppError = Rejection::InsufficientScope.into();
        assert_eq!(e.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_revoked_and_expired_are_indistinguishable() {
        let revoked: AppError = Rejection::Revoked.into();
        let expired: AppError = Rejection::InvalidToken(CodecError::Expired).into();
        assert_eq!(revoked.status(), expired.status());
        assert_eq!(revoked.to_string(), expired.to_string());
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let resp = AppError::Internal(anyhow::anyhow!("signing key exploded")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unauthorized_sets_bearer_challenge() {
        let resp = AppError::Unauthorized("missing token").into_response();
        assert_eq!(resp.headers()["www-authenticate"], "Bearer");

        let resp = AppError::InvalidCredentials.into_response();
        assert!(resp.headers().get("www-authenticate").is_none());
    }
}
