/*
 * Responsibility
 * - App-wide AppError definition
 * - IntoResponse impl (HTTP status / JSON error body)
 * - The one place where auth / session / cache / config failures become status codes
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::config::ConfigError;
use crate::services::auth::AuthError;
use crate::services::cache::CacheError;
use crate::services::session::SessionError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest { code, .. } => (StatusCode::BAD_REQUEST, *code),
            AppError::Auth(e) => match e {
                AuthError::MissingToken(_) => (StatusCode::UNAUTHORIZED, "MISSING_TOKEN"),
                AuthError::MissingCsrfToken(_) => (StatusCode::UNAUTHORIZED, "MISSING_CSRF_TOKEN"),
                AuthError::JwtDecode(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_TOKEN"),
                AuthError::AccessTokenRequired => {
                    (StatusCode::UNAUTHORIZED, "ACCESS_TOKEN_REQUIRED")
                }
                AuthError::RefreshTokenRequired => {
                    (StatusCode::UNAUTHORIZED, "REFRESH_TOKEN_REQUIRED")
                }
                AuthError::FreshTokenRequired => (StatusCode::UNAUTHORIZED, "FRESH_TOKEN_REQUIRED"),
                AuthError::Csrf(_) => (StatusCode::UNAUTHORIZED, "CSRF_ERROR"),
                AuthError::RevokedToken => (StatusCode::UNAUTHORIZED, "TOKEN_REVOKED"),
                AuthError::InsufficientScope { .. } => (StatusCode::FORBIDDEN, "INSUFFICIENT_SCOPE"),
                AuthError::ReservedClaim(_) => (StatusCode::BAD_REQUEST, "RESERVED_CLAIM"),
                AuthError::BadConfiguration(_) | AuthError::Encode(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR")
                }
            },
            AppError::Session(_) | AppError::Cache(_) | AppError::Config(_) | AppError::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status.is_server_error() {
            // Details stay in the log; clients get a generic message.
            error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            match self {
                AppError::BadRequest { message, .. } => message,
                other => other.to_string(),
            }
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn render(err: AppError) -> (StatusCode, Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn auth_family_is_unauthorized() {
        for err in [
            AuthError::missing("no header"),
            AuthError::MissingCsrfToken("no csrf".into()),
            AuthError::FreshTokenRequired,
            AuthError::RefreshTokenRequired,
            AuthError::Csrf("mismatch".into()),
            AuthError::RevokedToken,
        ] {
            let (status, _) = render(err.into()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn scope_failure_is_forbidden_with_details() {
        let (status, body) = render(
            AuthError::InsufficientScope {
                required: vec!["users:write".into()],
                provided: vec!["users:read".into()],
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "INSUFFICIENT_SCOPE");
        assert!(body["error"]["message"].as_str().unwrap().contains("users:write"));
    }

    #[tokio::test]
    async fn decode_errors_are_unprocessable() {
        let (status, body) = render(AuthError::JwtDecode("InvalidSignature".into()).into()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn server_errors_hide_details() {
        let (status, body) =
            render(AuthError::BadConfiguration("secret_key is required".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "internal server error");
    }
}
