/*
 * Responsibility
 * - POST /account/password (fresh token required by the route guard)
 * - Persisting the password is the host's concern; this only validates
 */
use axum::{Json, http::StatusCode};
use tracing::info;

use crate::api::v1::dto::account::ChangePasswordRequest;
use crate::api::v1::extractors::AuthCtxExtractor;
use crate::error::AppError;

pub async fn change_password(
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_REQUEST", msg))?;

    info!(sub = %ctx.sub, "password changed");
    Ok(StatusCode::NO_CONTENT)
}
