/*
 * Responsibility
 * - Hand the request's Session (inserted by the session middleware) to handlers
 */
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::services::session::Session;
use crate::state::AppState;

pub struct SessionExtractor(pub Session);

impl FromRequestParts<AppState> for SessionExtractor
where
    AppState: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // absent when the skip header bypassed session handling
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(SessionExtractor)
            .ok_or_else(|| {
                AppError::bad_request("SESSION_UNAVAILABLE", "no session for this request")
            })
    }
}
