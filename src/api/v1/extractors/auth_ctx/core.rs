use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::services::auth::AuthError;
use crate::state::AppState;

use super::AuthCtx;

/// Extractor for handlers behind a required-token guard.
/// The guard has already inserted AuthCtx into request extensions; a missing
/// context means the route was wired without a guard.
pub struct AuthCtxExtractor(pub AuthCtx);

impl FromRequestParts<AppState> for AuthCtxExtractor
where
    AppState: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthCtx>()
            .cloned()
            .map(AuthCtxExtractor)
            .ok_or_else(|| AuthError::missing("request is not authenticated").into())
    }
}

/// Extractor for optional-token routes: `None` when no token was presented.
pub struct OptionalAuthCtx(pub Option<AuthCtx>);

impl FromRequestParts<AppState> for OptionalAuthCtx
where
    AppState: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuthCtx(parts.extensions.get::<AuthCtx>().cloned()))
    }
}
