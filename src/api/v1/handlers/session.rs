use axum::Json;

use crate::api::v1::dto::session::VisitsResponse;
use crate::api::v1::extractors::SessionExtractor;
use crate::error::AppError;

/// GET /session/visits: per-session counter.
pub async fn visits(
    SessionExtractor(session): SessionExtractor,
) -> Result<Json<VisitsResponse>, AppError> {
    let visits = session.get::<u64>("visits").unwrap_or(0) + 1;
    session.insert("visits", visits)?;
    session.save().await?;
    Ok(Json(VisitsResponse { visits }))
}
