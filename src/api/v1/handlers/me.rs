use axum::Json;

use crate::api::v1::dto::me::{MeResponse, OptionalMeResponse};
use crate::api::v1::extractors::{AuthCtxExtractor, OptionalAuthCtx};

pub async fn me(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<MeResponse> {
    Json(MeResponse {
        jti: ctx.jti().map(str::to_string),
        expires_at: ctx.payload.expires_at(),
        sub: ctx.sub,
        scopes: ctx.scopes,
        fresh: ctx.fresh,
    })
}

pub async fn me_optional(OptionalAuthCtx(ctx): OptionalAuthCtx) -> Json<OptionalMeResponse> {
    Json(OptionalMeResponse {
        authenticated: ctx.is_some(),
        sub: ctx.map(|c| c.sub),
    })
}
