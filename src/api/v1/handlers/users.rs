/*
 * Responsibility
 * - GET /users            (scope users:read)
 * - DELETE /admin/users/{id} (scope admin:users)
 * - Fixed data set; the interesting part is the guard in front of these
 */
use axum::{Json, extract::Path};
use tracing::info;

use crate::api::v1::dto::users::{DeletedUserResponse, UserResponse};
use crate::api::v1::extractors::AuthCtxExtractor;

pub async fn list_users() -> Json<Vec<UserResponse>> {
    let users = [("u1", "alice"), ("u2", "bob")]
        .into_iter()
        .map(|(id, name)| UserResponse {
            id: id.to_string(),
            user_name: name.to_string(),
        })
        .collect();
    Json(users)
}

pub async fn delete_user(
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Path(user_id): Path<String>,
) -> Json<DeletedUserResponse> {
    info!(user_id = %user_id, by = %ctx.sub, "user deleted");
    Json(DeletedUserResponse {
        id: user_id,
        deleted_by: ctx.sub,
    })
}
