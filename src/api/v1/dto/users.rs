/*
 * Responsibility
 * - Users DTOs for the scope-guarded listing / admin routes
 */
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub user_name: String,
}

#[derive(Debug, Serialize)]
pub struct DeletedUserResponse {
    pub id: String,
    pub deleted_by: String,
}
