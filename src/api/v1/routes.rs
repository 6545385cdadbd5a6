/*
 * Responsibility
 * - v1 URL structure
 * - Which guard protects which routes (route_layer per group, then merge)
 * - Session + implicit refresh layers wrap every v1 route
 */
use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::api::v1::handlers::{
    account::change_password,
    auth::{issue_token, logout, refresh},
    me::{me, me_optional},
    session::visits,
    users::{delete_user, list_users},
};
use crate::middleware::auth::{RouteGuard, implicit_refresh};
use crate::middleware::session;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/auth/token", post(issue_token))
        .route("/session/visits", get(visits));

    let refresh_only = RouteGuard::refresh().apply(
        Router::new().route("/auth/refresh", post(refresh)),
        state.clone(),
    );

    let access = RouteGuard::access().apply(
        Router::new()
            .route("/auth/logout", post(logout))
            .route("/me", get(me)),
        state.clone(),
    );

    let optional = RouteGuard::optional().apply(
        Router::new().route("/me/optional", get(me_optional)),
        state.clone(),
    );

    let fresh = RouteGuard::fresh().apply(
        Router::new().route("/account/password", post(change_password)),
        state.clone(),
    );

    let users = RouteGuard::access()
        .scopes(["users:read"])
        .apply(Router::new().route("/users", get(list_users)), state.clone());

    let admin = RouteGuard::access().scopes(["admin:users"]).apply(
        Router::new().route("/admin/users/{user_id}", delete(delete_user)),
        state.clone(),
    );

    let router = Router::new()
        .merge(public)
        .merge(refresh_only)
        .merge(access)
        .merge(optional)
        .merge(fresh)
        .merge(users)
        .merge(admin);

    let router = implicit_refresh::apply(router, state.clone());
    session::apply(router, state)
}
