/*
 * Responsibility
 * - POST /auth/token   : fresh access + refresh pair (no credential check here)
 * - POST /auth/refresh : refresh token -> new non-fresh access token
 * - POST /auth/logout  : revoke the presented access token's jti, unset cookies
 */
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use tracing::info;

use crate::api::v1::dto::auth::{LogoutResponse, TokenRequest, TokenResponse};
use crate::api::v1::extractors::AuthCtxExtractor;
use crate::api::v1::handlers::cookie_headers;
use crate::error::AppError;
use crate::services::auth::{AuthError, TokenLocation, TokenOptions, TokenType};
use crate::state::AppState;

fn access_expires_in(state: &AppState) -> Option<i64> {
    state
        .auth
        .config()
        .expires_for(TokenType::Access)
        .map(|d| d.num_seconds())
}

pub async fn issue_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<(StatusCode, HeaderMap, Json<TokenResponse>), AppError> {
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_REQUEST", msg))?;

    let options = TokenOptions {
        scopes: req.scopes.clone(),
        ..TokenOptions::default()
    };
    let access_token = state
        .auth
        .create_access_token(&req.sub, options.clone().fresh(true))?;
    let refresh_token = state.auth.create_refresh_token(&req.sub, options)?;

    let headers = if req.cookies {
        let mut cookies = state.auth.set_access_cookies(&access_token, None)?;
        cookies.extend(state.auth.set_refresh_cookies(&refresh_token, None)?);
        cookie_headers(&cookies)
    } else {
        HeaderMap::new()
    };

    info!(sub = %req.sub, cookies = req.cookies, "token pair issued");

    Ok((
        StatusCode::OK,
        headers,
        Json(TokenResponse {
            access_token,
            token_type: "bearer",
            expires_in: access_expires_in(&state),
            refresh_token: Some(refresh_token),
        }),
    ))
}

pub async fn refresh(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
) -> Result<(StatusCode, HeaderMap, Json<TokenResponse>), AppError> {
    // same subject, scopes and custom data; never fresh
    let access_token = state.auth.reissue_access_token(&ctx.payload)?;

    let headers = if ctx.location == TokenLocation::Cookies {
        cookie_headers(&state.auth.set_access_cookies(&access_token, None)?)
    } else {
        HeaderMap::new()
    };

    Ok((
        StatusCode::OK,
        headers,
        Json(TokenResponse {
            access_token,
            token_type: "bearer",
            expires_in: access_expires_in(&state),
            refresh_token: None,
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
) -> Result<(StatusCode, HeaderMap, Json<LogoutResponse>), AppError> {
    let jti = ctx
        .jti()
        .ok_or_else(|| AuthError::JwtDecode("token has no jti claim".into()))?;

    // block only for as long as the token could still be presented
    let ttl = ctx
        .payload
        .time_until_expiry(Utc::now())
        .and_then(|left| left.to_std().ok());

    state.revoker.revoke(jti, ttl).await?;
    info!(sub = %ctx.sub, "token revoked");

    Ok((
        StatusCode::OK,
        cookie_headers(&state.auth.unset_cookies()),
        Json(LogoutResponse { revoked: true }),
    ))
}
