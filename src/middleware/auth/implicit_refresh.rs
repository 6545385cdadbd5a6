/*
 * Responsibility
 * - Re-issue cookie-borne access tokens that are close to expiry
 *   (AuthConfig::implicit_refresh / implicit_refresh_delta)
 * - Runs after the handler, touches only the response cookies
 *
 * Notes
 * - Any failure leaves the response untouched; the next request simply
 *   presents the old token (or none)
 */
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, header::SET_COOKIE},
    middleware::{self, Next},
    response::Response,
};
use chrono::Utc;
use tracing::debug;

use crate::services::auth::cookies::cookie_value;
use crate::services::auth::{AuthError, RequestToken, TokenLocation, TokenType, VerifyOptions};
use crate::services::auth::{AuthService, SetCookie};
use crate::state::AppState;

/// No-op unless `implicit_refresh` is configured.
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    if !state.auth.config().implicit_refresh {
        return router;
    }
    router.layer(middleware::from_fn_with_state(state, implicit_refresh_middleware))
}

async fn implicit_refresh_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let auth = &state.auth;
    let token = cookie_value(req.headers(), auth.config().cookie_name(TokenType::Access));

    let mut response = next.run(req).await;

    let Some(token) = token else {
        return response;
    };
    if sets_cookie(&response, auth.config().cookie_name(TokenType::Access)) {
        // the handler already issued (or removed) the access cookie
        return response;
    }

    match refreshed_cookies(auth, token).await {
        Ok(Some(cookies)) => {
            for cookie in &cookies {
                cookie.apply(response.headers_mut());
            }
            debug!("access token refreshed implicitly");
        }
        Ok(None) => {}
        Err(e) => debug!(error = %e, "implicit refresh skipped"),
    }

    response
}

fn sets_cookie(response: &Response, name: &str) -> bool {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.split_once('=').is_some_and(|(n, _)| n.trim() == name))
}

async fn refreshed_cookies(
    auth: &AuthService,
    token: String,
) -> Result<Option<Vec<SetCookie>>, AuthError> {
    let found = RequestToken::new(token, TokenLocation::Cookies, TokenType::Access);
    let options = VerifyOptions {
        verify_csrf: false,
        ..VerifyOptions::default()
    };
    let payload = auth.verify_token(found, options).await?;

    if !auth.needs_implicit_refresh(&payload, Utc::now()) {
        return Ok(None);
    }

    let token = auth.reissue_access_token(&payload)?;
    auth.set_access_cookies(&token, None).map(Some)
}
