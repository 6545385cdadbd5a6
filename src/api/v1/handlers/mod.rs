pub mod account;
pub mod auth;
pub mod health;
pub mod me;
pub mod session;
pub mod users;

use axum::http::HeaderMap;

use crate::services::auth::SetCookie;

/// `Set-Cookie` headers for a handler response.
pub(crate) fn cookie_headers(cookies: &[SetCookie]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for cookie in cookies {
        cookie.apply(&mut headers);
    }
    headers
}
