//! Signed session middleware.
//!
//! Per request: skip check -> resolve or mint -> run handler -> set cookie
//! (new sessions only) -> gc (new sessions only).
//!
//! Handlers persist their changes with `Session::save`; anything left
//! unsaved is dropped with the request.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::state::AppState;

pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, session_middleware))
}

async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let sessions = &state.sessions;

    if sessions.should_skip(req.headers()) {
        debug!("session handling skipped by header");
        return Ok(next.run(req).await);
    }

    let resolved = sessions.resolve(req.headers()).await?;
    let session = resolved.session.clone();

    // middleware -> extractor handoff
    req.extensions_mut().insert(resolved.session.clone());

    let mut response = next.run(req).await;

    if session.is_dirty() {
        debug!(backend = sessions.store().backend_name(), "unsaved session changes discarded");
    }

    if resolved.is_new() {
        sessions
            .session_cookie(session.id())?
            .apply(response.headers_mut());

        if let Err(e) = sessions.gc().await {
            warn!(error = %e, "session gc failed");
        }
    }

    Ok(response)
}
