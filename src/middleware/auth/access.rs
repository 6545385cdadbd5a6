//! Route guards: extract + verify the token a route demands, then hand an
//! `AuthCtx` to the handler through request extensions.
//!
//! - Which token, freshness, optionality: `AccessPolicy`
//! - Scopes: checked here too, after verification
//! - The body is buffered only when a body-based location is in play
//!   (json, or the CSRF form-field fallback), then put back for the handler
//!
//! ```ignore
//! let users = Router::new().route("/users", get(list_users));
//! let users = RouteGuard::access().scopes(["users:read"]).apply(users, state.clone());
//! ```

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, Bytes, to_bytes},
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};
use tracing::warn;

use crate::api::v1::extractors::AuthCtx;
use crate::error::AppError;
use crate::services::auth::location::{RequestView, needs_body};
use crate::services::auth::{AccessPolicy, TokenLocation};
use crate::state::AppState;

#[derive(Debug, Clone, Default)]
pub struct RouteGuard {
    policy: AccessPolicy,
    scopes: Vec<String>,
    all_scopes: bool,
}

impl RouteGuard {
    pub fn new(policy: AccessPolicy) -> Self {
        Self {
            policy,
            scopes: Vec::new(),
            all_scopes: true,
        }
    }

    pub fn access() -> Self {
        Self::new(AccessPolicy::access())
    }

    pub fn fresh() -> Self {
        Self::new(AccessPolicy::fresh())
    }

    pub fn refresh() -> Self {
        Self::new(AccessPolicy::refresh())
    }

    pub fn optional() -> Self {
        Self::new(AccessPolicy::optional())
    }

    /// Every listed scope must be granted.
    pub fn scopes<S: Into<String>>(mut self, scopes: impl IntoIterator<Item = S>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self.all_scopes = true;
        self
    }

    /// At least one listed scope must be granted.
    pub fn any_scope<S: Into<String>>(mut self, scopes: impl IntoIterator<Item = S>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self.all_scopes = false;
        self
    }

    /// Guard every route of `router` (route_layer: unmatched paths stay 404).
    pub fn apply(self, router: Router<AppState>, state: AppState) -> Router<AppState> {
        let guarded = Guarded {
            state,
            guard: Arc::new(self),
        };
        router.route_layer(middleware::from_fn_with_state(guarded, guard_middleware))
    }
}

#[derive(Clone)]
struct Guarded {
    state: AppState,
    guard: Arc<RouteGuard>,
}

async fn guard_middleware(
    State(Guarded { state, guard }): State<Guarded>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth = &state.auth;
    let policy = &guard.policy;

    let locations: &[TokenLocation] = policy
        .locations
        .as_deref()
        .unwrap_or(auth.config().token_location.as_slice());

    let (parts, body) = req.into_parts();

    let (body, buffered): (Body, Option<Bytes>) = if needs_body(auth.config(), locations) {
        // already capped by the body limit layer
        let bytes = to_bytes(body, usize::MAX).await.map_err(|e| {
            warn!(error = %e, "failed to buffer request body for token lookup");
            AppError::bad_request("INVALID_BODY", "request body could not be read")
        })?;
        (Body::from(bytes.clone()), Some(bytes))
    } else {
        (body, None)
    };

    let mut view = RequestView::new(&parts.method, &parts.uri, &parts.headers);
    if let Some(bytes) = &buffered {
        view = view.with_body(bytes);
    }

    let ctx = match auth.authenticate_located(&view, policy).await? {
        None => None,
        Some((payload, location)) => {
            if !guard.scopes.is_empty() {
                auth.require_scopes(&payload, &guard.scopes, guard.all_scopes)?;
            }
            Some(AuthCtx::new(payload, location))
        }
    };

    let mut req = Request::from_parts(parts, body);
    if let Some(ctx) = ctx {
        // middleware -> extractor handoff
        req.extensions_mut().insert(ctx);
    }

    Ok(next.run(req).await)
}
