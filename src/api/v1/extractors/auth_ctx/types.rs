/*
 * Responsibility
 * - The "authenticated request" context handlers see
 * - Route guards verify the token and insert this into request extensions;
 *   handlers only ever receive this type
 */
use crate::services::auth::{TokenLocation, TokenPayload};

/// Context attached to authenticated requests.
///
/// - `sub` is the identity claim of the verified token
/// - `scopes` is empty when the token carries no scope claim
/// - `payload` keeps every other claim (jti, exp, custom data)
#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub sub: String,
    pub scopes: Vec<String>,
    pub fresh: bool,
    pub location: TokenLocation,
    pub payload: TokenPayload,
}

impl AuthCtx {
    pub fn new(payload: TokenPayload, location: TokenLocation) -> Self {
        Self {
            sub: payload.sub.clone(),
            scopes: payload.scopes.clone().unwrap_or_default(),
            fresh: payload.fresh,
            location,
            payload,
        }
    }

    pub fn jti(&self) -> Option<&str> {
        self.payload.jti.as_deref()
    }
}
