/*
 * Responsibility
 * - Typed failures raised by the token engine (codec / verify / extraction / scopes)
 * - No HTTP knowledge here: status mapping happens once in `crate::error`
 */
use thiserror::Error;

use crate::services::auth::payload::TokenType;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("bad configuration: {0}")]
    BadConfiguration(String),

    /// No usable token at any attempted location. One reason per location.
    #[error("missing token: {}", .0.join("; "))]
    MissingToken(Vec<String>),

    /// Member of the MissingToken family: the token was found but the CSRF
    /// value that must accompany it was not.
    #[error("missing CSRF token: {0}")]
    MissingCsrfToken(String),

    #[error("invalid token: {0}")]
    JwtDecode(String),

    #[error("access token required")]
    AccessTokenRequired,

    #[error("refresh token required")]
    RefreshTokenRequired,

    #[error("fresh token required")]
    FreshTokenRequired,

    #[error("CSRF check failed: {0}")]
    Csrf(String),

    #[error("token has been revoked")]
    RevokedToken,

    #[error("insufficient scope: required {required:?}, provided {provided:?}")]
    InsufficientScope {
        required: Vec<String>,
        provided: Vec<String>,
    },

    #[error("custom data uses reserved claim '{0}'")]
    ReservedClaim(String),

    #[error("failed to encode token: {0}")]
    Encode(String),
}

impl AuthError {
    pub fn missing(reason: impl Into<String>) -> Self {
        Self::MissingToken(vec![reason.into()])
    }

    pub fn type_mismatch(expected: TokenType) -> Self {
        match expected {
            TokenType::Access => Self::AccessTokenRequired,
            TokenType::Refresh => Self::RefreshTokenRequired,
        }
    }

    /// True for `MissingToken` and its CSRF subtype.
    pub fn is_missing_token(&self) -> bool {
        matches!(self, Self::MissingToken(_) | Self::MissingCsrfToken(_))
    }

    pub fn is_token_type_error(&self) -> bool {
        matches!(self, Self::AccessTokenRequired | Self::RefreshTokenRequired)
    }

    /// Human readable reasons, flattened. Used when aggregating per-location failures.
    pub fn reasons(&self) -> Vec<String> {
        match self {
            Self::MissingToken(reasons) => reasons.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        Self::JwtDecode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_token_family_includes_csrf_subtype() {
        assert!(AuthError::missing("no header").is_missing_token());
        assert!(AuthError::MissingCsrfToken("x".into()).is_missing_token());
        assert!(!AuthError::Csrf("mismatch".into()).is_missing_token());
    }

    #[test]
    fn type_mismatch_picks_specific_variant() {
        assert!(matches!(
            AuthError::type_mismatch(TokenType::Access),
            AuthError::AccessTokenRequired
        ));
        assert!(matches!(
            AuthError::type_mismatch(TokenType::Refresh),
            AuthError::RefreshTokenRequired
        ));
        assert!(AuthError::RefreshTokenRequired.is_token_type_error());
    }

    #[test]
    fn missing_token_message_lists_every_reason() {
        let err = AuthError::MissingToken(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "missing token: a; b");
    }
}
