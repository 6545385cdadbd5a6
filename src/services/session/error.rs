use thiserror::Error;

use crate::services::cache::CacheError;

/// Why a signed session cookie was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("no session token given")]
    NoToken,
    /// Tampered or malformed value.
    #[error("session signature does not match")]
    BadSignature,
    #[error("session signature expired")]
    Expired,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Backend(#[from] CacheError),

    #[error("session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
