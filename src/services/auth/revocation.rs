/*
 * Responsibility
 * - Revocation (blocklist) predicate injected at construction time
 * - Sync and async predicates behind one object-safe trait
 * - Cache-backed blocklist (fail-closed on backend errors)
 *
 * Notes
 * - The canonical revocation key is the token's `jti`
 * - An unset gate is open: nothing is ever reported revoked
 */
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::services::auth::error::AuthError;
use crate::services::auth::payload::TokenPayload;
use crate::services::cache::{CacheClient, CacheError};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Is this `jti` revoked?
pub trait BlocklistCheck: Send + Sync {
    fn is_revoked<'a>(&'a self, jti: &'a str) -> BoxFuture<'a, bool>;
}

/// A blocklist that can also record revocations.
pub trait TokenRevoker: BlocklistCheck {
    /// Block `jti` for `ttl` (normally the token's remaining lifetime).
    fn revoke<'a>(
        &'a self,
        jti: &'a str,
        ttl: Option<Duration>,
    ) -> BoxFuture<'a, Result<(), CacheError>>;
}

struct SyncCheck<F>(F);

impl<F> BlocklistCheck for SyncCheck<F>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_revoked<'a>(&'a self, jti: &'a str) -> BoxFuture<'a, bool> {
        let hit = (self.0)(jti);
        Box::pin(async move { hit })
    }
}

struct AsyncCheck<F>(F);

impl<F, Fut> BlocklistCheck for AsyncCheck<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send + 'static,
{
    fn is_revoked<'a>(&'a self, jti: &'a str) -> BoxFuture<'a, bool> {
        Box::pin((self.0)(jti.to_string()))
    }
}

#[derive(Clone, Default)]
pub struct RevocationGate {
    check: Option<Arc<dyn BlocklistCheck>>,
}

impl fmt::Debug for RevocationGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevocationGate")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl RevocationGate {
    /// No predicate: every token passes.
    pub fn open() -> Self {
        Self { check: None }
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::from_check(Arc::new(SyncCheck(f)))
    }

    pub fn from_async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self::from_check(Arc::new(AsyncCheck(f)))
    }

    pub fn from_check(check: Arc<dyn BlocklistCheck>) -> Self {
        Self { check: Some(check) }
    }

    /// Lets strict deployments tell "no predicate" from "predicate says no".
    pub fn is_configured(&self) -> bool {
        self.check.is_some()
    }

    pub async fn is_token_in_blocklist(&self, jti: &str) -> bool {
        match &self.check {
            Some(check) => check.is_revoked(jti).await,
            None => false,
        }
    }

    /// Final verification step.
    pub async fn ensure_not_revoked(&self, payload: &TokenPayload) -> Result<(), AuthError> {
        if !self.is_configured() {
            return Ok(());
        }

        let jti = payload.jti.as_deref().filter(|j| !j.is_empty()).ok_or_else(|| {
            AuthError::JwtDecode("token has no 'jti' claim to check for revocation".to_string())
        })?;

        if self.is_token_in_blocklist(jti).await {
            debug!(jti, "revoked token presented");
            return Err(AuthError::RevokedToken);
        }
        Ok(())
    }
}

/// Blocklist stored in a `CacheClient` under `{prefix}{jti}`.
#[derive(Clone, Debug)]
pub struct CacheBlocklist<C: CacheClient> {
    cache: C,
    prefix: String,
}

impl<C: CacheClient> CacheBlocklist<C> {
    pub fn new(cache: C) -> Self {
        Self::with_prefix(cache, "revoked:")
    }

    pub fn with_prefix(cache: C, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }

    fn key(&self, jti: &str) -> String {
        format!("{}{}", self.prefix, jti)
    }
}

impl<C: CacheClient> BlocklistCheck for CacheBlocklist<C> {
    fn is_revoked<'a>(&'a self, jti: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            match self.cache.get_string(&self.key(jti)).await {
                Ok(hit) => hit.is_some(),
                Err(e) => {
                    // Fail closed: an unreachable blocklist must not let tokens through.
                    warn!(
                        error = %e,
                        backend = self.cache.backend_name(),
                        "blocklist lookup failed, treating token as revoked"
                    );
                    true
                }
            }
        })
    }
}

impl<C: CacheClient> TokenRevoker for CacheBlocklist<C> {
    fn revoke<'a>(
        &'a self,
        jti: &'a str,
        ttl: Option<Duration>,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async move { self.cache.set_string(&self.key(jti), "1", ttl).await })
    }
}
