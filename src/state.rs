/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 *   - auth: token engine, revoker: blocklist writes, sessions: signed session service
 * - Cheap to clone (Arc inside)
 */
use std::sync::Arc;

use crate::error::AppError;
use crate::services::auth::{AuthConfig, AuthService, CacheBlocklist, RevocationGate, TokenRevoker};
use crate::services::cache::CacheClient;
use crate::services::session::{SessionConfig, SessionService, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub revoker: Arc<dyn TokenRevoker>,
    pub sessions: Arc<SessionService>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("auth", &self.auth)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        auth: Arc<AuthService>,
        revoker: Arc<dyn TokenRevoker>,
        sessions: Arc<SessionService>,
    ) -> Self {
        Self {
            auth,
            revoker,
            sessions,
        }
    }

    /// Wire everything on top of one cache backend: the blocklist lives in
    /// `cache` and doubles as the revocation gate of the auth service.
    pub fn with_cache<C: CacheClient>(
        auth: AuthConfig,
        session: SessionConfig,
        cache: C,
        session_store: Arc<dyn SessionStore>,
    ) -> Result<Self, AppError> {
        let blocklist = Arc::new(CacheBlocklist::new(cache));
        let gate = RevocationGate::from_check(blocklist.clone());

        let auth = AuthService::new(auth, gate)?;
        let sessions = SessionService::new(session, session_store)?;

        Ok(Self::new(Arc::new(auth), blocklist, Arc::new(sessions)))
    }
}
