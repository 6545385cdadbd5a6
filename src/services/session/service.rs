/*
 * Responsibility
 * - Per-request session resolution: skip check, cookie verification,
 *   store lookup, minting new sessions
 * - Rendering the signed session cookie
 *
 * Notes
 * - The cookie carries only the signed session id; data stays server-side
 * - Any unusable cookie (bad signature, expired, evicted) means a fresh session
 */
use std::sync::Arc;

use axum::http::HeaderMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::services::auth::SetCookie;
use crate::services::auth::cookies::cookie_value;
use crate::services::session::error::{SessionError, SignatureError};
use crate::services::session::handle::Session;
use crate::services::session::serializer::SignatureSerializer;
use crate::services::session::settings::SessionConfig;
use crate::services::session::store::SessionStore;

/// How the session attached to a request came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// Valid cookie, store still present.
    Existing,
    NoCookie,
    /// Tampered, malformed or expired cookie.
    InvalidSignature,
    /// Valid cookie whose store is gone.
    Evicted,
}

#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub session: Session,
    pub origin: SessionOrigin,
}

impl ResolvedSession {
    /// A new cookie must be set on the response.
    pub fn is_new(&self) -> bool {
        self.origin != SessionOrigin::Existing
    }
}

#[derive(Clone)]
pub struct SessionService {
    config: Arc<SessionConfig>,
    serializer: SignatureSerializer,
    store: Arc<dyn SessionStore>,
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("config", &self.config)
            .field("backend", &self.store.backend_name())
            .finish()
    }
}

impl SessionService {
    pub fn new(config: SessionConfig, store: Arc<dyn SessionStore>) -> Result<Self, SessionError> {
        let serializer = SignatureSerializer::new(&config.secret_key, config.max_age)?;
        Ok(Self {
            config: Arc::new(config),
            serializer,
            store,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Does the configured skip header match this request?
    pub fn should_skip(&self, headers: &HeaderMap) -> bool {
        let Some((name, expected)) = &self.config.skip_header else {
            return false;
        };
        match headers.get(name.as_str()) {
            None => false,
            Some(_) if expected == "*" => true,
            Some(value) => value.to_str().is_ok_and(|v| v == expected),
        }
    }

    /// Attach the session referenced by the request cookie, or mint one.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<ResolvedSession, SessionError> {
        let cookie = cookie_value(headers, &self.config.cookie_name);

        let origin = match self.serializer.decode(cookie.as_deref()) {
            Err(SignatureError::NoToken) => SessionOrigin::NoCookie,
            Err(e) => {
                warn!(error = %e, "session cookie rejected");
                SessionOrigin::InvalidSignature
            }
            Ok(data) => match data.get(&self.config.cookie_name).and_then(Value::as_str) {
                None => {
                    warn!("session cookie has no session id");
                    SessionOrigin::InvalidSignature
                }
                Some(session_id) => match self.store.get_store(session_id).await? {
                    Some(store) => {
                        return Ok(ResolvedSession {
                            session: Session::new(session_id, store, self.store.clone()),
                            origin: SessionOrigin::Existing,
                        });
                    }
                    None => SessionOrigin::Evicted,
                },
            },
        };

        let session_id = Uuid::new_v4().simple().to_string();
        let store = self.store.create_store(&session_id).await?;
        debug!(origin = ?origin, backend = self.store.backend_name(), "session minted");

        Ok(ResolvedSession {
            session: Session::new(session_id, store, self.store.clone()),
            origin,
        })
    }

    /// Signed cookie for `session_id`.
    pub fn session_cookie(&self, session_id: &str) -> Result<SetCookie, SessionError> {
        let mut payload = Map::new();
        payload.insert(self.config.cookie_name.clone(), Value::from(session_id));
        let value = self.serializer.encode(&payload)?;

        Ok(SetCookie::new(&self.config.cookie_name, value)
            .path(&self.config.path)
            .domain(self.config.domain.clone())
            .max_age((self.config.max_age > 0).then_some(self.config.max_age))
            .http_only(self.config.http_only)
            .secure(self.config.https_only)
            .same_site(self.config.same_site))
    }

    pub async fn gc(&self) -> Result<(), SessionError> {
        self.store.gc().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::session::store::InMemorySessionStore;
    use axum::http::HeaderValue;
    use axum::http::header::COOKIE;

    fn service(config: SessionConfig) -> (SessionService, InMemorySessionStore) {
        let store = InMemorySessionStore::default();
        let svc = SessionService::new(config, Arc::new(store.clone())).unwrap();
        (svc, store)
    }

    fn with_cookie(cookie: &SetCookie) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{}={}", cookie.name, cookie.value)).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn no_cookie_mints_distinct_sessions() {
        let (svc, store) = service(SessionConfig::new("secret"));
        let a = svc.resolve(&HeaderMap::new()).await.unwrap();
        let b = svc.resolve(&HeaderMap::new()).await.unwrap();

        assert_eq!(a.origin, SessionOrigin::NoCookie);
        assert!(a.is_new());
        assert_ne!(a.session.id(), b.session.id());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn valid_cookie_reuses_store() {
        let (svc, _) = service(SessionConfig::new("secret"));
        let first = svc.resolve(&HeaderMap::new()).await.unwrap();
        first.session.insert("visits", 1).unwrap();
        first.session.save().await.unwrap();

        let cookie = svc.session_cookie(first.session.id()).unwrap();
        let again = svc.resolve(&with_cookie(&cookie)).await.unwrap();
        assert_eq!(again.origin, SessionOrigin::Existing);
        assert!(!again.is_new());
        assert_eq!(again.session.id(), first.session.id());
        assert_eq!(again.session.get::<i64>("visits"), Some(1));
    }

    #[tokio::test]
    async fn tampered_cookie_mints_new_session() {
        let (svc, _) = service(SessionConfig::new("secret"));
        let first = svc.resolve(&HeaderMap::new()).await.unwrap();
        let mut cookie = svc.session_cookie(first.session.id()).unwrap();

        let mut bytes = cookie.value.into_bytes();
        bytes[3] = if bytes[3] == b'x' { b'y' } else { b'x' };
        cookie.value = String::from_utf8(bytes).unwrap();

        let next = svc.resolve(&with_cookie(&cookie)).await.unwrap();
        assert_eq!(next.origin, SessionOrigin::InvalidSignature);
        assert_ne!(next.session.id(), first.session.id());
    }

    #[tokio::test]
    async fn evicted_store_mints_new_session() {
        let store = InMemorySessionStore::new(1, chrono::Duration::zero());
        let svc = SessionService::new(SessionConfig::new("secret"), Arc::new(store.clone())).unwrap();
        let cookie = svc.session_cookie("gone").unwrap();

        let resolved = svc.resolve(&with_cookie(&cookie)).await.unwrap();
        assert_eq!(resolved.origin, SessionOrigin::Evicted);
        assert_ne!(resolved.session.id(), "gone");
    }

    #[test]
    fn skip_header_rules() {
        let (exact, _) = service(SessionConfig::new("s").skip_header("x-no-session", "1"));
        let (any, _) = service(SessionConfig::new("s").skip_header("x-no-session", "*"));

        let mut headers = HeaderMap::new();
        assert!(!exact.should_skip(&headers));
        assert!(!any.should_skip(&headers));

        headers.insert("x-no-session", HeaderValue::from_static("2"));
        assert!(!exact.should_skip(&headers));
        assert!(any.should_skip(&headers));

        headers.insert("x-no-session", HeaderValue::from_static("1"));
        assert!(exact.should_skip(&headers));
    }

    #[test]
    fn cookie_attributes() {
        let mut config = SessionConfig::new("s");
        config.https_only = true;
        config.max_age = 0;
        let (svc, _) = service(config);
        let cookie = svc.session_cookie("abc").unwrap();
        assert_eq!(cookie.name, "session");
        assert!(cookie.http_only);
        assert!(cookie.secure);
        assert_eq!(cookie.max_age, None);
        assert_eq!(cookie.value.split('.').count(), 3);
    }
}
