use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{Map, Value};

use crate::services::cache::CacheClient;
use crate::services::session::error::SessionError;
use crate::services::session::store::{SessionRecord, SessionStore, default_retention};

/// Session store kept in a `CacheClient` (Valkey in production).
///
/// Records are JSON under `session:{id}` with the retention window as TTL,
/// so the cache does the expiry and `gc` has nothing to do.
#[derive(Clone, Debug)]
pub struct CacheSessionStore<C: CacheClient> {
    cache: C,
    retention: Duration,
}

impl<C: CacheClient> CacheSessionStore<C> {
    pub fn new(cache: C) -> Self {
        Self::with_retention(cache, default_retention())
    }

    pub fn with_retention(cache: C, retention: Duration) -> Self {
        Self { cache, retention }
    }

    fn key(session_id: &str) -> String {
        format!("session:{session_id}")
    }

    async fn read(&self, session_id: &str) -> Result<Option<SessionRecord>, SessionError> {
        match self.cache.get_string(&Self::key(session_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn write(&self, session_id: &str, record: &SessionRecord) -> Result<(), SessionError> {
        let raw = serde_json::to_string(record)?;
        let ttl = self.retention.to_std().ok();
        self.cache
            .set_string(&Self::key(session_id), &raw, ttl)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<C: CacheClient> SessionStore for CacheSessionStore<C> {
    fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }

    async fn has_session_id(&self, session_id: &str) -> Result<bool, SessionError> {
        Ok(self
            .cache
            .get_string(&Self::key(session_id))
            .await?
            .is_some())
    }

    async fn create_store(&self, session_id: &str) -> Result<Map<String, Value>, SessionError> {
        let record = SessionRecord::new(Utc::now());
        self.write(session_id, &record).await?;
        Ok(record.store)
    }

    async fn get_store(
        &self,
        session_id: &str,
    ) -> Result<Option<Map<String, Value>>, SessionError> {
        Ok(self.read(session_id).await?.map(|record| record.store))
    }

    async fn save_store(
        &self,
        session_id: &str,
        store: &Map<String, Value>,
    ) -> Result<(), SessionError> {
        // TTL restarts on every save; created_at is carried over.
        let created_at = self
            .read(session_id)
            .await?
            .map(|record| record.created_at)
            .unwrap_or_else(Utc::now);
        let record = SessionRecord {
            created_at,
            store: store.clone(),
        };
        self.write(session_id, &record).await
    }

    async fn gc(&self) -> Result<(), SessionError> {
        Ok(())
    }
}
