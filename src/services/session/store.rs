/*
 * Responsibility
 * - Backing-store contract for server-side session data
 * - In-process reference implementation with threshold-triggered GC
 *
 * Notes
 * - Stores are shared across requests; every operation locks internally
 *   so callers never hold an external lock
 */
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::services::session::error::SessionError;

pub const DEFAULT_GC_THRESHOLD: usize = 100;

pub fn default_retention() -> Duration {
    Duration::hours(12)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub created_at: DateTime<Utc>,
    pub store: Map<String, Value>,
}

impl SessionRecord {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            store: Map::new(),
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn has_session_id(&self, session_id: &str) -> Result<bool, SessionError>;

    /// Create an empty store for `session_id` and persist it immediately.
    async fn create_store(&self, session_id: &str) -> Result<Map<String, Value>, SessionError>;

    async fn get_store(&self, session_id: &str)
    -> Result<Option<Map<String, Value>>, SessionError>;

    /// Overwrite the stored data. Saving the same data twice is harmless.
    async fn save_store(
        &self,
        session_id: &str,
        store: &Map<String, Value>,
    ) -> Result<(), SessionError>;

    async fn gc(&self) -> Result<(), SessionError>;
}

#[derive(Clone, Debug)]
pub struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<String, SessionRecord>>>,
    gc_threshold: usize,
    retention: Duration,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_GC_THRESHOLD, default_retention())
    }
}

impl InMemorySessionStore {
    pub fn new(gc_threshold: usize, retention: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            gc_threshold,
            retention,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cleanup_old_sessions(&self) -> usize {
        self.cleanup_old_sessions_at(Utc::now())
    }

    /// Drop every session older than the retention window. Returns how many went.
    pub fn cleanup_old_sessions_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, record| now - record.created_at <= self.retention);
        before - sessions.len()
    }

    #[cfg(test)]
    fn insert_record(&self, session_id: &str, record: SessionRecord) {
        self.sessions.lock().insert(session_id.to_string(), record);
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn has_session_id(&self, session_id: &str) -> Result<bool, SessionError> {
        Ok(self.sessions.lock().contains_key(session_id))
    }

    async fn create_store(&self, session_id: &str) -> Result<Map<String, Value>, SessionError> {
        let record = SessionRecord::new(Utc::now());
        let store = record.store.clone();
        self.sessions.lock().insert(session_id.to_string(), record);
        Ok(store)
    }

    async fn get_store(
        &self,
        session_id: &str,
    ) -> Result<Option<Map<String, Value>>, SessionError> {
        Ok(self
            .sessions
            .lock()
            .get(session_id)
            .map(|record| record.store.clone()))
    }

    async fn save_store(
        &self,
        session_id: &str,
        store: &Map<String, Value>,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock();
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionRecord::new(Utc::now()))
            .store = store.clone();
        Ok(())
    }

    async fn gc(&self) -> Result<(), SessionError> {
        if self.len() >= self.gc_threshold {
            let removed = self.cleanup_old_sessions();
            debug!(removed, remaining = self.len(), "session gc");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_get_save() {
        let store = InMemorySessionStore::default();
        assert!(!store.has_session_id("s1").await.unwrap());
        assert_eq!(store.get_store("s1").await.unwrap(), None);

        let data = store.create_store("s1").await.unwrap();
        assert!(data.is_empty());
        assert!(store.has_session_id("s1").await.unwrap());

        let mut data = data;
        data.insert("visits".into(), Value::from(1));
        store.save_store("s1", &data).await.unwrap();
        store.save_store("s1", &data).await.unwrap();
        assert_eq!(store.get_store("s1").await.unwrap(), Some(data));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn save_keeps_creation_time() {
        let store = InMemorySessionStore::default();
        let old = Utc::now() - Duration::hours(13);
        store.insert_record("s1", SessionRecord::new(old));
        store.save_store("s1", &Map::new()).await.unwrap();
        assert_eq!(store.cleanup_old_sessions(), 1);
    }

    #[test]
    fn cleanup_removes_only_expired_sessions() {
        let store = InMemorySessionStore::default();
        let now = Utc::now();
        store.insert_record("old", SessionRecord::new(now - Duration::hours(13)));
        store.insert_record("edge", SessionRecord::new(now - Duration::hours(12)));
        store.insert_record("new", SessionRecord::new(now));

        assert_eq!(store.cleanup_old_sessions_at(now), 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn gc_waits_for_threshold() {
        let store = InMemorySessionStore::new(3, Duration::hours(12));
        let stale = Utc::now() - Duration::days(1);
        store.insert_record("a", SessionRecord::new(stale));
        store.insert_record("b", SessionRecord::new(stale));

        store.gc().await.unwrap();
        assert_eq!(store.len(), 2, "below threshold, nothing is collected");

        store.create_store("c").await.unwrap();
        store.gc().await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.has_session_id("c").await.unwrap());
    }
}
