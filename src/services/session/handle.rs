use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::services::session::error::SessionError;
use crate::services::session::store::SessionStore;

#[derive(Debug, Default)]
struct State {
    data: Map<String, Value>,
    dirty: bool,
}

/// Per-request handle to one session's data.
///
/// Clones share the same data. Changes stay in memory until `save`; nothing
/// flushes them implicitly.
#[derive(Clone)]
pub struct Session {
    id: Arc<str>,
    state: Arc<Mutex<State>>,
    store: Arc<dyn SessionStore>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("backend", &self.store.backend_name())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(id: impl Into<Arc<str>>, data: Map<String, Value>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            id: id.into(),
            state: Arc::new(Mutex::new(State { data, dirty: false })),
            store,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `None` when the key is absent or holds a different type.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.state.lock().data.get(key).cloned()?;
        serde_json::from_value(value).ok()
    }

    pub fn insert<T: Serialize>(&self, key: &str, value: T) -> Result<(), SessionError> {
        let value = serde_json::to_value(value)?;
        let mut state = self.state.lock();
        state.data.insert(key.to_string(), value);
        state.dirty = true;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut state = self.state.lock();
        let removed = state.data.remove(key);
        if removed.is_some() {
            state.dirty = true;
        }
        removed
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        if !state.data.is_empty() {
            state.data.clear();
            state.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        self.state.lock().data.clone()
    }

    /// Flush to the backing store.
    pub async fn save(&self) -> Result<(), SessionError> {
        let data = {
            let mut state = self.state.lock();
            state.dirty = false;
            state.data.clone()
        };
        self.store.save_store(&self.id, &data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::session::store::InMemorySessionStore;

    #[tokio::test]
    async fn typed_access_and_save() {
        let store = InMemorySessionStore::default();
        let data = store.create_store("s1").await.unwrap();
        let session = Session::new("s1", data, Arc::new(store.clone()));

        assert_eq!(session.get::<u64>("visits"), None);
        session.insert("visits", 3u64).unwrap();
        assert_eq!(session.get::<u64>("visits"), Some(3));
        assert_eq!(session.get::<String>("visits"), None);
        assert!(session.is_dirty());

        session.save().await.unwrap();
        assert!(!session.is_dirty());
        let saved = store.get_store("s1").await.unwrap().unwrap();
        assert_eq!(saved.get("visits"), Some(&Value::from(3)));
    }

    #[tokio::test]
    async fn unsaved_changes_never_reach_the_store() {
        let store = InMemorySessionStore::default();
        let data = store.create_store("s1").await.unwrap();
        let session = Session::new("s1", data, Arc::new(store.clone()));

        session.insert("visits", 1u64).unwrap();
        drop(session);

        let stored = store.get_store("s1").await.unwrap().unwrap();
        assert!(stored.get("visits").is_none());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::default());
        let a = Session::new("s1", Map::new(), store);
        let b = a.clone();
        a.insert("k", "v").unwrap();
        assert_eq!(b.get::<String>("k").as_deref(), Some("v"));
        assert_eq!(b.remove("k"), Some(Value::from("v")));
        assert!(a.snapshot().is_empty());
    }

    #[test]
    fn clear_on_empty_session_is_not_a_change() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::default());
        let session = Session::new("s1", Map::new(), store);
        session.clear();
        assert!(!session.is_dirty());
    }
}
