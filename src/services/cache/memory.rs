//! Process-local cache backend.
//!
//! Used when no Valkey URL is configured and by the test suite. Expiry is
//! lazy: an expired entry is dropped the next time it is touched or listed,
//! and writes sweep the whole map once per sweep interval.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Store {
    entries: HashMap<String, Entry>,
    last_sweep: Instant,
}

impl Store {
    fn sweep_if_due(&mut self, now: Instant, interval: Duration) {
        if now.duration_since(self.last_sweep) >= interval {
            self.entries.retain(|_, e| e.is_live(now));
            self.last_sweep = now;
        }
    }
}

#[derive(Clone, Debug)]
pub struct MemoryCache {
    store: Arc<Mutex<Store>>,
    sweep_interval: Duration,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sweep_interval(sweep_interval: Duration) -> Self {
        Self {
            store: Arc::new(Mutex::new(Store {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            sweep_interval,
        }
    }

    /// Entries currently held, expired ones not yet swept included.
    pub fn len(&self) -> usize {
        self.store.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut store = self.store.lock();
        let entries = &mut store.entries;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.live_value(key))
    }

    async fn set_string(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let now = Instant::now();
        let expires_at = ttl.map(|ttl| now + ttl);
        let mut store = self.store.lock();
        store.sweep_if_due(now, self.sweep_interval);
        store.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        let now = Instant::now();
        let removed = self.store.lock().entries.remove(key);
        Ok(removed.is_some_and(|e| e.is_live(now)) as u64)
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let now = Instant::now();
        let mut store = self.store.lock();
        store.entries.retain(|_, e| e.is_live(now));
        store.last_sweep = now;

        let mut keys: Vec<String> = store
            .entries
            .keys()
            .filter(|k| glob_match(pattern.as_bytes(), k.as_bytes()))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        let now = Instant::now();
        let mut store = self.store.lock();
        store.sweep_if_due(now, self.sweep_interval);

        let (current, expires_at) = match store.entries.get(key) {
            Some(e) if e.is_live(now) => {
                let n = e.value.parse::<i64>().map_err(|_| {
                    CacheError::InvalidValue(format!("value at '{key}' is not an integer"))
                })?;
                (n, e.expires_at)
            }
            _ => (0, None),
        };

        let next = current
            .checked_add(1)
            .ok_or_else(|| CacheError::InvalidValue(format!("increment overflows at '{key}'")))?;

        // INCR keeps the existing TTL.
        store.entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }
}

/// Redis-style glob: `*` any run, `?` any single byte. No character classes.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(b'*') => {
                star = Some((p, t));
                p += 1;
            }
            Some(b'?') => {
                p += 1;
                t += 1;
            }
            Some(c) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == b'*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_del() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get_string("k").await.unwrap(), None);

        cache.set_string("k", "v", None).await.unwrap();
        assert_eq!(cache.get_string("k").await.unwrap().as_deref(), Some("v"));

        assert_eq!(cache.del("k").await.unwrap(), 1);
        assert_eq!(cache.del("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn entries_expire() {
        let cache = MemoryCache::new();
        cache
            .set_string("short", "v", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get_string("short").await.unwrap(), None);
        assert!(cache.keys("*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let a = MemoryCache::new();
        let b = a.clone();
        a.set_string("k", "v", None).await.unwrap();
        assert_eq!(b.get_string("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn incr_counts_from_zero_and_rejects_text() {
        let cache = MemoryCache::new();
        assert_eq!(cache.incr("hits").await.unwrap(), 1);
        assert_eq!(cache.incr("hits").await.unwrap(), 2);

        cache.set_string("name", "abc", None).await.unwrap();
        assert!(matches!(
            cache.incr("name").await,
            Err(CacheError::InvalidValue(_))
        ));
    }

    #[tokio::test]
    async fn writes_sweep_expired_entries() {
        let cache = MemoryCache::with_sweep_interval(Duration::from_millis(10));
        for i in 0..1000 {
            cache
                .set_string(&format!("burst:{i}"), "1", Some(Duration::from_millis(1)))
                .await
                .unwrap();
        }
        assert!(cache.len() >= 1000);

        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.set_string("fresh", "v", None).await.unwrap();
        assert_eq!(cache.get_string("fresh").await.unwrap().as_deref(), Some("v"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn default_interval_leaves_recent_writes_alone() {
        let cache = MemoryCache::new();
        cache
            .set_string("a", "1", Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.set_string("b", "2", None).await.unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_string("a").await.unwrap(), None);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn keys_filters_by_pattern() {
        let cache = MemoryCache::new();
        for k in ["session:a", "session:bb", "revoked:a"] {
            cache.set_string(k, "1", None).await.unwrap();
        }
        assert_eq!(
            cache.keys("session:*").await.unwrap(),
            vec!["session:a".to_string(), "session:bb".to_string()]
        );
        assert_eq!(cache.keys("session:?").await.unwrap(), vec!["session:a".to_string()]);
    }

    #[test]
    fn glob_rules() {
        assert!(glob_match(b"*", b""));
        assert!(glob_match(b"a*c", b"abbbc"));
        assert!(glob_match(b"a*b*c", b"axbyc"));
        assert!(!glob_match(b"a*d", b"abc"));
        assert!(glob_match(b"h?llo", b"hello"));
        assert!(!glob_match(b"h?llo", b"hllo"));
    }
}
