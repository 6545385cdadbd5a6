//! Cache client interface used by higher-level services (revocation, sessions, counters).
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-layer errors (transport/command/serialization).
///
/// Note:
/// - Kept independent from `AppError` so callers can decide how to fail
///   (fail-closed for revocation, fresh session for the session store, etc.).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
    #[error("cache value error: {0}")]
    InvalidValue(String),
}

/// A small, string-based key-value interface.
///
/// - Revocation needs `SET EX` + `GET`.
/// - The session store needs `GET`/`SET EX`/`DEL`.
/// - `keys`/`incr` cover counters and maintenance scans.
///
/// Implementations must be cheap to clone (typically `Arc<...>` inside).
#[async_trait]
pub trait CacheClient: Clone + Send + Sync + 'static {
    // Returns the cache backend name (for logging).
    fn backend_name(&self) -> &'static str;

    // Get UTF-8 string value.
    async fn get_string(&self, key: &str) -> CacheResult<Option<String>>;

    // Set value, overwriting any previous one. `None` ttl keeps it forever.
    async fn set_string(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()>;

    // Delete a key. Returns number of deleted keys.
    async fn del(&self, key: &str) -> CacheResult<u64>;

    // Keys matching a glob pattern (`*`, `?`).
    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>>;

    // Atomically increment an integer value (missing keys start at 0).
    async fn incr(&self, key: &str) -> CacheResult<i64>;
}

/// Convenience helper to build a TTL from seconds.
pub fn ttl_seconds(seconds: u64) -> Duration {
    Duration::from_secs(seconds)
}
