//! Cache client interface used by the cache facade and the like ledger.
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-layer errors (transport/command/timeout/serialization).
///
/// Note:
/// - We keep this independent from `AppError`. Every cache call is advisory, so callers
///   decide explicitly how to drop a failure (see `CacheResultExt`).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("cache value error: {0}")]
    InvalidValue(String),
}

/// A small, string-based key-value store interface.
///
/// Only the primitives the facade and the like ledger need:
/// - plain values with expiry (`GET` / `MGET` / `SET EX` / `DEL`)
/// - key enumeration by glob pattern (cursor based, never `KEYS`)
/// - hash fields for the pending-like ledger
///
/// Implementations must be cheap to clone (typically `Arc<...>` inside).
#[async_trait]
pub trait CacheClient: Clone + Send + Sync + 'static {
    // Returns the cache backend name (for logging).
    fn backend_name(&self) -> &'static str;

    // Get UTF-8 string value.
    async fn get_string(&self, key: &str) -> CacheResult<Option<String>>;

    // Batched get. The result has exactly one slot per input key, in input order.
    async fn get_many(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>>;

    // Set value with TTL (overwrites).
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    // Delete keys. Returns number of deleted keys. An empty slice is a no-op.
    async fn del(&self, keys: &[String]) -> CacheResult<u64>;

    // Enumerate keys matching a glob pattern (`*`, `?`, `[...]`).
    async fn keys_matching(&self, pattern: &str) -> CacheResult<Vec<String>>;

    // Set a single hash field (overwrites).
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> CacheResult<()>;

    // Read every field of a hash. A missing hash is an empty map.
    async fn hash_get_all(&self, key: &str) -> CacheResult<HashMap<String, String>>;

    // Delete hash fields whose current value still equals the given one.
    //
    // Fields overwritten since they were read survive. Returns number of removed fields.
    async fn hash_del_if_eq(&self, key: &str, entries: &[(String, String)]) -> CacheResult<u64>;

    // Round-trip check used by /health.
    async fn ping(&self) -> CacheResult<()>;
}

/// Convenience helper to build a TTL from seconds.
pub fn ttl_seconds(seconds: u64) -> Duration {
    Duration::from_secs(seconds)
}

/// Explicitly discard a cache failure after logging it.
///
/// Cache is a performance optimization, not a correctness dependency: call sites use this
/// instead of `?` so that dropping the error is visible in the code.
pub trait CacheResultExt<T> {
    fn or_log(self, op: &'static str, key: &str) -> Option<T>;
}

impl<T> CacheResultExt<T> for CacheResult<T> {
    fn or_log(self, op: &'static str, key: &str) -> Option<T> {
        match self {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(op, key, error = %e, "cache operation failed; continuing without cache");
                None
            }
        }
    }
}
