//! Process-local cache backend.
//!
//! Used when `CACHE_BACKEND=memory` (single instance, no Valkey) and as the store in tests.
//! Expiry is checked on access against the tokio clock, so paused-time tests can move past a
//! TTL with `tokio::time::advance`. Writes and scans also sweep expired entries, at most once
//! per `SWEEP_EVERY`, so keys that are never read again do not pile up.
use async_trait::async_trait;
use glob::Pattern;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};

#[derive(Debug)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

const SWEEP_EVERY: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    last_sweep: Option<Instant>,
    unavailable: bool,
}

impl State {
    fn sweep(&mut self, now: Instant) {
        if self
            .last_sweep
            .is_some_and(|at| now.duration_since(at) < SWEEP_EVERY)
        {
            return;
        }
        self.entries.retain(|_, e| e.is_live(now));
        self.last_sweep = Some(now);
    }

    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| !e.is_live(now)) {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryClient {
    state: Arc<Mutex<State>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, State>> {
        let guard = self
            .state
            .lock()
            .map_err(|_| CacheError::BackendConnection("memory cache lock poisoned".into()))?;
        if guard.unavailable {
            return Err(CacheError::BackendConnection("memory cache unavailable".into()));
        }
        Ok(guard)
    }

    /// Simulate an outage: every operation fails until switched back.
    #[cfg(test)]
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.unavailable = unavailable;
        }
    }

    #[cfg(test)]
    fn stored_entries(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or_default()
    }

    /// Write a raw string, bypassing the facade (tests seed corrupt payloads with this).
    #[cfg(test)]
    pub fn insert_raw(&self, key: &str, value: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Str(value.to_string()),
                    expires_at: None,
                },
            );
        }
    }
}

fn wrong_type(key: &str) -> CacheError {
    CacheError::BackendCommand(format!(
        "WRONGTYPE operation against key {key} holding the wrong kind of value"
    ))
}

#[async_trait]
impl CacheClient for MemoryClient {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        let mut state = self.lock()?;
        match state.live(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn get_many(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        let mut state = self.lock()?;
        // MGET semantics: a non-string value reads as nil rather than an error.
        Ok(keys
            .iter()
            .map(|key| match state.live(key) {
                Some(Entry {
                    value: Value::Str(s),
                    ..
                }) => Some(s.clone()),
                _ => None,
            })
            .collect())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut state = self.lock()?;
        let now = Instant::now();
        state.sweep(now);
        let ttl = ttl.max(Duration::from_secs(1));
        state.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(now + ttl),
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> CacheResult<u64> {
        let mut state = self.lock()?;
        let mut removed = 0;
        for key in keys {
            if state.live(key).is_some() {
                state.entries.remove(key);
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn keys_matching(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let matcher = Pattern::new(pattern)
            .map_err(|e| CacheError::BackendCommand(format!("invalid pattern {pattern}: {e}")))?;
        let mut state = self.lock()?;
        let now = Instant::now();
        state.sweep(now);
        let mut keys: Vec<String> = state
            .entries
            .iter()
            .filter(|(k, e)| e.is_live(now) && matcher.matches(k))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> CacheResult<()> {
        let mut state = self.lock()?;
        if state.live(key).is_none() {
            state.entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Hash(HashMap::new()),
                    expires_at: None,
                },
            );
        }
        match state.entries.get_mut(key) {
            Some(Entry {
                value: Value::Hash(h),
                ..
            }) => {
                h.insert(field.to_string(), value.to_string());
                Ok(())
            }
            _ => Err(wrong_type(key)),
        }
    }

    async fn hash_get_all(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        let mut state = self.lock()?;
        match state.live(key) {
            None => Ok(HashMap::new()),
            Some(Entry {
                value: Value::Hash(h),
                ..
            }) => Ok(h.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn hash_del_if_eq(&self, key: &str, entries: &[(String, String)]) -> CacheResult<u64> {
        let mut state = self.lock()?;
        let mut removed = 0;
        let now_empty = match state.live(key) {
            None => return Ok(0),
            Some(Entry {
                value: Value::Hash(h),
                ..
            }) => {
                for (field, value) in entries {
                    if h.get(field) == Some(value) {
                        h.remove(field);
                        removed += 1;
                    }
                }
                h.is_empty()
            }
            Some(_) => return Err(wrong_type(key)),
        };
        // Redis drops a hash once its last field is gone.
        if now_empty {
            state.entries.remove(key);
        }
        Ok(removed)
    }

    async fn ping(&self) -> CacheResult<()> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scan_uses_redis_style_globs() {
        let client = MemoryClient::new();
        for key in ["recipes:page=1", "recipe:12", "user:7", "user:7:saved", "category:Snack:page=2"] {
            client.set_with_ttl(key, "v", Duration::from_secs(60)).await.unwrap();
        }

        assert_eq!(
            client.keys_matching("recipes:*").await.unwrap(),
            vec!["recipes:page=1".to_string()]
        );
        assert_eq!(
            client.keys_matching("user:[0-9]").await.unwrap(),
            vec!["user:7".to_string()]
        );
        assert_eq!(
            client.keys_matching("user:?:saved").await.unwrap(),
            vec!["user:7:saved".to_string()]
        );
        assert!(client.keys_matching("category:Dessert:*").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_swept_without_being_read() {
        let client = MemoryClient::new();
        for i in 0..1000 {
            client
                .set_with_ttl(&format!("search:{i}"), "v", Duration::from_secs(1))
                .await
                .unwrap();
        }
        assert_eq!(client.stored_entries(), 1000);

        tokio::time::advance(Duration::from_secs(3600)).await;
        client
            .set_with_ttl("recipe:1", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(client.stored_entries(), 1);
        assert!(client.keys_matching("search:*").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let client = MemoryClient::new();
        client
            .set_with_ttl("k", "v", Duration::from_secs(10))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(client.get_string("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(client.get_string("k").await.unwrap(), None);
        assert!(client.keys_matching("*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn hash_compare_and_delete_keeps_overwritten_fields() {
        let client = MemoryClient::new();
        client.hash_set("h", "a", "1").await.unwrap();
        client.hash_set("h", "b", "1").await.unwrap();
        // `b` changes after the caller read it.
        client.hash_set("h", "b", "2").await.unwrap();

        let removed = client
            .hash_del_if_eq(
                "h",
                &[("a".into(), "1".into()), ("b".into(), "1".into())],
            )
            .await
            .unwrap();

        assert_eq!(removed, 1);
        let rest = client.hash_get_all("h").await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest.get("b").map(String::as_str), Some("2"));
    }

    #[tokio::test]
    async fn string_ops_on_hash_are_wrong_type() {
        let client = MemoryClient::new();
        client.hash_set("h", "a", "1").await.unwrap();
        assert!(matches!(
            client.get_string("h").await,
            Err(CacheError::BackendCommand(_))
        ));
        assert_eq!(client.get_many(&["h".into()]).await.unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn unavailable_client_fails_every_call() {
        let client = MemoryClient::new();
        client.set_unavailable(true);
        assert!(client.ping().await.is_err());
        assert!(client.get_string("k").await.is_err());
        client.set_unavailable(false);
        assert!(client.ping().await.is_ok());
    }
}
