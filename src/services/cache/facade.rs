//! Typed, best-effort cache on top of a `CacheClient`.
//!
//! - Values are stored as JSON, in exactly the shape the handler returns, so a hit and a miss
//!   are indistinguishable to the HTTP client.
//! - Every operation returns `CacheResult`; only `get_or_compute` swallows failures itself,
//!   and it does so by falling back to the compute function.
//! - A corrupt entry reads as a miss.
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};

use crate::services::cache::client::{CacheClient, CacheError, CacheResult, CacheResultExt};
use crate::services::cache::ttl::ResourceClass;

#[derive(Clone)]
pub struct Cache<C: CacheClient> {
    client: C,
    // Prepended as `{prefix}:` to every key and pattern (empty = no prefix).
    prefix: Arc<str>,
}

impl<C: CacheClient> Cache<C> {
    pub fn new(client: C, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: Arc::from(prefix.into()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.client.backend_name()
    }

    fn full_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.prefix, key)
        }
    }

    fn decode<T: DeserializeOwned>(&self, key: &str, raw: &str) -> Option<T> {
        match serde_json::from_str(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(
                    backend = self.backend_name(),
                    key,
                    error = %e,
                    "discarding undecodable cache entry"
                );
                None
            }
        }
    }

    /// Fetch and decode. Missing and undecodable entries are both `Ok(None)`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let full = self.full_key(key);
        let Some(raw) = self.client.get_string(&full).await? else {
            return Ok(None);
        };

        match self.decode(key, &raw) {
            Some(v) => Ok(Some(v)),
            None => {
                // Drop it so the next read repopulates instead of failing again.
                self.delete(key).await.or_log("del_corrupt", key);
                Ok(None)
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<()> {
        let raw =
            serde_json::to_string(value).map_err(|e| CacheError::InvalidValue(e.to_string()))?;
        self.client
            .set_with_ttl(&self.full_key(key), &raw, ttl)
            .await
    }

    pub async fn delete(&self, key: &str) -> CacheResult<u64> {
        self.client.del(&[self.full_key(key)]).await
    }

    pub async fn delete_many(&self, keys: &[String]) -> CacheResult<u64> {
        let full: Vec<String> = keys.iter().map(|k| self.full_key(k)).collect();
        self.client.del(&full).await
    }

    /// Delete every key matching `pattern`. Zero matches is `Ok(0)`.
    pub async fn delete_by_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let keys = self.client.keys_matching(&self.full_key(pattern)).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let n = self.client.del(&keys).await?;
        tracing::debug!(backend = self.backend_name(), pattern, deleted = n, "pattern invalidation");
        Ok(n)
    }

    /// Batched fetch. One slot per input key, in input order; missing or corrupt entries are `None`.
    pub async fn multi_get<T: DeserializeOwned>(&self, keys: &[String]) -> CacheResult<Vec<Option<T>>> {
        let full: Vec<String> = keys.iter().map(|k| self.full_key(k)).collect();
        let raws = self.client.get_many(&full).await?;

        Ok(keys
            .iter()
            .zip(raws)
            .map(|(key, raw)| raw.and_then(|raw| self.decode(key, &raw)))
            .collect())
    }

    /// Read-through: return the cached value, or compute, populate with the class TTL and return.
    ///
    /// Cache failures on either side are logged and ignored. Errors from `compute` are returned
    /// unchanged and nothing is cached for them.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        class: ResourceClass,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get::<T>(key).await.or_log("get", key).flatten() {
            tracing::debug!(backend = self.backend_name(), key, "cache hit");
            return Ok(hit);
        }
        tracing::debug!(backend = self.backend_name(), key, class = class.name(), "cache miss");

        let value = compute().await?;
        self.set(key, &value, class.ttl()).await.or_log("set", key);
        Ok(value)
    }

    // Ledger helpers. Same prefixing, no serialization.

    pub async fn hash_set(&self, key: &str, field: &str, value: &str) -> CacheResult<()> {
        self.client.hash_set(&self.full_key(key), field, value).await
    }

    pub async fn hash_get_all(
        &self,
        key: &str,
    ) -> CacheResult<std::collections::HashMap<String, String>> {
        self.client.hash_get_all(&self.full_key(key)).await
    }

    pub async fn hash_del_if_eq(&self, key: &str, entries: &[(String, String)]) -> CacheResult<u64> {
        self.client.hash_del_if_eq(&self.full_key(key), entries).await
    }

    pub async fn ping(&self) -> CacheResult<()> {
        self.client.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::MemoryClient;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Recipe {
        id: i64,
        title: String,
    }

    fn recipe(id: i64) -> Recipe {
        Recipe {
            id,
            title: format!("recipe {id}"),
        }
    }

    fn cache() -> (Cache<MemoryClient>, MemoryClient) {
        let client = MemoryClient::new();
        (Cache::new(client.clone(), ""), client)
    }

    #[tokio::test]
    async fn set_then_get_returns_the_value() {
        let (cache, _) = cache();
        cache
            .set("recipe:1", &recipe(1), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get::<Recipe>("recipe:1").await.unwrap(), Some(recipe(1)));
    }

    #[tokio::test]
    async fn get_after_delete_is_absent() {
        let (cache, _) = cache();
        cache
            .set("recipe:1", &recipe(1), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.delete("recipe:1").await.unwrap(), 1);
        assert_eq!(cache.get::<Recipe>("recipe:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_entry_reads_as_miss_and_is_dropped() {
        let (cache, client) = cache();
        client.insert_raw("recipe:1", "{not json");

        assert_eq!(cache.get::<Recipe>("recipe:1").await.unwrap(), None);
        assert_eq!(client.get_string("recipe:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn pattern_delete_with_no_matches_is_a_noop() {
        let (cache, _) = cache();
        assert_eq!(cache.delete_by_pattern("recipes:*").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn pattern_delete_only_touches_matching_keys() {
        let (cache, _) = cache();
        let ttl = Duration::from_secs(60);
        cache.set("recipes:page=1", &1, ttl).await.unwrap();
        cache.set("recipes:page=2", &2, ttl).await.unwrap();
        cache.set("recipe:1", &recipe(1), ttl).await.unwrap();

        assert_eq!(cache.delete_by_pattern("recipes:*").await.unwrap(), 2);
        assert_eq!(cache.get::<Recipe>("recipe:1").await.unwrap(), Some(recipe(1)));
    }

    #[tokio::test]
    async fn multi_get_keeps_positions_for_missing_and_corrupt_entries() {
        let (cache, client) = cache();
        let ttl = Duration::from_secs(60);
        cache.set("recipe:1", &recipe(1), ttl).await.unwrap();
        cache.set("recipe:3", &recipe(3), ttl).await.unwrap();
        client.insert_raw("recipe:4", "garbage");

        let keys: Vec<String> = (1..=4).map(|i| format!("recipe:{i}")).collect();
        let got = cache.multi_get::<Recipe>(&keys).await.unwrap();

        assert_eq!(got, vec![Some(recipe(1)), None, Some(recipe(3)), None]);
        assert!(cache.multi_get::<Recipe>(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn prefix_isolates_namespaces() {
        let client = MemoryClient::new();
        let staging = Cache::new(client.clone(), "staging");
        let prod = Cache::new(client.clone(), "prod");
        let ttl = Duration::from_secs(60);

        staging.set("recipes:page=1", &1, ttl).await.unwrap();
        prod.set("recipes:page=1", &2, ttl).await.unwrap();

        assert_eq!(staging.delete_by_pattern("recipes:*").await.unwrap(), 1);
        assert_eq!(prod.get::<i32>("recipes:page=1").await.unwrap(), Some(2));
        assert!(client.get_string("prod:recipes:page=1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn get_or_compute_populates_once() {
        let (cache, _) = cache();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let got: Result<Recipe, ()> = cache
                .get_or_compute("recipe:9", ResourceClass::RecipeDetail, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(recipe(9))
                })
                .await;
            assert_eq!(got, Ok(recipe(9)));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn compute_errors_are_returned_and_not_cached() {
        let (cache, client) = cache();

        let got: Result<Recipe, &str> = cache
            .get_or_compute("recipe:404", ResourceClass::RecipeDetail, || async {
                Err("not found")
            })
            .await;

        assert_eq!(got, Err("not found"));
        assert_eq!(client.get_string("recipe:404").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unavailable_cache_degrades_to_recompute() {
        let (cache, client) = cache();
        client.set_unavailable(true);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let got: Result<Recipe, ()> = cache
                .get_or_compute("recipe:5", ResourceClass::RecipeDetail, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(recipe(5))
                })
                .await;
            assert_eq!(got, Ok(recipe(5)));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.set("k", &1, Duration::from_secs(1)).await.is_err());
        assert!(cache.delete_by_pattern("recipes:*").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn recipe_detail_hits_until_its_ttl_elapses() {
        let (cache, _) = cache();
        let calls = AtomicUsize::new(0);
        let read = || {
            cache.get_or_compute("recipe:2", ResourceClass::RecipeDetail, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(recipe(2))
            })
        };

        read().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(3599)).await;
        read().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1, "t=3599 should hit");

        tokio::time::advance(Duration::from_secs(2)).await;
        read().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2, "t=3601 should miss and repopulate");
    }
}
