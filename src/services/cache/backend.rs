//! Runtime choice of cache backend.
//!
//! `CacheClient` is `Clone`-bound and therefore not object safe, so the backend selected by
//! configuration is carried as an enum.
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};
use crate::services::cache::{MemoryClient, ValkeyClient};

#[derive(Clone, Debug)]
pub enum CacheBackend {
    Valkey(ValkeyClient),
    Memory(MemoryClient),
    /// No store: every call fails, so reads always recompute and likes write through.
    Disabled,
}

fn disabled() -> CacheError {
    CacheError::BackendConnection("cache disabled".into())
}

#[async_trait]
impl CacheClient for CacheBackend {
    fn backend_name(&self) -> &'static str {
        match self {
            CacheBackend::Valkey(c) => c.backend_name(),
            CacheBackend::Memory(c) => c.backend_name(),
            CacheBackend::Disabled => "disabled",
        }
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        match self {
            CacheBackend::Valkey(c) => c.get_string(key).await,
            CacheBackend::Memory(c) => c.get_string(key).await,
            CacheBackend::Disabled => Err(disabled()),
        }
    }

    async fn get_many(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        match self {
            CacheBackend::Valkey(c) => c.get_many(keys).await,
            CacheBackend::Memory(c) => c.get_many(keys).await,
            CacheBackend::Disabled => Err(disabled()),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        match self {
            CacheBackend::Valkey(c) => c.set_with_ttl(key, value, ttl).await,
            CacheBackend::Memory(c) => c.set_with_ttl(key, value, ttl).await,
            CacheBackend::Disabled => Err(disabled()),
        }
    }

    async fn del(&self, keys: &[String]) -> CacheResult<u64> {
        match self {
            CacheBackend::Valkey(c) => c.del(keys).await,
            CacheBackend::Memory(c) => c.del(keys).await,
            CacheBackend::Disabled => Err(disabled()),
        }
    }

    async fn keys_matching(&self, pattern: &str) -> CacheResult<Vec<String>> {
        match self {
            CacheBackend::Valkey(c) => c.keys_matching(pattern).await,
            CacheBackend::Memory(c) => c.keys_matching(pattern).await,
            CacheBackend::Disabled => Err(disabled()),
        }
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> CacheResult<()> {
        match self {
            CacheBackend::Valkey(c) => c.hash_set(key, field, value).await,
            CacheBackend::Memory(c) => c.hash_set(key, field, value).await,
            CacheBackend::Disabled => Err(disabled()),
        }
    }

    async fn hash_get_all(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        match self {
            CacheBackend::Valkey(c) => c.hash_get_all(key).await,
            CacheBackend::Memory(c) => c.hash_get_all(key).await,
            CacheBackend::Disabled => Err(disabled()),
        }
    }

    async fn hash_del_if_eq(&self, key: &str, entries: &[(String, String)]) -> CacheResult<u64> {
        match self {
            CacheBackend::Valkey(c) => c.hash_del_if_eq(key, entries).await,
            CacheBackend::Memory(c) => c.hash_del_if_eq(key, entries).await,
            CacheBackend::Disabled => Err(disabled()),
        }
    }

    async fn ping(&self) -> CacheResult<()> {
        match self {
            CacheBackend::Valkey(c) => c.ping().await,
            CacheBackend::Memory(c) => c.ping().await,
            CacheBackend::Disabled => Err(disabled()),
        }
    }
}
