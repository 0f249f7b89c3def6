use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};

// SCAN page size hint.
const SCAN_COUNT: u64 = 500;

// Removes each (field, value) pair only while the stored value is unchanged.
// KEYS[1] = hash, ARGV = field1, value1, field2, value2, ...
const HDEL_IF_EQ_SCRIPT: &str = r#"
local removed = 0
for i = 1, #ARGV, 2 do
    if redis.call('HGET', KEYS[1], ARGV[i]) == ARGV[i + 1] then
        removed = removed + redis.call('HDEL', KEYS[1], ARGV[i])
    end
end
return removed
"#;

/// Valkey/Redis-backend cache client.
///
/// Every command is bounded by `op_timeout`; an elapsed timeout surfaces as
/// `CacheError::Timeout` and is handled like any other backend failure.
#[derive(Clone)]
pub struct ValkeyClient {
    manager: redis::aio::ConnectionManager,
    op_timeout: Duration,
}

impl std::fmt::Debug for ValkeyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValkeyClient")
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

impl ValkeyClient {
    // Create a Valkey client from a URL like `redis://localhost:6379`
    pub async fn new(url: &str, op_timeout: Duration) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        // The first connection is awaited eagerly; bound it like everything else.
        let manager = tokio::time::timeout(op_timeout * 4, client.get_connection_manager())
            .await
            .map_err(|_| CacheError::Timeout(op_timeout * 4))?
            .map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        Ok(Self {
            manager,
            op_timeout,
        })
    }

    async fn query<T: redis::FromRedisValue>(&self, cmd: &redis::Cmd) -> CacheResult<T> {
        // Use a clone of the connection manager
        let mut conn = self.manager.clone();

        match tokio::time::timeout(self.op_timeout, cmd.query_async::<T>(&mut conn)).await {
            Ok(res) => res.map_err(|e| CacheError::BackendCommand(e.to_string())),
            Err(_) => Err(CacheError::Timeout(self.op_timeout)),
        }
    }
}

#[async_trait]
impl CacheClient for ValkeyClient {
    fn backend_name(&self) -> &'static str {
        "valkey"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.query(&cmd).await
    }

    async fn get_many(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        // MGET without arguments is a protocol error.
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut cmd = redis::cmd("MGET");
        for key in keys {
            cmd.arg(key);
        }
        let values: Vec<Option<String>> = self.query(&cmd).await?;

        if values.len() != keys.len() {
            return Err(CacheError::InvalidValue(format!(
                "MGET returned {} values for {} keys",
                values.len(),
                keys.len()
            )));
        }
        Ok(values)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        // EX expects integer seconds. We clamp to at least 1 sec.
        let ttl_seconds: u64 = ttl.as_secs().max(1);

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("EX").arg(ttl_seconds);
        let _: Option<String> = self.query(&cmd).await?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(key);
        }
        self.query(&cmd).await
    }

    async fn keys_matching(&self, pattern: &str) -> CacheResult<Vec<String>> {
        // SCAN may return a key more than once across pages.
        let mut found = BTreeSet::new();
        let mut cursor: u64 = 0;

        loop {
            let mut cmd = redis::cmd("SCAN");
            cmd.arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT);
            let (next, keys): (u64, Vec<String>) = self.query(&cmd).await?;

            found.extend(keys);

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(found.into_iter().collect())
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> CacheResult<()> {
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key).arg(field).arg(value);
        let _: i64 = self.query(&cmd).await?;
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        let mut cmd = redis::cmd("HGETALL");
        cmd.arg(key);
        self.query(&cmd).await
    }

    async fn hash_del_if_eq(&self, key: &str, entries: &[(String, String)]) -> CacheResult<u64> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut cmd = redis::cmd("EVAL");
        cmd.arg(HDEL_IF_EQ_SCRIPT).arg(1).arg(key);
        for (field, value) in entries {
            cmd.arg(field).arg(value);
        }
        self.query(&cmd).await
    }

    async fn ping(&self) -> CacheResult<()> {
        let pong: String = self.query(&redis::cmd("PING")).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(CacheError::InvalidValue(format!("unexpected PING reply: {pong}")))
        }
    }
}
