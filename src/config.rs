/*
 * Responsibility
 * - 環境変数や設定の読み込み (DATABASE_URL, CORS 許可、キャッシュ接続、like flush 間隔など)
 * - 設定値のバリデーション (不足なら起動失敗)
 * - 読み込みは lookup 関数経由 (テストでプロセス環境を汚さない)
 */
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Valkey,
    Memory,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub tls: bool,
    pub key_prefix: String,
    pub op_timeout: Duration,
}

impl CacheConfig {
    /// `redis://` or `rediss://` URL for the redis client. The password is percent-encoded.
    pub fn connection_url(&self) -> Result<String, ConfigError> {
        let scheme = if self.tls { "rediss" } else { "redis" };
        let mut url = Url::parse(&format!("{scheme}://localhost"))
            .map_err(|_| ConfigError::Invalid("CACHE_HOST"))?;
        url.set_host(Some(&self.host))
            .map_err(|_| ConfigError::Invalid("CACHE_HOST"))?;
        url.set_port(Some(self.port))
            .map_err(|_| ConfigError::Invalid("CACHE_PORT"))?;
        if let Some(password) = &self.password {
            url.set_password(Some(password))
                .map_err(|_| ConfigError::Invalid("CACHE_PASSWORD"))?;
        }
        Ok(url.to_string())
    }
}

pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub run_migrations: bool,

    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,
    pub request_timeout: Duration,

    pub sqids_min_length: usize,
    pub sqids_alphabet: String,

    pub cache: CacheConfig,
    pub like_flush_interval: Duration,
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid(key)),
        },
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port: u16 = parse_or(&lookup, "PORT", 3000)?;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let database_max_connections: u32 = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;
        if database_max_connections == 0 {
            return Err(ConfigError::Invalid("DATABASE_MAX_CONNECTIONS"));
        }
        let run_migrations = parse_bool(&lookup, "RUN_MIGRATIONS", true)?;

        let app_env = AppEnv::parse(lookup("APP_ENV"));

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let request_timeout = Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?);

        let sqids_min_length: usize = parse_or(&lookup, "SQIDS_MIN_LENGTH", 10)?;
        let sqids_alphabet = lookup("SQIDS_ALPHABET").unwrap_or_else(|| {
            "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789".to_string()
        });

        let backend = match lookup("CACHE_BACKEND")
            .unwrap_or_else(|| "valkey".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "valkey" | "redis" => CacheBackendKind::Valkey,
            "memory" => CacheBackendKind::Memory,
            "disabled" | "none" | "off" => CacheBackendKind::Disabled,
            _ => return Err(ConfigError::Invalid("CACHE_BACKEND")),
        };

        let key_prefix = lookup("CACHE_KEY_PREFIX").unwrap_or_default();
        // The prefix ends up inside SCAN patterns, so glob metacharacters are not allowed.
        if !key_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
        {
            return Err(ConfigError::Invalid("CACHE_KEY_PREFIX"));
        }

        let op_timeout_ms: u64 = parse_or(&lookup, "CACHE_TIMEOUT_MS", 250)?;
        if op_timeout_ms == 0 {
            return Err(ConfigError::Invalid("CACHE_TIMEOUT_MS"));
        }

        let cache = CacheConfig {
            backend,
            host: lookup("CACHE_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_or(&lookup, "CACHE_PORT", 6379)?,
            password: lookup("CACHE_PASSWORD").filter(|p| !p.is_empty()),
            tls: parse_bool(&lookup, "CACHE_TLS", false)?,
            key_prefix,
            op_timeout: Duration::from_millis(op_timeout_ms),
        };

        let like_flush_secs: u64 = parse_or(&lookup, "LIKE_FLUSH_INTERVAL_SECS", 300)?;
        if like_flush_secs == 0 {
            return Err(ConfigError::Invalid("LIKE_FLUSH_INTERVAL_SECS"));
        }

        Ok(Self {
            addr,
            database_url,
            database_max_connections,
            run_migrations,
            app_env,
            cors_allowed_origins,
            request_timeout,
            sqids_min_length,
            sqids_alphabet,
            cache,
            like_flush_interval: Duration::from_secs(like_flush_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_with_only_database_url() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/recipes")]).unwrap();
        assert_eq!(config.addr.port(), 3000);
        assert_eq!(config.database_max_connections, 10);
        assert!(config.run_migrations);
        assert_eq!(config.app_env, AppEnv::Development);
        assert_eq!(config.cache.backend, CacheBackendKind::Valkey);
        assert_eq!(config.cache.op_timeout, Duration::from_millis(250));
        assert_eq!(config.like_flush_interval, Duration::from_secs(300));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn database_url_is_required() {
        assert_eq!(load(&[]).err(), Some(ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn bad_values_name_the_variable() {
        let base = ("DATABASE_URL", "postgres://x");
        assert_eq!(
            load(&[base, ("PORT", "eighty")]).err(),
            Some(ConfigError::Invalid("PORT"))
        );
        assert_eq!(
            load(&[base, ("CACHE_BACKEND", "memcached")]).err(),
            Some(ConfigError::Invalid("CACHE_BACKEND"))
        );
        assert_eq!(
            load(&[base, ("CACHE_KEY_PREFIX", "prod*")]).err(),
            Some(ConfigError::Invalid("CACHE_KEY_PREFIX"))
        );
        assert_eq!(
            load(&[base, ("LIKE_FLUSH_INTERVAL_SECS", "0")]).err(),
            Some(ConfigError::Invalid("LIKE_FLUSH_INTERVAL_SECS"))
        );
    }

    #[test]
    fn connection_url_carries_tls_and_encoded_password() {
        let config = load(&[
            ("DATABASE_URL", "postgres://x"),
            ("CACHE_HOST", "cache.internal"),
            ("CACHE_PORT", "6380"),
            ("CACHE_PASSWORD", "p@ss word"),
            ("CACHE_TLS", "true"),
        ])
        .unwrap();

        let url = config.cache.connection_url().unwrap();
        assert!(url.starts_with("rediss://"), "{url}");
        assert!(url.contains("cache.internal:6380"), "{url}");
        assert!(url.contains("p%40ss%20word@"), "{url}");
    }
}
