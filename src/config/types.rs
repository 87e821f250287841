//! Core configuration types and loading.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::defaults::{
    default_cache_url, default_database_path, default_http_listen, default_lock_ttl_secs,
};
use super::limits::LimitsConfig;
use super::queue::QueueConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bot identity.
    pub bot: BotConfig,
    /// Directory database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache and lock configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Delivery queue configuration.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Intent intake and metrics endpoint.
    #[serde(default)]
    pub http: HttpConfig,
    /// Input and listing limits.
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Bot identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Platform token, copied into every outbound envelope.
    pub token: String,
    /// Public bot link (e.g., "https://t.me/anon_bot"), used for room share links.
    pub url: String,
    /// Platform ids granted admin rights at start-up. Admins can promote
    /// others with `/new_admin`, so one is enough to bootstrap.
    #[serde(default)]
    pub admins: Vec<String>,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file, or ":memory:".
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Which store holds statuses, active sets and locks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// In-process store. Only valid for a single relay instance.
    #[default]
    Memory,
    /// Shared Redis server.
    Redis,
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    /// Redis URL, used by the `redis` backend (default: "redis://127.0.0.1:6379").
    #[serde(default = "default_cache_url")]
    pub url: String,
    /// Lifetime of a lock that is never released (default: 5).
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
}

impl CacheConfig {
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            url: default_cache_url(),
            lock_ttl_secs: default_lock_ttl_secs(),
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Address to bind to (default: "0.0.0.0:8080").
    #[serde(default = "default_http_listen")]
    pub listen: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_http_listen(),
        }
    }
}
