//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::{CacheBackend, Config, QueueBackend};
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("bot.token is required")]
    MissingBotToken,
    #[error("bot.url must be an http(s) URL, got '{0}'")]
    InvalidBotUrl(String),
    #[error("bot.admins entries must not be blank")]
    BlankAdminId,
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
    #[error("cache.lock_ttl_secs must be at least 1")]
    ZeroLockTtl,
    #[error("cache.url must be a redis:// or rediss:// URL, got '{0}'")]
    InvalidCacheUrl(String),
    #[error("queue.url must be an http(s) URL, got '{0}'")]
    InvalidQueueUrl(String),
    #[error("queue.queue is required")]
    MissingQueueName,
    #[error("queue.routing_key is required")]
    MissingRoutingKey,
    #[error("queue.message_ttl_ms must be at least 1")]
    ZeroMessageTtl,
    #[error("limits.username_max_len must be at least 1")]
    ZeroUsernameLength,
    #[error("limits.rooms_page_size must be at least 1")]
    ZeroPageSize,
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Bot identity
    if config.bot.token.trim().is_empty() {
        errors.push(ValidationError::MissingBotToken);
    }
    if !is_http_url(&config.bot.url) {
        errors.push(ValidationError::InvalidBotUrl(config.bot.url.clone()));
    }
    if config.bot.admins.iter().any(|id| id.trim().is_empty()) {
        errors.push(ValidationError::BlankAdminId);
    }

    // Database path validation
    if config.database.path != ":memory:" {
        let db_path = Path::new(&config.database.path);
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            errors.push(ValidationError::DatabasePathInvalid(config.database.path.clone()));
        }
    }

    if config.cache.lock_ttl_secs == 0 {
        errors.push(ValidationError::ZeroLockTtl);
    }
    if config.cache.backend == CacheBackend::Redis
        && !(config.cache.url.starts_with("redis://") || config.cache.url.starts_with("rediss://"))
    {
        errors.push(ValidationError::InvalidCacheUrl(config.cache.url.clone()));
    }

    // Queue
    let queue = &config.queue;
    if queue.backend == QueueBackend::ManagementApi && !is_http_url(&queue.url) {
        errors.push(ValidationError::InvalidQueueUrl(queue.url.clone()));
    }
    if queue.queue.trim().is_empty() {
        errors.push(ValidationError::MissingQueueName);
    }
    if queue.routing_key.trim().is_empty() {
        errors.push(ValidationError::MissingRoutingKey);
    }
    if queue.message_ttl_ms == 0 {
        errors.push(ValidationError::ZeroMessageTtl);
    }

    // Limits
    if config.limits.username_max_len == 0 {
        errors.push(ValidationError::ZeroUsernameLength);
    }
    if config.limits.rooms_page_size == 0 {
        errors.push(ValidationError::ZeroPageSize);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_valid_config() -> String {
        r#"
[bot]
token = "123:abc"
url = "https://t.me/anon_bot"

[database]
path = ":memory:"
"#
        .to_string()
    }

    #[test]
    fn test_valid_config_passes() {
        let config: Config = toml::from_str(&minimal_valid_config()).unwrap();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_token_fails() {
        let toml = r#"
[bot]
token = " "
url = "https://t.me/anon_bot"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MissingBotToken)));
    }

    #[test]
    fn test_all_errors_are_reported() {
        let toml = r#"
[bot]
token = ""
url = "t.me/anon_bot"

[database]
path = "/nonexistent/dir/relay.db"

[queue]
backend = "management_api"
url = "amqp://localhost"
message_ttl_ms = 0

[limits]
rooms_page_size = 0
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidBotUrl(_))));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DatabasePathInvalid(_))));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidQueueUrl(_))));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::ZeroMessageTtl)));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::ZeroPageSize)));
    }

    #[test]
    fn test_blank_admin_and_bad_cache_url_fail() {
        let toml = r#"
[bot]
token = "123:abc"
url = "https://t.me/anon_bot"
admins = ["42", "  "]

[cache]
backend = "redis"
url = "http://cache:6379"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::BlankAdminId)));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidCacheUrl(_))));
    }

    #[test]
    fn test_cache_url_ignored_for_memory_backend() {
        let toml = r#"
[bot]
token = "123:abc"
url = "https://t.me/anon_bot"

[cache]
url = "not-a-url"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(validate(&config).is_ok());
    }
}
