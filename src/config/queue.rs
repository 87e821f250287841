//! Delivery broker configuration.

use super::defaults::{
    default_dead_letter_exchange, default_dead_letter_routing_key, default_guest,
    default_message_ttl_ms, default_queue_name, default_queue_url, default_routing_key,
    default_vhost,
};
use serde::Deserialize;
use std::time::Duration;

/// Which broker implementation the producer publishes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueBackend {
    /// In-process queue. Nothing leaves the process.
    #[default]
    Memory,
    /// RabbitMQ through its HTTP management API.
    ManagementApi,
}

/// Delivery queue configuration.
///
/// The queue is declared durable with a per-message TTL; expired messages
/// are dead-lettered to `dead_letter_exchange` / `dead_letter_routing_key`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub backend: QueueBackend,
    /// Management API base URL (default: "http://localhost:15672").
    #[serde(default = "default_queue_url")]
    pub url: String,
    #[serde(default = "default_vhost")]
    pub vhost: String,
    /// Exchange to publish to. Empty means the default exchange.
    #[serde(default)]
    pub exchange: String,
    #[serde(default = "default_queue_name")]
    pub queue: String,
    #[serde(default = "default_routing_key")]
    pub routing_key: String,
    #[serde(default = "default_message_ttl_ms")]
    pub message_ttl_ms: u64,
    #[serde(default = "default_dead_letter_exchange")]
    pub dead_letter_exchange: String,
    #[serde(default = "default_dead_letter_routing_key")]
    pub dead_letter_routing_key: String,
    #[serde(default = "default_guest")]
    pub username: String,
    #[serde(default = "default_guest")]
    pub password: String,
}

impl QueueConfig {
    pub fn message_ttl(&self) -> Duration {
        Duration::from_millis(self.message_ttl_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::default(),
            url: default_queue_url(),
            vhost: default_vhost(),
            exchange: String::new(),
            queue: default_queue_name(),
            routing_key: default_routing_key(),
            message_ttl_ms: default_message_ttl_ms(),
            dead_letter_exchange: default_dead_letter_exchange(),
            dead_letter_routing_key: default_dead_letter_routing_key(),
            username: default_guest(),
            password: default_guest(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_delivery_contract() {
        let queue = QueueConfig::default();
        assert_eq!(queue.backend, QueueBackend::Memory);
        assert_eq!(queue.routing_key, "message.send");
        assert_eq!(queue.message_ttl(), Duration::from_secs(60));
        assert_eq!(queue.dead_letter_exchange, "dlx_exchange");
        assert_eq!(queue.dead_letter_routing_key, "dlx_routing_key");
    }

    #[test]
    fn backend_parses_snake_case() {
        let queue: QueueConfig = toml::from_str(r#"backend = "management_api""#).unwrap();
        assert_eq!(queue.backend, QueueBackend::ManagementApi);
    }
}
