//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use std::net::SocketAddr;

// =============================================================================
// Storage Defaults
// =============================================================================

pub fn default_database_path() -> String {
    "anonrelay.db".to_string()
}

pub fn default_lock_ttl_secs() -> u64 {
    5
}

pub fn default_cache_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

// =============================================================================
// HTTP Defaults
// =============================================================================

pub fn default_http_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

// =============================================================================
// Queue Defaults
// =============================================================================

pub fn default_queue_url() -> String {
    "http://localhost:15672".to_string()
}

pub fn default_vhost() -> String {
    "/".to_string()
}

pub fn default_queue_name() -> String {
    "message_send_queue".to_string()
}

pub fn default_routing_key() -> String {
    "message.send".to_string()
}

pub fn default_message_ttl_ms() -> u64 {
    60_000
}

pub fn default_dead_letter_exchange() -> String {
    "dlx_exchange".to_string()
}

pub fn default_dead_letter_routing_key() -> String {
    "dlx_routing_key".to_string()
}

pub fn default_guest() -> String {
    "guest".to_string()
}

// =============================================================================
// Limits Defaults
// =============================================================================

pub fn default_username_max_len() -> usize {
    32
}

pub fn default_rooms_page_size() -> u64 {
    10
}
