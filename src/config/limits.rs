//! Input and listing limits configuration.

use super::defaults::{default_rooms_page_size, default_username_max_len};
use serde::Deserialize;

/// Input and listing limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Longest accepted room username, in characters (default: 32).
    #[serde(default = "default_username_max_len")]
    pub username_max_len: usize,
    /// Rooms per `/rooms` page (default: 10).
    #[serde(default = "default_rooms_page_size")]
    pub rooms_page_size: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            username_max_len: default_username_max_len(),
            rooms_page_size: default_rooms_page_size(),
        }
    }
}
