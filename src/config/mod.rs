//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, BotConfig, CacheConfig, HttpConfig, ...)
//! - [`queue`]: Delivery broker configuration (QueueConfig, QueueBackend)
//! - [`limits`]: Input and listing limits (LimitsConfig)
//! - [`validation`]: Start-up checks, all errors reported at once

mod defaults;
mod limits;
mod queue;
mod types;
pub mod validation;

pub use limits::LimitsConfig;
pub use queue::{QueueBackend, QueueConfig};
pub use types::{
    BotConfig, CacheBackend, CacheConfig, Config, ConfigError, DatabaseConfig, HttpConfig,
};
pub use validation::{ValidationError, validate};
