//! Relay session state.
//!
//! [`Relay`] bundles everything a handler touches: the directory, the state
//! cache, the lock manager, the delivery producer and the settings. It is
//! built once at start-up and cloned into every intent task.

mod status;

pub use status::{ConversationStatus, NewRoomStage, derive_status};

use crate::cache::{CacheStore, LockManager, StateCache};
use crate::config::Config;
use crate::db::Database;
use crate::delivery::DeliveryProducer;
use crate::error::HandlerResult;
use crate::intent::Intent;
use std::sync::Arc;
use std::time::Duration;

/// Settings handlers read on every intent.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub bot_token: String,
    pub bot_url: String,
    pub username_max_len: usize,
    pub rooms_page_size: u64,
}

impl RelaySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            bot_token: config.bot.token.clone(),
            bot_url: config.bot.url.clone(),
            username_max_len: config.limits.username_max_len,
            rooms_page_size: config.limits.rooms_page_size,
        }
    }
}

/// Shared relay state.
#[derive(Clone)]
pub struct Relay {
    pub db: Database,
    pub cache: StateCache,
    pub locks: LockManager,
    pub producer: DeliveryProducer,
    pub settings: Arc<RelaySettings>,
}

impl Relay {
    pub fn new(
        db: Database,
        store: Arc<dyn CacheStore>,
        lock_ttl: Duration,
        producer: DeliveryProducer,
        settings: RelaySettings,
    ) -> Self {
        Self {
            cache: StateCache::new(store.clone(), db.clone()),
            locks: LockManager::new(store, lock_ttl),
            db,
            producer,
            settings: Arc::new(settings),
        }
    }

    /// Handle one inbound intent end to end.
    ///
    /// Failures are answered with a single reply to the user and returned
    /// for logging.
    pub async fn handle(&self, intent: Intent) -> HandlerResult {
        crate::handlers::dispatch(self, intent).await
    }
}
