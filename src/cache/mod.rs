//! Ephemeral state cache.
//!
//! Everything stored here can be dropped at any time: statuses are rebuilt
//! from the directory on a miss, room snapshots are re-read, locks expire.
//!
//! - [`CacheStore`]: key/value + set primitives (the Redis-shaped seam)
//! - [`MemoryStore`]: in-process store for single-instance runs and tests
//! - [`RedisStore`]: shared store, required once more than one relay runs
//! - [`codec`]: JSON encoding with ISO-8601 timestamp recognition
//! - [`LockManager`]: short-TTL set-if-not-exists locks
//! - [`StateCache`]: statuses, active member sets, snapshots, room drafts

pub mod codec;
mod lock;
mod memory;
mod redis;
mod state;

pub use lock::LockManager;
pub use memory::MemoryStore;
pub use redis::RedisStore;
pub use state::{RoomDraft, StateCache};

use crate::db::DbError;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("key {0} holds a value of the wrong type")]
    WrongType(String),
    #[error("cache codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("malformed timestamp in cached value: {0}")]
    InvalidTimestamp(String),
    #[error("unknown conversation status: {0}")]
    UnknownStatus(String),
    #[error("directory error during reconciliation: {0}")]
    Directory(#[from] DbError),
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// One write inside an atomic [`CacheStore::exec`] batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOp {
    Set { key: String, value: String },
    Del { key: String },
    SAdd { key: String, member: String },
    SRem { key: String, member: String },
}

/// Key/value and set primitives of the backing store.
///
/// Single calls are atomic; [`exec`](CacheStore::exec) applies a batch with
/// no interleaving from other writers.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Set `key` only if it does not exist. Returns `true` when the value was written.
    async fn set_nx(&self, key: &str, value: String, ttl: Duration) -> Result<bool, CacheError>;

    /// Remove `key`. Returns `true` when something was removed.
    async fn del(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove `key` only while it still holds `expected`.
    async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool, CacheError>;

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, CacheError>;

    async fn srem(&self, key: &str, member: &str) -> Result<bool, CacheError>;

    async fn smembers(&self, key: &str) -> Result<Vec<String>, CacheError>;

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, CacheError>;

    async fn exec(&self, ops: Vec<CacheOp>) -> Result<(), CacheError>;

    /// Drop everything (eviction, restart).
    async fn flush(&self) -> Result<(), CacheError>;
}

/// Cache key namespace.
pub mod keys {
    /// `user-status:{userId}` or, scoped to a room, `user-status:{roomId}:{userId}`.
    pub fn user_status(scope: Option<&str>, user_id: &str) -> String {
        match scope {
            Some(room_id) => format!("user-status:{room_id}:{user_id}"),
            None => format!("user-status:{user_id}"),
        }
    }

    pub fn room_active_users(room_id: &str) -> String {
        format!("room-active-users:{room_id}")
    }

    pub fn participant_data(room_id: &str, user_id: &str) -> String {
        format!("participant-data:{room_id}:{user_id}")
    }

    pub fn room_draft(user_id: &str) -> String {
        format!("room-draft:{user_id}")
    }

    pub fn lock(key: &str) -> String {
        format!("lock-process:{key}")
    }

    /// Marker for an inbound message that has already been handled.
    pub fn intent_seen(user_id: &str, message_id: &str) -> String {
        format!("intent-seen:{user_id}:{message_id}")
    }
}
