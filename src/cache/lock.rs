//! Short-TTL mutual exclusion on top of the cache.
//!
//! A lock is a `lock-process:{key}` entry written with set-if-not-exists and
//! an expiry. Its value is a token unique to the holder: release deletes the
//! entry only while it still carries that token, so a holder that outlived
//! its TTL cannot free a lock someone else has taken since.

use super::{CacheError, CacheStore, keys};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default lock lifetime.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(5);

/// Acquires and releases named locks.
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn CacheStore>,
    default_ttl: Duration,
}

impl LockManager {
    pub fn new(store: Arc<dyn CacheStore>, default_ttl: Duration) -> Self {
        Self { store, default_ttl }
    }

    /// Try to take `key`.
    ///
    /// Returns the holder token, or `None` if someone else holds the lock.
    pub async fn acquire(
        &self,
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<Option<String>, CacheError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let token = Uuid::new_v4().to_string();
        let acquired = self
            .store
            .set_nx(&keys::lock(key), token.clone(), ttl)
            .await?;
        debug!(lock = %key, acquired, ttl_ms = ttl.as_millis() as u64, "Lock acquire");
        Ok(acquired.then_some(token))
    }

    /// Release `key` held under `token`.
    ///
    /// Returns `false` if the lock expired or now belongs to someone else.
    pub async fn release(&self, key: &str, token: &str) -> Result<bool, CacheError> {
        self.store.del_if_eq(&keys::lock(key), token).await
    }

    /// Run `f` while holding `key`.
    ///
    /// Returns `Ok(None)` without running `f` when the lock is busy. The lock
    /// is released whether `f` succeeds or fails; a failed release is logged
    /// and left to the TTL.
    pub async fn with_lock<T, E, F, Fut>(&self, key: &str, f: F) -> Result<Option<T>, E>
    where
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(token) = self.acquire(key, None).await? else {
            return Ok(None);
        };

        let result = f().await;

        match self.release(key, &token).await {
            Ok(true) => {}
            Ok(false) => warn!(lock = %key, "Lock expired before release"),
            Err(e) => warn!(lock = %key, error = %e, "Failed to release lock, waiting for expiry"),
        }

        result.map(Some)
    }
}
