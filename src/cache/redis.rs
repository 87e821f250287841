//! [`CacheStore`] on a shared Redis server.
//!
//! Every relay instance pointed at the same server sees the same statuses,
//! active sets and locks. TTLs are handled by Redis (`PX`), batches run in
//! `MULTI`/`EXEC`.

use super::{CacheError, CacheOp, CacheStore};
use async_trait::async_trait;
use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::{Pool, PooledConnection};
use bb8_redis::redis::{self, RedisError};
use std::time::Duration;
use tracing::info;

/// Deletes KEYS[1] only while it holds ARGV[1].
const DEL_IF_EQ_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

fn backend(e: impl std::fmt::Display) -> CacheError {
    CacheError::Backend(e.to_string())
}

impl From<RedisError> for CacheError {
    fn from(e: RedisError) -> Self {
        backend(e)
    }
}

fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Pooled Redis-backed store.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool<RedisConnectionManager>,
}

impl RedisStore {
    /// Connect to `url` (e.g., "redis://127.0.0.1:6379").
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let manager = RedisConnectionManager::new(url)?;
        let pool = Pool::builder().build(manager).await?;
        info!(url = %url, "Redis cache connected");
        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<PooledConnection<'_, RedisConnectionManager>, CacheError> {
        self.pool.get().await.map_err(backend)
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn().await?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut *conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(millis(ttl));
        }
        let _: () = cmd.query_async(&mut *conn).await?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: String, ttl: Duration) -> Result<bool, CacheError> {
        let mut conn = self.conn().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(millis(ttl))
            .query_async(&mut *conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn del(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn().await?;
        let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut *conn).await?;
        Ok(removed > 0)
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn().await?;
        let removed: i64 = redis::cmd("EVAL")
            .arg(DEL_IF_EQ_SCRIPT)
            .arg(1)
            .arg(key)
            .arg(expected)
            .query_async(&mut *conn)
            .await?;
        Ok(removed > 0)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn().await?;
        let added: i64 = redis::cmd("SADD")
            .arg(key)
            .arg(member)
            .query_async(&mut *conn)
            .await?;
        Ok(added > 0)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn().await?;
        let removed: i64 = redis::cmd("SREM")
            .arg(key)
            .arg(member)
            .query_async(&mut *conn)
            .await?;
        Ok(removed > 0)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn().await?;
        let members: Vec<String> = redis::cmd("SMEMBERS").arg(key).query_async(&mut *conn).await?;
        Ok(members)
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn().await?;
        let present: bool = redis::cmd("SISMEMBER")
            .arg(key)
            .arg(member)
            .query_async(&mut *conn)
            .await?;
        Ok(present)
    }

    async fn exec(&self, ops: Vec<CacheOp>) -> Result<(), CacheError> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in &ops {
            match op {
                CacheOp::Set { key, value } => pipe.cmd("SET").arg(key).arg(value).ignore(),
                CacheOp::Del { key } => pipe.cmd("DEL").arg(key).ignore(),
                CacheOp::SAdd { key, member } => pipe.cmd("SADD").arg(key).arg(member).ignore(),
                CacheOp::SRem { key, member } => pipe.cmd("SREM").arg(key).arg(member).ignore(),
            };
        }
        let mut conn = self.conn().await?;
        let _: () = pipe.query_async(&mut *conn).await?;
        Ok(())
    }

    /// Drops the whole logical database the store points at.
    async fn flush(&self) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("FLUSHDB").query_async(&mut *conn).await?;
        Ok(())
    }
}
