//! Redis-backed distributed tier.
//!
//! Every command runs through the store's own `RetryPolicy`, so a dropped
//! connection or a slow server is retried here before the cascade ever sees
//! an error.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;

use crate::cache::distributed::KeyValueStore;
use crate::cache::error::{StoreError, StoreResult};
use crate::resilience::RetryPolicy;

/// Pooled Redis client.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    retry: RetryPolicy,
}

impl RedisStore {
    /// Build the pool. Connections are opened lazily on first use.
    pub fn connect(url: &str, retry: RetryPolicy) -> StoreResult<Self> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::Connection(format!("failed to create Redis pool: {e}")))?;

        tracing::info!("Redis pool created");
        Ok(Self { pool, retry })
    }

    async fn conn(&self) -> StoreResult<Connection> {
        Ok(self.pool.get().await?)
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.retry
            .run("redis.get", |_| async move {
                let mut conn = self.conn().await?;
                Ok(conn.get::<_, Option<String>>(key).await?)
            })
            .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        self.retry
            .run("redis.set", |_| async move {
                let mut conn = self.conn().await?;
                match ttl {
                    Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl)).await?,
                    None => conn.set::<_, _, ()>(key, value).await?,
                }
                Ok(())
            })
            .await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.retry
            .run("redis.del", |_| async move {
                let mut conn = self.conn().await?;
                let removed: u64 = conn.del(key).await?;
                Ok(removed > 0)
            })
            .await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.retry
            .run("redis.exists", |_| async move {
                let mut conn = self.conn().await?;
                Ok(conn.exists::<_, bool>(key).await?)
            })
            .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.retry
            .run("redis.expire", |_| async move {
                let mut conn = self.conn().await?;
                Ok(conn.expire::<_, bool>(key, ttl_secs(ttl) as i64).await?)
            })
            .await
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        self.retry
            .run("redis.ttl", |_| async move {
                let mut conn = self.conn().await?;
                // -2: missing, -1: no expiry
                let secs: i64 = conn.ttl(key).await?;
                Ok((secs >= 0).then(|| Duration::from_secs(secs as u64)))
            })
            .await
    }

    async fn increment(&self, key: &str, by: i64) -> StoreResult<i64> {
        self.retry
            .run("redis.incrby", |_| async move {
                let mut conn = self.conn().await?;
                Ok(conn.incr::<_, _, i64>(key, by).await?)
            })
            .await
    }

    async fn get_many(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.retry
            .run("redis.mget", |_| async move {
                let mut conn = self.conn().await?;
                let values: Vec<Option<String>> = redis::cmd("MGET").arg(keys.to_vec()).query_async(&mut conn).await?;
                Ok(values)
            })
            .await
    }

    async fn set_many(&self, entries: &[(String, String)], ttl: Option<Duration>) -> StoreResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.retry
            .run("redis.set_many", |_| async move {
                let mut conn = self.conn().await?;
                let mut pipe = redis::pipe();
                pipe.atomic();
                for (key, value) in entries {
                    match ttl {
                        Some(ttl) => pipe.set_ex(key, value, ttl_secs(ttl)).ignore(),
                        None => pipe.set(key, value).ignore(),
                    };
                }
                let _: () = pipe.query_async(&mut conn).await?;
                Ok(())
            })
            .await
    }

    async fn flush(&self) -> StoreResult<()> {
        self.retry
            .run("redis.flushdb", |_| async move {
                let mut conn = self.conn().await?;
                let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
                Ok(())
            })
            .await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.retry
            .run("redis.ping", |_| async move {
                let mut conn = self.conn().await?;
                let _: String = redis::cmd("PING").query_async(&mut conn).await?;
                Ok(())
            })
            .await
    }
}
