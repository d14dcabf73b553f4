use crate::adapters::redis::RedisClient;
use redis::AsyncCommands;
use std::sync::Arc;

/// Prefixed key/value store where every write expires after a fixed TTL.
#[derive(Debug, Clone)]
pub struct RedisCache {
    redis: Arc<RedisClient>,
    prefix: String,
    ttl_secs: u64,
}

impl RedisCache {
    #[must_use]
    pub const fn new(redis: Arc<RedisClient>, prefix: String, ttl_secs: u64) -> Self {
        Self { redis, prefix, ttl_secs }
    }

    /// Retrieves a cached value for a key.
    ///
    /// # Errors
    /// Returns an error if the Redis operation fails.
    pub async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let mut conn = self.redis.connection();
        let full_key = format!("{}{key}", self.prefix);
        let value: Option<Vec<u8>> = conn.get(full_key).await?;
        Ok(value)
    }

    /// Saves a value for a key with the cache's configured TTL.
    ///
    /// # Errors
    /// Returns an error if the Redis operation fails.
    pub async fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        let mut conn = self.redis.connection();
        let full_key = format!("{}{key}", self.prefix);
        let _: () = conn.set_ex(full_key, value, self.ttl_secs).await?;
        Ok(())
    }

    /// Reads a counter, treating a missing key as zero. Counters do not expire.
    ///
    /// # Errors
    /// Returns an error if the Redis operation fails.
    pub async fn counter(&self, key: &str) -> anyhow::Result<u64> {
        let mut conn = self.redis.connection();
        let full_key = format!("{}{key}", self.prefix);
        let value: Option<u64> = conn.get(full_key).await?;
        Ok(value.unwrap_or(0))
    }

    /// Increments a counter and returns the new value.
    ///
    /// # Errors
    /// Returns an error if the Redis operation fails.
    pub async fn increment(&self, key: &str) -> anyhow::Result<u64> {
        let mut conn = self.redis.connection();
        let full_key = format!("{}{key}", self.prefix);
        let value: u64 = conn.incr(full_key, 1).await?;
        Ok(value)
    }
}
