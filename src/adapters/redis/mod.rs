use crate::config::CacheConfig;
use backon::{ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;

pub mod cache;

pub use cache::RedisCache;

#[derive(Debug)]
pub struct RedisClient {
    connection: redis::aio::ConnectionManager,
}

impl RedisClient {
    /// Connects to Redis, retrying with exponential backoff.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or every connection attempt fails.
    pub async fn connect(url: &str, config: &CacheConfig) -> anyhow::Result<Arc<Self>> {
        let client = redis::Client::open(url)?;

        let retry_strategy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(config.min_backoff_ms))
            .with_max_times(config.connect_retries);

        let connection = (|| {
            let client = client.clone();
            async move { client.get_connection_manager().await }
        })
        .retry(retry_strategy)
        .notify(|e, duration| {
            tracing::warn!(error = %e, retry_in = ?duration, "Cache connection failed, retrying");
        })
        .await?;

        tracing::info!("Connected to cache");
        Ok(Arc::new(Self { connection }))
    }

    /// Returns a connection handle. Handles are cheap clones of one multiplexed connection.
    #[must_use]
    pub fn connection(&self) -> redis::aio::ConnectionManager {
        self.connection.clone()
    }

    /// Checks connectivity.
    ///
    /// # Errors
    /// Returns an error if the ping fails.
    pub async fn ping(&self) -> anyhow::Result<()> {
        let mut conn = self.connection();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}
