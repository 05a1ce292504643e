use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::time::timeout;

use super::{Cache, CacheError};
use crate::monitor::OPERATION_TIMEOUT;

#[derive(Clone)]
pub struct RedisCache {
    redis: ConnectionManager,
}

impl RedisCache {
    /// Connects and sends a PING. Fails if either step does not complete
    /// within [`OPERATION_TIMEOUT`].
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let mut manager = bounded(ConnectionManager::new(client)).await?;
        let _pong: String = bounded(redis::cmd("PING").query_async(&mut manager)).await?;
        log::info!("Connected to Redis");
        Ok(Self { redis: manager })
    }
}

async fn bounded<T, F>(call: F) -> Result<T, CacheError>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    match timeout(OPERATION_TIMEOUT, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(CacheError::Timeout(OPERATION_TIMEOUT)),
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut redis = self.redis.clone();
        bounded(redis.get(key)).await
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut redis = self.redis.clone();
        bounded(redis.set_ex(key, value, ttl.as_secs().max(1))).await
    }

    async fn increment(&self, key: &str) -> Result<i64, CacheError> {
        let mut redis = self.redis.clone();
        bounded(redis.incr(key, 1)).await
    }
}
