//! Volatile key/value cache used for the status listing, the notification
//! counter and notification suppression. Everything stored here is advisory.

pub mod redis_backend;

use std::time::Duration;

use async_trait::async_trait;

pub use redis_backend::RedisCache;

pub const STATUS_CACHE_KEY: &str = "containers_status";
pub const NOTIFICATION_COUNT_KEY: &str = "notification_count";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Cache call timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
    -> Result<(), CacheError>;

    /// Increments the integer stored at `key`, starting from zero, and
    /// returns the new value.
    async fn increment(&self, key: &str) -> Result<i64, CacheError>;
}
