//! Redis-backed cache layer: connection management, the order-book cache
//! (C4), key namespacing, and optional pub/sub fan-out (part of C8).

pub mod keys;
pub mod orderbook_cache;
pub mod pubsub;
pub mod redis_client;

use std::sync::Arc;

pub use keys::CacheKey;
pub use orderbook_cache::{CachedOrder, DepthLevel, OrderBookView, OrderbookCache};
pub use pubsub::Publisher;
pub use redis_client::{RedisClient, RedisConfig};

/// Wires together the pieces that share one Redis connection.
#[derive(Clone)]
pub struct CacheManager {
    pub orderbook: Arc<OrderbookCache>,
    pub publisher: Arc<Publisher>,
    pub redis: Arc<RedisClient>,
}

impl CacheManager {
    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        let redis = Arc::new(RedisClient::from_url(redis_url).await?);
        Ok(Self {
            orderbook: Arc::new(OrderbookCache::new(redis.clone())),
            publisher: Arc::new(Publisher::new(redis.clone())),
            redis,
        })
    }
}
