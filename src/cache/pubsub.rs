//! Redis Pub/Sub fan-out for downstream consumers of match/trade events.
//!
//! Internal consumers use the in-process broadcast channels in
//! `services::matching::events`; this is the optional external fan-out the
//! teacher's `Publisher` provided, trimmed to the two channels this crate
//! still emits.

use std::sync::Arc;

use redis::RedisError;
use serde::Serialize;
use uuid::Uuid;

use super::keys::CacheKey;
use super::redis_client::RedisClient;

pub struct Publisher {
    redis: Arc<RedisClient>,
}

impl Publisher {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }

    pub async fn publish_json<T: Serialize>(&self, channel: &str, message: &T) -> Result<i32, RedisError> {
        let json = serde_json::to_string(message).map_err(|e| {
            RedisError::from((redis::ErrorKind::IoError, "Serialization error", e.to_string()))
        })?;
        self.redis.publish(channel, json).await
    }

    pub async fn publish_trade<T: Serialize>(&self, market_id: Uuid, trade: &T) -> Result<i32, RedisError> {
        let channel = CacheKey::channel_trades(market_id);
        self.publish_json(&channel, trade).await
    }

    pub async fn publish_orderbook<T: Serialize>(&self, market_id: Uuid, orderbook: &T) -> Result<i32, RedisError> {
        let channel = CacheKey::channel_orderbook(market_id);
        self.publish_json(&channel, orderbook).await
    }
}
