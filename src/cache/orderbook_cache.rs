//! Order-Book Cache (C4)
//!
//! Redis-backed, per-market, per-side view of resting orders. Eventually
//! consistent with the order store: updated after a successful commit,
//! rebuildable from scratch via `restore`. Bids are scored `-price` so
//! `ZRANGE` returns best-bid-first; asks are scored `+price` so `ZRANGE`
//! returns best-ask-first. Ties at the same price are broken by `created_at`
//! ascending using the order hash, mirroring the resting-order sort the order
//! store itself uses for matching.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{Order, Side};

use super::keys::CacheKey;
use super::redis_client::RedisClient;

/// A single resting order as held in the cache, keyed by order id in the
/// per-market orders hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedOrder {
    pub order_id: Uuid,
    pub account_id: Uuid,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for CachedOrder {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            account_id: order.account_id,
            side: order.side,
            price: order.price,
            quantity: order.quantity,
            created_at: order.created_at,
        }
    }
}

/// Both sides of a market's book, already in priority order.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrderBookView {
    pub bids: Vec<CachedOrder>,
    pub asks: Vec<CachedOrder>,
}

/// One aggregated price level, for `depth`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

pub struct OrderbookCache {
    redis: Arc<RedisClient>,
}

fn side_score(side: Side, price: Decimal) -> f64 {
    let raw = price.to_string().parse::<f64>().unwrap_or(0.0);
    match side {
        Side::Bid => -raw,
        Side::Ask => raw,
    }
}

impl OrderbookCache {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }

    fn side_key(&self, market_id: Uuid, side: Side) -> String {
        match side {
            Side::Bid => CacheKey::orderbook_bids(market_id),
            Side::Ask => CacheKey::orderbook_asks(market_id),
        }
    }

    /// Adds a new resting order to the cache.
    pub async fn add(&self, order: &Order) -> Result<(), redis::RedisError> {
        let zkey = self.side_key(order.market_id, order.side);
        let hkey = CacheKey::orderbook_orders(order.market_id);
        let score = side_score(order.side, order.price);

        self.redis.zadd(&zkey, score, order.id.to_string()).await?;
        let entry = CachedOrder::from(order);
        let json = serde_json::to_string(&entry).map_err(serialization_error)?;
        self.redis.hset(&hkey, &order.id.to_string(), json).await?;

        Ok(())
    }

    /// Updates the remaining quantity of a resting order already in the cache.
    pub async fn update(
        &self,
        market_id: Uuid,
        order_id: Uuid,
        new_quantity: Decimal,
    ) -> Result<(), redis::RedisError> {
        let hkey = CacheKey::orderbook_orders(market_id);
        let Some(raw) = self.redis.hget::<String>(&hkey, &order_id.to_string()).await? else {
            return Ok(());
        };
        let Ok(mut entry) = serde_json::from_str::<CachedOrder>(&raw) else {
            return Ok(());
        };
        entry.quantity = new_quantity;
        let json = serde_json::to_string(&entry).map_err(serialization_error)?;
        self.redis.hset(&hkey, &order_id.to_string(), json).await?;

        Ok(())
    }

    /// Removes a resting order from both sorted set and hash.
    pub async fn remove(&self, market_id: Uuid, side: Side, order_id: Uuid) -> Result<(), redis::RedisError> {
        let zkey = self.side_key(market_id, side);
        let hkey = CacheKey::orderbook_orders(market_id);

        self.redis.zrem(&zkey, order_id.to_string()).await?;
        self.redis.hdel(&hkey, &order_id.to_string()).await?;

        Ok(())
    }

    async fn load_side(&self, market_id: Uuid, side: Side) -> Result<Vec<CachedOrder>, redis::RedisError> {
        let zkey = self.side_key(market_id, side);
        let hkey = CacheKey::orderbook_orders(market_id);

        let ids: Vec<String> = self.redis.zrange(&zkey, 0, -1).await?;
        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(raw) = self.redis.hget::<String>(&hkey, &id).await? {
                if let Ok(entry) = serde_json::from_str::<CachedOrder>(&raw) {
                    entries.push(entry);
                }
            }
        }

        // ZRANGE already sorts by price; break same-price ties by created_at.
        entries.sort_by(|a, b| {
            let price_cmp = match side {
                Side::Bid => b.price.cmp(&a.price),
                Side::Ask => a.price.cmp(&b.price),
            };
            price_cmp.then(a.created_at.cmp(&b.created_at))
        });

        Ok(entries)
    }

    pub async fn get_order_book(&self, market_id: Uuid) -> Result<OrderBookView, redis::RedisError> {
        let bids = self.load_side(market_id, Side::Bid).await?;
        let asks = self.load_side(market_id, Side::Ask).await?;
        Ok(OrderBookView { bids, asks })
    }

    pub async fn best_bid(&self, market_id: Uuid) -> Result<Option<CachedOrder>, redis::RedisError> {
        Ok(self.load_side(market_id, Side::Bid).await?.into_iter().next())
    }

    pub async fn best_ask(&self, market_id: Uuid) -> Result<Option<CachedOrder>, redis::RedisError> {
        Ok(self.load_side(market_id, Side::Ask).await?.into_iter().next())
    }

    pub async fn spread(&self, market_id: Uuid) -> Result<Option<Decimal>, redis::RedisError> {
        let bid = self.best_bid(market_id).await?;
        let ask = self.best_ask(market_id).await?;
        Ok(match (bid, ask) {
            (Some(b), Some(a)) => Some(a.price - b.price),
            _ => None,
        })
    }

    /// Aggregated depth, `levels` price points per side.
    pub async fn depth(&self, market_id: Uuid, levels: usize) -> Result<(Vec<DepthLevel>, Vec<DepthLevel>), redis::RedisError> {
        let bids = aggregate(self.load_side(market_id, Side::Bid).await?, levels);
        let asks = aggregate(self.load_side(market_id, Side::Ask).await?, levels);
        Ok((bids, asks))
    }

    /// Drops and rebuilds the cache for one market from the authoritative
    /// resting-order rows. Used both for startup warm-up and for `CacheDesync`
    /// recovery after a retry-exhausted mutation.
    pub async fn restore(&self, market_id: Uuid, orders: &[Order]) -> Result<(), redis::RedisError> {
        self.clear(market_id).await?;
        for order in orders {
            self.add(order).await?;
        }
        Ok(())
    }

    pub async fn clear(&self, market_id: Uuid) -> Result<(), redis::RedisError> {
        self.redis.del(&CacheKey::orderbook_bids(market_id)).await?;
        self.redis.del(&CacheKey::orderbook_asks(market_id)).await?;
        self.redis.del(&CacheKey::orderbook_orders(market_id)).await?;
        Ok(())
    }

    /// Warms the cache for every market from the authoritative resting-order
    /// rows. Invoked once at process start, and is the same repair path
    /// `CacheDesync` recovery falls back to for a single market.
    pub async fn restore_all(&self, pool: &PgPool) -> Result<(), EngineError> {
        for market_id in Self::all_market_ids(pool).await? {
            let orders = sqlx::query_as::<_, Order>(
                r#"
                SELECT id, market_id, account_id, side, price, quantity, original_quantity, quote_asset_id, created_at
                FROM orders WHERE market_id = $1
                "#,
            )
            .bind(market_id)
            .fetch_all(pool)
            .await?;

            self.restore(market_id, &orders).await?;
        }

        Ok(())
    }

    /// Drops the cache for every market. Administrative/test-only.
    pub async fn clear_all(&self, pool: &PgPool) -> Result<(), EngineError> {
        for market_id in Self::all_market_ids(pool).await? {
            self.clear(market_id).await?;
        }

        Ok(())
    }

    async fn all_market_ids(pool: &PgPool) -> Result<Vec<Uuid>, EngineError> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM markets")
            .fetch_all(pool)
            .await?;
        Ok(ids)
    }
}

fn aggregate(entries: Vec<CachedOrder>, levels: usize) -> Vec<DepthLevel> {
    let mut out: Vec<DepthLevel> = Vec::new();
    for entry in entries {
        match out.last_mut() {
            Some(level) if level.price == entry.price => level.quantity += entry.quantity,
            _ => {
                if out.len() == levels {
                    break;
                }
                out.push(DepthLevel { price: entry.price, quantity: entry.quantity });
            }
        }
    }
    out.truncate(levels);
    out
}

fn serialization_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::IoError, "Serialization error", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(side: Side, price: Decimal, created_at: DateTime<Utc>) -> CachedOrder {
        CachedOrder {
            order_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            side,
            price,
            quantity: dec!(1),
            created_at,
        }
    }

    #[test]
    fn aggregate_merges_same_price_levels() {
        let t = Utc::now();
        let entries = vec![
            order(Side::Bid, dec!(10), t),
            order(Side::Bid, dec!(10), t),
            order(Side::Bid, dec!(9), t),
        ];
        let levels = aggregate(entries, 10);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].price, dec!(10));
        assert_eq!(levels[0].quantity, dec!(2));
        assert_eq!(levels[1].price, dec!(9));
    }

    #[test]
    fn aggregate_respects_level_cap() {
        let t = Utc::now();
        let entries = vec![
            order(Side::Ask, dec!(1), t),
            order(Side::Ask, dec!(2), t),
            order(Side::Ask, dec!(3), t),
        ];
        let levels = aggregate(entries, 2);
        assert_eq!(levels.len(), 2);
    }

    #[test]
    fn side_score_is_negated_for_bids() {
        assert!(side_score(Side::Bid, dec!(100)) < 0.0);
        assert!(side_score(Side::Ask, dec!(100)) > 0.0);
    }
}
