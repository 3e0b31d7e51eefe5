//! Cache key and pub/sub channel namespacing.

use uuid::Uuid;

pub struct CacheKey;

impl CacheKey {
    pub fn orderbook_bids(market_id: Uuid) -> String {
        format!("orderbook:{market_id}:bids")
    }

    pub fn orderbook_asks(market_id: Uuid) -> String {
        format!("orderbook:{market_id}:asks")
    }

    /// Hash of order_id -> serialized `CachedOrder`, backing both sides.
    pub fn orderbook_orders(market_id: Uuid) -> String {
        format!("orderbook:{market_id}:orders")
    }

    pub fn lock_market(market_id: Uuid) -> String {
        format!("lock:market:{market_id}")
    }

    pub fn channel_trades(market_id: Uuid) -> String {
        format!("channel:trades:{market_id}")
    }

    pub fn channel_orderbook(market_id: Uuid) -> String {
        format!("channel:orderbook:{market_id}")
    }
}
