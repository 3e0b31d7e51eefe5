//! Event Publisher (C8)
//!
//! In-process broadcast of match/fill/trade events, published only after the
//! settling transaction commits — mirroring the teacher's
//! subscribe-then-spawn-persistence-worker shape, inverted: here Postgres is
//! the authoritative write and the broadcast is the shadow, not the other
//! way around. Optional Redis pub/sub fan-out reuses the cache layer's
//! `Publisher` for downstream consumers outside this process. A handler
//! error here is logged and swallowed; it never unwinds into the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::cache::Publisher;
use crate::models::{Side, Trade};

use super::core::MatchFill;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize)]
pub struct OrderMatchEvent {
    pub market_id: Uuid,
    pub taker_order_id: Uuid,
    pub maker_order_id: Uuid,
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// One side's fill event for a single match: emitted once for the taker and
/// once for the maker per fill, carrying that side's own order id, account,
/// remaining quantity, and completion state.
#[derive(Debug, Clone, Serialize)]
pub struct OrderFillEvent {
    pub market_id: Uuid,
    pub order_id: Uuid,
    pub account_id: Uuid,
    pub side: Side,
    pub filled_quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub price: Decimal,
    pub is_complete: bool,
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    OrderMatch(OrderMatchEvent),
    OrderFill(OrderFillEvent),
    TradeExecution(Trade),
}

/// Owns the broadcast sender; cheaply cloneable, shared across the engine.
#[derive(Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<EngineEvent>,
    redis_publisher: Option<Arc<Publisher>>,
}

impl EventPublisher {
    pub fn new(redis_publisher: Option<Arc<Publisher>>) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender, redis_publisher }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Publishes every event produced by one completed matching pass. Called
    /// only after the settling transaction has committed. Emits one
    /// `OrderFillEvent` per side (taker, maker) for every fill, per the
    /// documented `ORDER_FILL(orderId, marketId, side, filled, remaining,
    /// price, isComplete)` contract.
    pub async fn publish_match(
        &self,
        market_id: Uuid,
        taker_order_id: Uuid,
        taker_account_id: Uuid,
        taker_side: Side,
        taker_fully_done: bool,
        fills: &[MatchFill],
        trades: &[Trade],
    ) {
        let last_index = fills.len().saturating_sub(1);

        for (i, fill) in fills.iter().enumerate() {
            self.emit(EngineEvent::OrderMatch(OrderMatchEvent {
                market_id,
                taker_order_id,
                maker_order_id: fill.maker_order_id,
                price: fill.price,
                quantity: fill.quantity,
                timestamp: fill.timestamp,
            }));

            self.emit(EngineEvent::OrderFill(OrderFillEvent {
                market_id,
                order_id: taker_order_id,
                account_id: taker_account_id,
                side: taker_side,
                filled_quantity: fill.quantity,
                remaining_quantity: fill.taker_remaining_after,
                price: fill.price,
                is_complete: taker_fully_done && i == last_index,
            }));

            self.emit(EngineEvent::OrderFill(OrderFillEvent {
                market_id,
                order_id: fill.maker_order_id,
                account_id: fill.maker_account_id,
                side: taker_side.opposite(),
                filled_quantity: fill.quantity,
                remaining_quantity: fill.maker_remaining_after,
                price: fill.price,
                is_complete: fill.maker_remaining_after.is_zero(),
            }));
        }

        for trade in trades {
            self.emit(EngineEvent::TradeExecution(trade.clone()));
            if let Some(publisher) = &self.redis_publisher {
                if let Err(e) = publisher.publish_trade(market_id, trade).await {
                    tracing::warn!(%market_id, error = %e, "failed to publish trade to redis pub/sub");
                }
            }
        }
    }

    fn emit(&self, event: EngineEvent) {
        // A `SendError` only means there are currently no subscribers; that's
        // not a failure condition for a fire-and-forget publisher.
        let _ = self.sender.send(event);
    }
}
