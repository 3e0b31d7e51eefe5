//! Matching Engine orchestrator.
//!
//! Ties together the holdings/order/trade stores, the pure matching core,
//! settlement, the per-market lock, the order-book cache, and event
//! publication into the public API surface the API layer calls into.
//! Implements the state machine:
//! `Idle -> LockAcquired -> TxOpen -> Matching -> TxCommitted ->
//! CacheReconciled -> EventsPublished -> Idle`, with rollback routing back
//! through `LockReleased -> Idle` on any error. A rejected order leaves no
//! trace: no reservation, no order row, no cache entry, no events. Every
//! transaction this engine opens runs at `REPEATABLE READ`, so a matching
//! pass never observes a resting order disappear or reappear mid-read.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::cache::CacheManager;
use crate::config::MatchingConfig;
use crate::db::Database;
use crate::error::EngineError;
use crate::models::{Market, NewOrder, Order, Side, Trade};
use crate::services::holdings::HoldingsStore;
use crate::services::markets::MarketStore;
use crate::services::orders::{OrderMutation, OrderStore};
use crate::services::trades::TradeStore;

use super::core::{match_taker, MatchFill, MatchOutcome};
use super::events::EventPublisher;
use super::lock::MarketLock;
use super::settlement::{release_dust, settle_fills};

const REPEATABLE_READ: &str = "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ";

/// The taker's own order, still resting after the match, if any.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RemainingOrder {
    pub order_id: Uuid,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MatchingResult {
    pub order_id: Uuid,
    pub matches: Vec<MatchFill>,
    pub remaining_order: Option<RemainingOrder>,
    pub updated_makers: Vec<Uuid>,
    pub completed_maker_ids: Vec<Uuid>,
    pub dust_discarded: Decimal,
    pub trades: Vec<Trade>,
}

pub struct MatchingEngine {
    db: Database,
    cache: Arc<CacheManager>,
    lock: MarketLock,
    events: EventPublisher,
    config: MatchingConfig,
}

impl MatchingEngine {
    pub fn new(db: Database, cache: Arc<CacheManager>, lock_ttl_secs: u64, config: MatchingConfig) -> Self {
        let lock = MarketLock::new(cache.redis.clone(), lock_ttl_secs);
        let events = EventPublisher::new(Some(cache.publisher.clone()));
        Self { db, cache, lock, events, config }
    }

    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    fn reservation_for(side: Side, price: Decimal, quantity: Decimal) -> (Side, Decimal) {
        // Returns which asset side of the market the reservation draws from
        // and the amount: a bid reserves quote at order price, an ask
        // reserves base at face quantity.
        match side {
            Side::Bid => (Side::Bid, price * quantity),
            Side::Ask => (Side::Ask, quantity),
        }
    }

    fn reserved_asset_id(market: &Market, side: Side) -> Uuid {
        match side {
            Side::Bid => market.quote_asset_id,
            Side::Ask => market.base_asset_id,
        }
    }

    pub async fn place_order(
        &self,
        market_id: Uuid,
        new_order: NewOrder,
    ) -> Result<MatchingResult, EngineError> {
        if new_order.price <= Decimal::ZERO || new_order.quantity <= Decimal::ZERO {
            return Err(EngineError::InvalidOrder(
                "price and quantity must be strictly positive".into(),
            ));
        }

        let market = MarketStore::get(&self.db.pool, market_id).await?;
        if !market.active {
            return Err(EngineError::InvalidOrder(format!("market {market_id} is not active")));
        }
        if market.exceeds_max_quantity(new_order.quantity) {
            return Err(EngineError::InvalidOrder("quantity exceeds market maximum".into()));
        }

        let guard = self.lock.acquire(market_id).await?;
        let result = self.place_order_locked(&market, new_order).await;
        self.lock.release(guard).await?;
        result
    }

    async fn place_order_locked(
        &self,
        market: &Market,
        new_order: NewOrder,
    ) -> Result<MatchingResult, EngineError> {
        let (_, reserve_amount) = Self::reservation_for(new_order.side, new_order.price, new_order.quantity);
        let reserve_asset = Self::reserved_asset_id(market, new_order.side);

        let mut tx = self.db.pool.begin().await?;
        sqlx::query(REPEATABLE_READ).execute(&mut *tx).await?;

        let reserved = HoldingsStore::reserve(&mut tx, new_order.account_id, reserve_asset, reserve_amount).await?;
        if !reserved {
            tx.rollback().await?;
            return Err(EngineError::InsufficientFunds {
                account_id: new_order.account_id,
                asset_id: reserve_asset,
            });
        }

        let now = Utc::now();
        let taker_order = Order {
            id: Uuid::new_v4(),
            market_id: market.id,
            account_id: new_order.account_id,
            side: new_order.side,
            price: new_order.price,
            quantity: new_order.quantity,
            original_quantity: new_order.quantity,
            quote_asset_id: market.quote_asset_id,
            created_at: now,
        };
        OrderStore::create(&mut tx, &taker_order).await?;

        let makers = OrderStore::get_by_market_and_side_for_matching(&mut tx, market.id, new_order.side.opposite())
            .await?;

        let outcome: MatchOutcome = match_taker(
            new_order.account_id,
            new_order.side,
            new_order.price,
            new_order.quantity,
            &makers,
            market,
            self.config.allow_self_trade,
            now,
        );

        OrderStore::batch(&mut tx, &outcome.maker_mutations).await?;

        settle_fills(&mut tx, market, new_order.side, new_order.account_id, &outcome.fills).await?;

        if !outcome.dust_discarded.is_zero() {
            release_dust(
                &mut tx,
                market,
                new_order.side,
                new_order.account_id,
                new_order.price,
                outcome.dust_discarded,
            )
            .await?;
        }

        if outcome.resting_quantity.is_zero() {
            OrderStore::delete(&mut tx, taker_order.id).await?;
        } else {
            OrderStore::update_quantity(&mut tx, taker_order.id, outcome.resting_quantity).await?;
        }

        let trades: Vec<Trade> = outcome
            .fills
            .iter()
            .map(|fill| Trade {
                id: Uuid::new_v4(),
                market_id: market.id,
                taker_order_id: taker_order.id,
                maker_order_id: fill.maker_order_id,
                taker_side: new_order.side,
                price: fill.price,
                quantity: fill.quantity,
                taker_account_id: new_order.account_id,
                maker_account_id: fill.maker_account_id,
                created_at: now,
            })
            .collect();
        TradeStore::batch_create(&mut tx, &trades).await?;

        tx.commit().await?;

        self.reconcile_cache_after_match(market, &taker_order, &outcome).await;

        self.events
            .publish_match(
                market.id,
                taker_order.id,
                new_order.account_id,
                new_order.side,
                outcome.resting_quantity.is_zero(),
                &outcome.fills,
                &trades,
            )
            .await;

        let remaining_order = if outcome.resting_quantity.is_zero() {
            None
        } else {
            Some(RemainingOrder { order_id: taker_order.id, quantity: outcome.resting_quantity })
        };

        Ok(MatchingResult {
            order_id: taker_order.id,
            matches: outcome.fills,
            remaining_order,
            updated_makers: outcome.updated_makers,
            completed_maker_ids: outcome.completed_maker_ids,
            dust_discarded: outcome.dust_discarded,
            trades,
        })
    }

    /// Applies the same mutations just committed to Postgres to the cache.
    /// On any failure, falls back to a full rebuild for the affected market
    /// (`CacheDesync` recovery) rather than leaving the cache partially
    /// updated. Publishes the refreshed book over Redis pub/sub once the
    /// cache is known-consistent.
    async fn reconcile_cache_after_match(&self, market: &Market, taker_order: &Order, outcome: &MatchOutcome) {
        let mut failed = false;

        for mutation in &outcome.maker_mutations {
            let result = match mutation {
                OrderMutation::UpdateQuantity { order_id, new_quantity } => {
                    self.cache.orderbook.update(market.id, *order_id, *new_quantity).await
                }
                OrderMutation::Delete { order_id } => {
                    self.cache
                        .orderbook
                        .remove(market.id, taker_order.side.opposite(), *order_id)
                        .await
                }
            };
            if result.is_err() {
                failed = true;
                break;
            }
        }

        if !failed {
            if outcome.resting_quantity.is_zero() {
                if self.cache.orderbook.remove(market.id, taker_order.side, taker_order.id).await.is_err() {
                    failed = true;
                }
            } else {
                let mut resting = taker_order.clone();
                resting.quantity = outcome.resting_quantity;
                if self.cache.orderbook.add(&resting).await.is_err() {
                    failed = true;
                }
            }
        }

        if failed {
            tracing::warn!(market_id = %market.id, "order-book cache desync detected, rebuilding from store");
            if let Ok(orders) = OrderStore::get_by_market(&self.db.pool, market.id).await {
                if let Err(e) = self.cache.orderbook.restore(market.id, &orders).await {
                    tracing::error!(market_id = %market.id, error = %e, "failed to rebuild order-book cache");
                }
            }
            return;
        }

        if let Ok(view) = self.cache.orderbook.get_order_book(market.id).await {
            if let Err(e) = self.cache.publisher.publish_orderbook(market.id, &view).await {
                tracing::warn!(market_id = %market.id, error = %e, "failed to publish order book to redis pub/sub");
            }
        }
    }

    /// Cancels a resting order. `side` is part of the documented interface
    /// and is checked against the order's actual side as a sanity guard;
    /// Postgres (not `side`) is what actually locates the row.
    pub async fn cancel_order(&self, market_id: Uuid, order_id: Uuid, side: Side) -> Result<bool, EngineError> {
        let market = MarketStore::get(&self.db.pool, market_id).await?;
        let guard = self.lock.acquire(market_id).await?;
        let result = self.cancel_order_locked(&market, order_id, side).await;
        self.lock.release(guard).await?;
        result
    }

    async fn cancel_order_locked(&self, market: &Market, order_id: Uuid, side: Side) -> Result<bool, EngineError> {
        let Some(order) = OrderStore::get_by_id(&self.db.pool, order_id).await? else {
            return Ok(false);
        };
        if order.market_id != market.id || order.side != side {
            return Ok(false);
        }

        let mut tx = self.db.pool.begin().await?;
        sqlx::query(REPEATABLE_READ).execute(&mut *tx).await?;

        let deleted = OrderStore::delete(&mut tx, order_id).await?;
        if !deleted {
            tx.rollback().await?;
            return Ok(false);
        }

        let (_, release_amount) = Self::reservation_for(order.side, order.price, order.quantity);
        let release_asset = Self::reserved_asset_id(market, order.side);
        HoldingsStore::release(&mut tx, order.account_id, release_asset, release_amount).await?;

        tx.commit().await?;

        if self.cache.orderbook.remove(market.id, order.side, order.id).await.is_err() {
            tracing::warn!(market_id = %market.id, order_id = %order.id, "cache removal failed on cancel, rebuilding");
            if let Ok(orders) = OrderStore::get_by_market(&self.db.pool, market.id).await {
                let _ = self.cache.orderbook.restore(market.id, &orders).await;
            }
        }

        Ok(true)
    }

    pub async fn get_order(&self, market_id: Uuid, order_id: Uuid) -> Result<Order, EngineError> {
        let order = OrderStore::get_by_id(&self.db.pool, order_id)
            .await?
            .ok_or(EngineError::OrderNotFound(order_id))?;
        if order.market_id != market_id {
            return Err(EngineError::OrderNotFound(order_id));
        }
        Ok(order)
    }

    pub async fn get_order_book(&self, market_id: Uuid) -> Result<crate::cache::OrderBookView, EngineError> {
        self.cache.orderbook.get_order_book(market_id).await.map_err(EngineError::from)
    }

    pub async fn best_bid(&self, market_id: Uuid) -> Result<Option<crate::cache::CachedOrder>, EngineError> {
        self.cache.orderbook.best_bid(market_id).await.map_err(EngineError::from)
    }

    pub async fn best_ask(&self, market_id: Uuid) -> Result<Option<crate::cache::CachedOrder>, EngineError> {
        self.cache.orderbook.best_ask(market_id).await.map_err(EngineError::from)
    }

    pub async fn spread(&self, market_id: Uuid) -> Result<Option<Decimal>, EngineError> {
        self.cache.orderbook.spread(market_id).await.map_err(EngineError::from)
    }

    pub async fn depth(
        &self,
        market_id: Uuid,
        levels: usize,
    ) -> Result<(Vec<crate::cache::DepthLevel>, Vec<crate::cache::DepthLevel>), EngineError> {
        self.cache.orderbook.depth(market_id, levels).await.map_err(EngineError::from)
    }

    pub async fn recent_trades(&self, market_id: Uuid, limit: i64) -> Result<Vec<Trade>, EngineError> {
        TradeStore::get_recent(&self.db.pool, market_id, limit).await
    }

    pub async fn last_trade_price(&self, market_id: Uuid) -> Result<Option<Decimal>, EngineError> {
        TradeStore::get_last_price(&self.db.pool, market_id).await
    }

    /// Administrative/test-only: wipes all resting orders for a market from
    /// both the order store and the cache.
    pub async fn clear_order_book(&self, market_id: Uuid) -> Result<(), EngineError> {
        let guard = self.lock.acquire(market_id).await?;

        let mut tx = self.db.pool.begin().await?;
        sqlx::query(REPEATABLE_READ).execute(&mut *tx).await?;
        OrderStore::delete_by_market(&mut tx, market_id).await?;
        tx.commit().await?;

        let result = self.cache.orderbook.clear(market_id).await.map_err(EngineError::from);
        self.lock.release(guard).await?;
        result
    }
}
