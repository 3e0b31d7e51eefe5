//! In-memory fake store mirroring `MatchingEngine`'s Postgres-backed
//! orchestration, so the matching/settlement contract can be driven end to
//! end without a database or Redis. Reuses the crate's actual pure functions
//! (`match_taker`, `weighted_average_cost`, `proportional_cost_reduction`)
//! rather than re-deriving their arithmetic, so these tests exercise the real
//! rules and only fake the storage.

use std::collections::HashMap;

use chrono::Utc;
use clob_matching_engine::models::{Market, NewOrder, Order, Side, Trade};
use clob_matching_engine::services::holdings::{proportional_cost_reduction, weighted_average_cost};
use clob_matching_engine::services::matching::{match_taker, MatchFill, MatchingResult, RemainingOrder};
use clob_matching_engine::services::orders::OrderMutation;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct FakeHolding {
    pub quantity: Decimal,
    pub average_cost_basis: Decimal,
    pub total_cost: Decimal,
}

/// Mirrors the relevant slice of `HoldingsStore` + `OrderStore` against plain
/// `HashMap`s.
#[derive(Default)]
pub struct FakeStore {
    pub holdings: HashMap<(Uuid, Uuid), FakeHolding>,
    pub orders: HashMap<Uuid, Order>,
}

impl FakeStore {
    pub fn fund(&mut self, account_id: Uuid, asset_id: Uuid, quantity: Decimal) {
        self.holdings.entry((account_id, asset_id)).or_default().quantity = quantity;
    }

    pub fn holding(&self, account_id: Uuid, asset_id: Uuid) -> FakeHolding {
        self.holdings.get(&(account_id, asset_id)).cloned().unwrap_or_default()
    }

    fn reserve(&mut self, account_id: Uuid, asset_id: Uuid, quantity: Decimal) -> bool {
        let entry = self.holdings.entry((account_id, asset_id)).or_default();
        if entry.quantity >= quantity {
            entry.quantity -= quantity;
            true
        } else {
            false
        }
    }

    fn release(&mut self, account_id: Uuid, asset_id: Uuid, quantity: Decimal) {
        self.holdings.entry((account_id, asset_id)).or_default().quantity += quantity;
    }

    fn adjust(&mut self, account_id: Uuid, asset_id: Uuid, delta: Decimal) {
        self.holdings.entry((account_id, asset_id)).or_default().quantity += delta;
    }

    fn adjust_with_cost_basis(&mut self, account_id: Uuid, asset_id: Uuid, quantity: Decimal, price: Decimal) {
        let entry = self.holdings.entry((account_id, asset_id)).or_default();
        let (new_quantity, new_total_cost, new_avg_cost) =
            weighted_average_cost(entry.quantity, entry.total_cost, quantity, price);
        entry.quantity = new_quantity;
        entry.total_cost = new_total_cost;
        entry.average_cost_basis = new_avg_cost;
    }

    fn reduce_cost_basis_on_sell(&mut self, account_id: Uuid, asset_id: Uuid, sold_quantity: Decimal) {
        if let Some(entry) = self.holdings.get_mut(&(account_id, asset_id)) {
            entry.total_cost = proportional_cost_reduction(entry.average_cost_basis, entry.total_cost, sold_quantity);
        }
    }

    fn resting_by_side(&self, market_id: Uuid, side: Side) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .values()
            .filter(|o| o.market_id == market_id && o.side == side)
            .cloned()
            .collect();
        orders.sort_by(|a, b| match side {
            Side::Bid => b.price.cmp(&a.price).then(a.created_at.cmp(&b.created_at)),
            Side::Ask => a.price.cmp(&b.price).then(a.created_at.cmp(&b.created_at)),
        });
        orders
    }
}

fn reserved_asset_id(market: &Market, side: Side) -> Uuid {
    match side {
        Side::Bid => market.quote_asset_id,
        Side::Ask => market.base_asset_id,
    }
}

fn reservation_amount(side: Side, price: Decimal, quantity: Decimal) -> Decimal {
    match side {
        Side::Bid => price * quantity,
        Side::Ask => quantity,
    }
}

/// Mirrors `MatchingEngine::place_order_locked` step for step (reserve,
/// create, match, apply maker mutations, settle, release dust, rest-or-delete)
/// against the fake store instead of a `sqlx::Transaction`. Returns `None` on
/// insufficient funds: no reservation, no order row, no fills, same as the
/// real engine's rejection path.
pub fn place_order(
    store: &mut FakeStore,
    market: &Market,
    allow_self_trade: bool,
    new_order: NewOrder,
) -> Option<MatchingResult> {
    let reserve_asset = reserved_asset_id(market, new_order.side);
    let amount = reservation_amount(new_order.side, new_order.price, new_order.quantity);

    if !store.reserve(new_order.account_id, reserve_asset, amount) {
        return None;
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
    store.orders.insert(taker_order.id, taker_order.clone());

    let makers = store.resting_by_side(market.id, new_order.side.opposite());

    let outcome = match_taker(
        new_order.account_id,
        new_order.side,
        new_order.price,
        new_order.quantity,
        &makers,
        market,
        allow_self_trade,
        now,
    );

    for mutation in &outcome.maker_mutations {
        match mutation {
            OrderMutation::UpdateQuantity { order_id, new_quantity } => {
                if let Some(order) = store.orders.get_mut(order_id) {
                    order.quantity = *new_quantity;
                }
            }
            OrderMutation::Delete { order_id } => {
                store.orders.remove(order_id);
            }
        }
    }

    settle_fills(store, market, new_order.side, new_order.account_id, &outcome.fills);

    if !outcome.dust_discarded.is_zero() {
        release_dust(
            store,
            market,
            new_order.side,
            new_order.account_id,
            new_order.price,
            outcome.dust_discarded,
        );
    }

    if outcome.resting_quantity.is_zero() {
        store.orders.remove(&taker_order.id);
    } else if let Some(order) = store.orders.get_mut(&taker_order.id) {
        order.quantity = outcome.resting_quantity;
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

    let remaining_order = if outcome.resting_quantity.is_zero() {
        None
    } else {
        Some(RemainingOrder { order_id: taker_order.id, quantity: outcome.resting_quantity })
    };

    Some(MatchingResult {
        order_id: taker_order.id,
        matches: outcome.fills,
        remaining_order,
        updated_makers: outcome.updated_makers,
        completed_maker_ids: outcome.completed_maker_ids,
        dust_discarded: outcome.dust_discarded,
        trades,
    })
}

fn settle_fill(store: &mut FakeStore, market: &Market, taker_side: Side, taker_account_id: Uuid, fill: &MatchFill) {
    let proceeds = fill.price * fill.quantity;
    let (buyer_account_id, seller_account_id) = match taker_side {
        Side::Bid => (taker_account_id, fill.maker_account_id),
        Side::Ask => (fill.maker_account_id, taker_account_id),
    };

    store.adjust_with_cost_basis(buyer_account_id, market.base_asset_id, fill.quantity, fill.price);
    store.reduce_cost_basis_on_sell(seller_account_id, market.base_asset_id, fill.quantity);
    store.adjust(seller_account_id, market.quote_asset_id, proceeds);
}

fn settle_fills(store: &mut FakeStore, market: &Market, taker_side: Side, taker_account_id: Uuid, fills: &[MatchFill]) {
    for fill in fills {
        settle_fill(store, market, taker_side, taker_account_id, fill);
    }
}

fn release_dust(
    store: &mut FakeStore,
    market: &Market,
    taker_side: Side,
    taker_account_id: Uuid,
    taker_price: Decimal,
    dust_quantity: Decimal,
) {
    match taker_side {
        Side::Bid => store.release(taker_account_id, market.quote_asset_id, taker_price * dust_quantity),
        Side::Ask => store.release(taker_account_id, market.base_asset_id, dust_quantity),
    }
}

/// Mirrors `MatchingEngine::cancel_order_locked`: deletes the order and
/// releases its reservation. Returns `false` for an unknown order id or a
/// side mismatch, same as the real engine.
pub fn cancel_order(store: &mut FakeStore, market: &Market, order_id: Uuid, side: Side) -> bool {
    let Some(order) = store.orders.get(&order_id).cloned() else {
        return false;
    };
    if order.market_id != market.id || order.side != side {
        return false;
    }

    store.orders.remove(&order_id);
    let release_asset = reserved_asset_id(market, order.side);
    let release_amount = reservation_amount(order.side, order.price, order.quantity);
    store.release(order.account_id, release_asset, release_amount);
    true
}

pub fn test_market() -> Market {
    Market {
        id: Uuid::new_v4(),
        symbol: "TEST/USD".into(),
        base_asset_id: Uuid::new_v4(),
        quote_asset_id: Uuid::new_v4(),
        min_price_increment: dec!(0.01),
        min_quantity_increment: dec!(0.01),
        max_quantity: None,
        active: true,
    }
}

pub fn new_order(side: Side, price: Decimal, quantity: Decimal, account_id: Uuid) -> NewOrder {
    NewOrder { side, price, quantity, account_id }
}
