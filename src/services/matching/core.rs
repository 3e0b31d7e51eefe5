//! Pure, synchronous matching core.
//!
//! No I/O: takes a taker order and a priority-ordered slice of resting maker
//! orders and returns the fills and maker mutations the caller must apply.
//! This is the one piece of real algorithmic weight in the engine, so it is
//! kept free of `async`/database/cache concerns and is unit-tested directly,
//! the way the teacher keeps its own in-memory order book matching free of
//! I/O and unit tests it in isolation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Market, Order, Side};

use super::super::orders::OrderMutation;

/// One resting order matched against the taker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchFill {
    pub maker_order_id: Uuid,
    pub maker_account_id: Uuid,
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Taker's remaining (unfilled) quantity immediately after this fill.
    pub taker_remaining_after: Decimal,
    /// Maker's remaining (unfilled) quantity immediately after this fill.
    pub maker_remaining_after: Decimal,
}

/// Result of walking the book once for a single taker order.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub fills: Vec<MatchFill>,
    pub maker_mutations: Vec<OrderMutation>,
    /// Maker order ids left resting with a reduced quantity.
    pub updated_makers: Vec<Uuid>,
    /// Maker order ids fully filled and removed from the book.
    pub completed_maker_ids: Vec<Uuid>,
    /// Quantity left on the taker after all crossing makers are exhausted.
    /// If this is zero and `dust_discarded` is zero, the taker was filled
    /// exactly. If nonzero, the taker should rest with this quantity.
    pub resting_quantity: Decimal,
    /// Nonzero only if a nonzero taker remainder was smaller than the
    /// market's dust threshold; the taker is not rested and this amount's
    /// reservation must be released back to the account.
    pub dust_discarded: Decimal,
}

/// True if a resting order at `maker_price` crosses an incoming order on
/// `taker_side` at `taker_price`.
fn crosses(taker_side: Side, taker_price: Decimal, maker_price: Decimal) -> bool {
    match taker_side {
        Side::Bid => maker_price <= taker_price,
        Side::Ask => maker_price >= taker_price,
    }
}

/// Walks `makers` (already in price-time priority order for the opposite
/// side) against a taker order, producing fills until either the taker is
/// exhausted or the book stops crossing.
///
/// `makers` must be sorted the way `OrderStore::get_by_market_and_side_for_matching`
/// sorts them; this function trusts that order and never re-sorts. `now` is
/// injected by the caller rather than read from the clock here, so this stays
/// a pure function of its arguments.
pub fn match_taker(
    taker_account_id: Uuid,
    taker_side: Side,
    taker_price: Decimal,
    taker_quantity: Decimal,
    makers: &[Order],
    market: &Market,
    allow_self_trade: bool,
    now: DateTime<Utc>,
) -> MatchOutcome {
    let mut remaining = taker_quantity;
    let mut fills = Vec::new();
    let mut maker_mutations = Vec::new();
    let mut updated_makers = Vec::new();
    let mut completed_maker_ids = Vec::new();

    for maker in makers {
        if remaining.is_zero() {
            break;
        }
        if !crosses(taker_side, taker_price, maker.price) {
            // Makers arrive in priority order, so once one no longer crosses
            // the rest of this slice is worse and can be skipped entirely.
            break;
        }
        if !allow_self_trade && maker.account_id == taker_account_id {
            continue;
        }

        let fill_quantity = remaining.min(maker.quantity);
        remaining -= fill_quantity;
        let maker_remaining = maker.quantity - fill_quantity;

        fills.push(MatchFill {
            maker_order_id: maker.id,
            maker_account_id: maker.account_id,
            price: maker.price,
            quantity: fill_quantity,
            timestamp: now,
            taker_remaining_after: remaining,
            maker_remaining_after: maker_remaining,
        });

        if maker_remaining.is_zero() {
            maker_mutations.push(OrderMutation::Delete { order_id: maker.id });
            completed_maker_ids.push(maker.id);
        } else {
            maker_mutations.push(OrderMutation::UpdateQuantity {
                order_id: maker.id,
                new_quantity: maker_remaining,
            });
            updated_makers.push(maker.id);
        }
    }

    if remaining.is_zero() {
        return MatchOutcome {
            fills,
            maker_mutations,
            updated_makers,
            completed_maker_ids,
            resting_quantity: Decimal::ZERO,
            dust_discarded: Decimal::ZERO,
        };
    }

    if market.is_dust(remaining) {
        return MatchOutcome {
            fills,
            maker_mutations,
            updated_makers,
            completed_maker_ids,
            resting_quantity: Decimal::ZERO,
            dust_discarded: remaining,
        };
    }

    MatchOutcome {
        fills,
        maker_mutations,
        updated_makers,
        completed_maker_ids,
        resting_quantity: remaining,
        dust_discarded: Decimal::ZERO,
    }
}
