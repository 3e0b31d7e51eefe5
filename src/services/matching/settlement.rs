//! Settlement (C6)
//!
//! Transfers base/quote between maker and taker holdings at match price,
//! inside the same transaction as the order and trade writes. Generalizes
//! the teacher's `SettlementService` multi-step ledger-write pattern from
//! prediction-market share redemption to a plain two-asset transfer.
//!
//! Both counterparties' reservations were already debited from `quantity` at
//! order placement time (base reserved by the ask side, quote reserved by
//! the bid side); a match only ever credits the other side of the trade.
//! Reservations are drawn down against the match amount and never
//! re-released, except through explicit cancellation or a discarded dust
//! remainder (`release_dust`) — a maker's better-than-limit price is never
//! refunded back to the taker.

use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{Market, Side};
use crate::services::holdings::HoldingsStore;

use super::core::MatchFill;

/// Settles a single fill: the bid side always ends up longer on base, the
/// ask side always ends up longer on quote, regardless of which side is the
/// taker. The buyer's base credit rolls the weighted-average cost basis
/// forward; the seller's base holding has its cost basis proportionally
/// reduced by the units just sold, and its quote holding gets a plain
/// proceeds credit.
pub async fn settle_fill(
    tx: &mut Transaction<'_, Postgres>,
    market: &Market,
    taker_side: Side,
    taker_account_id: Uuid,
    fill: &MatchFill,
) -> Result<(), EngineError> {
    let proceeds = fill.price * fill.quantity;

    let (buyer_account_id, seller_account_id) = match taker_side {
        Side::Bid => (taker_account_id, fill.maker_account_id),
        Side::Ask => (fill.maker_account_id, taker_account_id),
    };

    HoldingsStore::adjust_with_cost_basis(
        tx,
        buyer_account_id,
        market.base_asset_id,
        fill.quantity,
        fill.price,
    )
    .await?;

    HoldingsStore::reduce_cost_basis_on_sell(tx, seller_account_id, market.base_asset_id, fill.quantity).await?;
    HoldingsStore::adjust(tx, seller_account_id, market.quote_asset_id, proceeds).await?;

    Ok(())
}

/// Settles every fill from one matching pass, in order.
pub async fn settle_fills(
    tx: &mut Transaction<'_, Postgres>,
    market: &Market,
    taker_side: Side,
    taker_account_id: Uuid,
    fills: &[MatchFill],
) -> Result<(), EngineError> {
    for fill in fills {
        settle_fill(tx, market, taker_side, taker_account_id, fill).await?;
    }

    Ok(())
}

/// Releases a discarded dust remainder's reservation back to the taker: the
/// quote reservation (at the taker's limit price) for an unfilled bid
/// remainder, the base reservation for an unfilled ask remainder.
pub async fn release_dust(
    tx: &mut Transaction<'_, Postgres>,
    market: &Market,
    taker_side: Side,
    taker_account_id: Uuid,
    taker_price: Decimal,
    dust_quantity: Decimal,
) -> Result<(), EngineError> {
    if dust_quantity.is_zero() {
        return Ok(());
    }

    match taker_side {
        Side::Bid => {
            let quote_amount = taker_price * dust_quantity;
            HoldingsStore::release(tx, taker_account_id, market.quote_asset_id, quote_amount).await
        }
        Side::Ask => HoldingsStore::release(tx, taker_account_id, market.base_asset_id, dust_quantity).await,
    }
}
