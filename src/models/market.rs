use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A tradable market pairing a base and a quote asset. Immutable to the core
/// once created.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Market {
    pub id: Uuid,
    pub symbol: String,
    pub base_asset_id: Uuid,
    pub quote_asset_id: Uuid,
    pub min_price_increment: Decimal,
    pub min_quantity_increment: Decimal,
    pub max_quantity: Option<Decimal>,
    pub active: bool,
}

impl Market {
    /// True if `quantity` exceeds the market's configured cap, if any.
    pub fn exceeds_max_quantity(&self, quantity: Decimal) -> bool {
        match self.max_quantity {
            Some(max) => quantity > max,
            None => false,
        }
    }

    /// True if `quantity` is smaller than the dust threshold for this market
    /// and should be discarded rather than left resting (see DESIGN.md).
    pub fn is_dust(&self, quantity: Decimal) -> bool {
        quantity > Decimal::ZERO && quantity < self.min_quantity_increment
    }
}
