use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::order::Side;

/// An executed trade. Append-only; never mutated once written.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trade {
    pub id: Uuid,
    pub market_id: Uuid,
    pub taker_order_id: Uuid,
    pub maker_order_id: Uuid,
    pub taker_side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub taker_account_id: Uuid,
    pub maker_account_id: Uuid,
    pub created_at: DateTime<Utc>,
}
