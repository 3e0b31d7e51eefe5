use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_side", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "bid"),
            Side::Ask => write!(f, "ask"),
        }
    }
}

/// A durable resting-order record. `quantity` is always the *remaining*
/// (unfilled) amount; the matching engine only ever decreases it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub market_id: Uuid,
    pub account_id: Uuid,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub original_quantity: Decimal,
    /// Denormalized from the order's market at creation time, so a resting
    /// order carries the asset it will settle in without a market join.
    pub quote_asset_id: Uuid,
    #[serde(serialize_with = "crate::models::order::millis::serialize")]
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied inputs for a new taker order.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub account_id: Uuid,
}

pub(crate) mod millis {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(dt.timestamp_millis())
    }
}
