use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Authoritative per-account per-asset balance row.
///
/// `quantity` is the free (unreserved) amount available to debit; reservation
/// at order-placement time moves funds out of `quantity` permanently (they
/// are only ever returned via an explicit `release`, never implicitly).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Holding {
    pub account_id: Uuid,
    pub asset_id: Uuid,
    pub quantity: Decimal,
    pub average_cost_basis: Decimal,
    pub total_cost: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoldingResponse {
    pub asset_id: Uuid,
    pub quantity: Decimal,
}

impl From<Holding> for HoldingResponse {
    fn from(h: Holding) -> Self {
        Self {
            asset_id: h.asset_id,
            quantity: h.quantity,
        }
    }
}
