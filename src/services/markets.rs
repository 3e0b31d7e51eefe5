//! Read-only market lookups. Markets are immutable to the core once created
//! (administration/CRUD is out of scope per SPEC_FULL.md), so this is a thin
//! accessor rather than a full store.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::Market;

pub struct MarketStore;

impl MarketStore {
    pub async fn get(pool: &PgPool, market_id: Uuid) -> Result<Market, EngineError> {
        sqlx::query_as::<_, Market>(
            r#"
            SELECT id, symbol, base_asset_id, quote_asset_id,
                   min_price_increment, min_quantity_increment, max_quantity, active
            FROM markets WHERE id = $1
            "#,
        )
        .bind(market_id)
        .fetch_optional(pool)
        .await?
        .ok_or(EngineError::MarketNotFound(market_id))
    }
}
