//! Trade Store (C3)
//!
//! Append-only execution log. Trades are written in the same transaction as
//! the order and holdings mutations they settle, so a crash between them is
//! impossible by construction.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::Trade;

pub struct TradeStore;

impl TradeStore {
    pub async fn create(tx: &mut Transaction<'_, Postgres>, trade: &Trade) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO trades (
                id, market_id, taker_order_id, maker_order_id, taker_side,
                price, quantity, taker_account_id, maker_account_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(trade.id)
        .bind(trade.market_id)
        .bind(trade.taker_order_id)
        .bind(trade.maker_order_id)
        .bind(trade.taker_side)
        .bind(trade.price)
        .bind(trade.quantity)
        .bind(trade.taker_account_id)
        .bind(trade.maker_account_id)
        .bind(trade.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Writes every trade from one matching pass in a single round trip.
    pub async fn batch_create(
        tx: &mut Transaction<'_, Postgres>,
        trades: &[Trade],
    ) -> Result<(), EngineError> {
        if trades.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = trades.iter().map(|t| t.id).collect();
        let market_ids: Vec<Uuid> = trades.iter().map(|t| t.market_id).collect();
        let taker_order_ids: Vec<Uuid> = trades.iter().map(|t| t.taker_order_id).collect();
        let maker_order_ids: Vec<Uuid> = trades.iter().map(|t| t.maker_order_id).collect();
        let taker_sides: Vec<crate::models::Side> = trades.iter().map(|t| t.taker_side).collect();
        let prices: Vec<Decimal> = trades.iter().map(|t| t.price).collect();
        let quantities: Vec<Decimal> = trades.iter().map(|t| t.quantity).collect();
        let taker_account_ids: Vec<Uuid> = trades.iter().map(|t| t.taker_account_id).collect();
        let maker_account_ids: Vec<Uuid> = trades.iter().map(|t| t.maker_account_id).collect();
        let created_ats: Vec<chrono::DateTime<chrono::Utc>> =
            trades.iter().map(|t| t.created_at).collect();

        sqlx::query(
            r#"
            INSERT INTO trades (
                id, market_id, taker_order_id, maker_order_id, taker_side,
                price, quantity, taker_account_id, maker_account_id, created_at
            )
            SELECT * FROM UNNEST(
                $1::uuid[], $2::uuid[], $3::uuid[], $4::uuid[], $5::order_side[],
                $6::numeric[], $7::numeric[], $8::uuid[], $9::uuid[], $10::timestamptz[]
            )
            "#,
        )
        .bind(&ids)
        .bind(&market_ids)
        .bind(&taker_order_ids)
        .bind(&maker_order_ids)
        .bind(&taker_sides)
        .bind(&prices)
        .bind(&quantities)
        .bind(&taker_account_ids)
        .bind(&maker_account_ids)
        .bind(&created_ats)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    pub async fn get_recent(
        pool: &PgPool,
        market_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Trade>, EngineError> {
        let trades = sqlx::query_as::<_, Trade>(
            r#"
            SELECT id, market_id, taker_order_id, maker_order_id, taker_side,
                   price, quantity, taker_account_id, maker_account_id, created_at
            FROM trades
            WHERE market_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(market_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(trades)
    }

    pub async fn get_last_price(
        pool: &PgPool,
        market_id: Uuid,
    ) -> Result<Option<Decimal>, EngineError> {
        let row: Option<(Decimal,)> = sqlx::query_as(
            r#"
            SELECT price FROM trades
            WHERE market_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(market_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|(price,)| price))
    }

    /// Administrative only; never called from the matching path.
    pub async fn delete_by_market(
        tx: &mut Transaction<'_, Postgres>,
        market_id: Uuid,
    ) -> Result<(), EngineError> {
        sqlx::query("DELETE FROM trades WHERE market_id = $1")
            .bind(market_id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }
}
