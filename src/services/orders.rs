//! Order Store (C2)
//!
//! Durable resting-order records. `get_by_market_and_side_for_matching` is the
//! sole source of price-time priority: the matching engine trusts the sort
//! order it returns and never re-sorts in memory. `batch` applies all maker
//! mutations from one matching pass as a single round trip.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{Order, Side};

/// A queued maker mutation produced by the matching walk, applied in one
/// batch after the walk completes.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderMutation {
    UpdateQuantity { order_id: Uuid, new_quantity: Decimal },
    Delete { order_id: Uuid },
}

pub struct OrderStore;

impl OrderStore {
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        order: &Order,
    ) -> Result<Uuid, EngineError> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, market_id, account_id, side, price, quantity, original_quantity, quote_asset_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.id)
        .bind(order.market_id)
        .bind(order.account_id)
        .bind(order.side)
        .bind(order.price)
        .bind(order.quantity)
        .bind(order.original_quantity)
        .bind(order.quote_asset_id)
        .bind(order.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(order.id)
    }

    pub async fn get_by_id(pool: &PgPool, order_id: Uuid) -> Result<Option<Order>, EngineError> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, market_id, account_id, side, price, quantity, original_quantity, quote_asset_id, created_at
            FROM orders WHERE id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(pool)
        .await?;

        Ok(order)
    }

    pub async fn get_by_market(pool: &PgPool, market_id: Uuid) -> Result<Vec<Order>, EngineError> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, market_id, account_id, side, price, quantity, original_quantity, quote_asset_id, created_at
            FROM orders WHERE market_id = $1
            "#,
        )
        .bind(market_id)
        .fetch_all(pool)
        .await?;

        Ok(orders)
    }

    /// Returns resting orders for `market_id`/`side` sorted for matching:
    /// bids descending by price, asks ascending by price, ties broken by
    /// `created_at` ascending (oldest first).
    pub async fn get_by_market_and_side_for_matching(
        tx: &mut Transaction<'_, Postgres>,
        market_id: Uuid,
        side: Side,
    ) -> Result<Vec<Order>, EngineError> {
        let query = match side {
            Side::Bid => {
                r#"
                SELECT id, market_id, account_id, side, price, quantity, original_quantity, quote_asset_id, created_at
                FROM orders
                WHERE market_id = $1 AND side = 'bid'
                ORDER BY price DESC, created_at ASC
                "#
            }
            Side::Ask => {
                r#"
                SELECT id, market_id, account_id, side, price, quantity, original_quantity, quote_asset_id, created_at
                FROM orders
                WHERE market_id = $1 AND side = 'ask'
                ORDER BY price ASC, created_at ASC
                "#
            }
        };

        let orders = sqlx::query_as::<_, Order>(query)
            .bind(market_id)
            .fetch_all(&mut **tx)
            .await?;

        Ok(orders)
    }

    pub async fn update_quantity(
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
        new_quantity: Decimal,
    ) -> Result<(), EngineError> {
        debug_assert!(new_quantity > Decimal::ZERO, "update_quantity requires new_quantity > 0");

        sqlx::query("UPDATE orders SET quantity = $2 WHERE id = $1")
            .bind(order_id)
            .bind(new_quantity)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub async fn delete(tx: &mut Transaction<'_, Postgres>, order_id: Uuid) -> Result<bool, EngineError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_by_market(
        tx: &mut Transaction<'_, Postgres>,
        market_id: Uuid,
    ) -> Result<(), EngineError> {
        sqlx::query("DELETE FROM orders WHERE market_id = $1")
            .bind(market_id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Applies every queued maker mutation from one matching pass as a single
    /// batch, rather than one statement per order.
    pub async fn batch(
        tx: &mut Transaction<'_, Postgres>,
        mutations: &[OrderMutation],
    ) -> Result<(), EngineError> {
        let mut update_ids = Vec::new();
        let mut update_quantities = Vec::new();
        let mut delete_ids = Vec::new();

        for mutation in mutations {
            match mutation {
                OrderMutation::UpdateQuantity { order_id, new_quantity } => {
                    update_ids.push(*order_id);
                    update_quantities.push(*new_quantity);
                }
                OrderMutation::Delete { order_id } => delete_ids.push(*order_id),
            }
        }

        if !update_ids.is_empty() {
            sqlx::query(
                r#"
                UPDATE orders o
                SET quantity = u.new_quantity
                FROM UNNEST($1::uuid[], $2::numeric[]) AS u(id, new_quantity)
                WHERE o.id = u.id
                "#,
            )
            .bind(&update_ids)
            .bind(&update_quantities)
            .execute(&mut **tx)
            .await?;
        }

        if !delete_ids.is_empty() {
            sqlx::query("DELETE FROM orders WHERE id = ANY($1::uuid[])")
                .bind(&delete_ids)
                .execute(&mut **tx)
                .await?;
        }

        Ok(())
    }
}
