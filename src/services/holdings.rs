//! Holdings Store (C1)
//!
//! Authoritative per-account per-asset balances. `reserve`/`release` are the
//! CAS-guarded debit/credit pair that back order placement and cancellation;
//! `adjust` is the general signed-delta primitive settlement uses to credit
//! counterparties. Every mutating call runs inside the caller's transaction,
//! per the engine's single-transaction-per-match rule.

use rust_decimal::Decimal;
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::Holding;

pub struct HoldingsStore;

impl HoldingsStore {
    pub async fn get(
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        asset_id: Uuid,
    ) -> Result<Option<Holding>, EngineError> {
        let holding = sqlx::query_as::<_, Holding>(
            r#"
            SELECT account_id, asset_id, quantity, average_cost_basis, total_cost, updated_at
            FROM holdings
            WHERE account_id = $1 AND asset_id = $2
            "#,
        )
        .bind(account_id)
        .bind(asset_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(holding)
    }

    /// Add a signed delta to the free quantity. Fails with `InsufficientFunds`
    /// if a negative delta would drive the row below zero. Creates the row
    /// lazily if `delta > 0` and no row exists yet.
    pub async fn adjust(
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        asset_id: Uuid,
        delta: Decimal,
    ) -> Result<(), EngineError> {
        if delta < Decimal::ZERO {
            let updated = Self::reserve(tx, account_id, asset_id, -delta).await?;
            if !updated {
                return Err(EngineError::InsufficientFunds {
                    account_id,
                    asset_id,
                });
            }
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO holdings (account_id, asset_id, quantity, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (account_id, asset_id) DO UPDATE SET
                quantity = holdings.quantity + $3,
                updated_at = now()
            "#,
        )
        .bind(account_id)
        .bind(asset_id)
        .bind(delta)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Administrative absolute set. Never called from the matching path.
    pub async fn set(
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        asset_id: Uuid,
        quantity: Decimal,
    ) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO holdings (account_id, asset_id, quantity, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (account_id, asset_id) DO UPDATE SET
                quantity = $3,
                updated_at = now()
            "#,
        )
        .bind(account_id)
        .bind(asset_id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Atomic `WHERE quantity >= q` debit (the CAS-guarded upsert the design
    /// notes call for). Returns whether a row was updated; `false` means
    /// insufficient funds and is not itself an error.
    pub async fn reserve(
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        asset_id: Uuid,
        quantity: Decimal,
    ) -> Result<bool, EngineError> {
        let result = sqlx::query(
            r#"
            UPDATE holdings
            SET quantity = quantity - $3, updated_at = now()
            WHERE account_id = $1 AND asset_id = $2 AND quantity >= $3
            "#,
        )
        .bind(account_id)
        .bind(asset_id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Inverse of `reserve`: credits `quantity` back. Used on cancellation
    /// and on discarded dust remainders.
    pub async fn release(
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        asset_id: Uuid,
        quantity: Decimal,
    ) -> Result<(), EngineError> {
        Self::adjust(tx, account_id, asset_id, quantity).await
    }

    /// Credits `quantity` bought at `price` and rolls the weighted-average
    /// cost basis forward from the authoritative pre-update row, read with
    /// `FOR UPDATE` inside the same transaction.
    pub async fn adjust_with_cost_basis(
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        asset_id: Uuid,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<(), EngineError> {
        let row = sqlx::query(
            r#"
            SELECT quantity, total_cost FROM holdings
            WHERE account_id = $1 AND asset_id = $2
            FOR UPDATE
            "#,
        )
        .bind(account_id)
        .bind(asset_id)
        .fetch_optional(&mut **tx)
        .await?;

        let (prior_quantity, prior_total_cost) = match row {
            Some(r) => (
                r.get::<Decimal, _>("quantity"),
                r.get::<Decimal, _>("total_cost"),
            ),
            None => (Decimal::ZERO, Decimal::ZERO),
        };

        let (new_quantity, new_total_cost, new_avg_cost) =
            weighted_average_cost(prior_quantity, prior_total_cost, quantity, price);

        sqlx::query(
            r#"
            INSERT INTO holdings (account_id, asset_id, quantity, average_cost_basis, total_cost, updated_at)
            VALUES ($1, $2, $3, $4, $5, now())
            ON CONFLICT (account_id, asset_id) DO UPDATE SET
                quantity = $3,
                average_cost_basis = $4,
                total_cost = $5,
                updated_at = now()
            "#,
        )
        .bind(account_id)
        .bind(asset_id)
        .bind(new_quantity)
        .bind(new_avg_cost)
        .bind(new_total_cost)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Proportionally reduces the cost basis carried on a holding when
    /// `sold_quantity` units of it are sold. `average_cost_basis` itself does
    /// not change — the remaining lot still carries the same per-unit cost —
    /// only `total_cost` shrinks by the cost attributed to the units sold.
    /// A no-op if the account has no recorded lot for this asset yet.
    pub async fn reduce_cost_basis_on_sell(
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        asset_id: Uuid,
        sold_quantity: Decimal,
    ) -> Result<(), EngineError> {
        let row = sqlx::query(
            r#"
            SELECT average_cost_basis, total_cost FROM holdings
            WHERE account_id = $1 AND asset_id = $2
            FOR UPDATE
            "#,
        )
        .bind(account_id)
        .bind(asset_id)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(row) = row else {
            return Ok(());
        };

        let average_cost_basis: Decimal = row.get("average_cost_basis");
        let prior_total_cost: Decimal = row.get("total_cost");
        let new_total_cost = proportional_cost_reduction(average_cost_basis, prior_total_cost, sold_quantity);

        sqlx::query(
            r#"
            UPDATE holdings SET total_cost = $3, updated_at = now()
            WHERE account_id = $1 AND asset_id = $2
            "#,
        )
        .bind(account_id)
        .bind(asset_id)
        .bind(new_total_cost)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

/// The `total_cost` remaining after selling `sold_quantity` units at the
/// holding's existing `average_cost_basis`. Clamped at zero so float/decimal
/// drift across many partial fills can never drive it negative.
pub fn proportional_cost_reduction(
    average_cost_basis: Decimal,
    prior_total_cost: Decimal,
    sold_quantity: Decimal,
) -> Decimal {
    (prior_total_cost - average_cost_basis * sold_quantity).max(Decimal::ZERO)
}

/// Weighted-average cost-basis roll-forward: buying `added_quantity` at
/// `added_price` on top of a holding that previously carried `prior_quantity`
/// at `prior_total_cost`. Returns `(new_quantity, new_total_cost, new_average_cost)`.
///
/// Pulled out as a free function so the one piece of real arithmetic in this
/// module can be unit-tested without a database.
pub fn weighted_average_cost(
    prior_quantity: Decimal,
    prior_total_cost: Decimal,
    added_quantity: Decimal,
    added_price: Decimal,
) -> (Decimal, Decimal, Decimal) {
    let added_cost = added_quantity * added_price;
    let new_quantity = prior_quantity + added_quantity;
    let new_total_cost = prior_total_cost + added_cost;
    let new_avg_cost = if new_quantity.is_zero() {
        Decimal::ZERO
    } else {
        new_total_cost / new_quantity
    };
    (new_quantity, new_total_cost, new_avg_cost)
}
