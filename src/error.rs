//! Crate-wide error taxonomy.
//!
//! Domain errors (`InvalidOrder`, `InsufficientFunds`, `MarketNotFound`,
//! `OrderNotFound`) surface directly to callers. Transient errors (`Conflict`,
//! `StorageError`) mean the transaction was aborted and rolled back; the
//! caller sees a safe empty result, never partial state.

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("market not found: {0}")]
    MarketNotFound(Uuid),

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("insufficient funds: account={account_id} asset={asset_id}")]
    InsufficientFunds { account_id: Uuid, asset_id: Uuid },

    #[error("order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("lock contention exhausted for market {0}")]
    Conflict(Uuid),

    #[error("storage error: {0}")]
    StorageError(String),
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::StorageError(err.to_string())
    }
}

impl From<redis::RedisError> for EngineError {
    fn from(err: redis::RedisError) -> Self {
        EngineError::StorageError(err.to_string())
    }
}
