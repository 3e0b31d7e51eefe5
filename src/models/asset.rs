use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A fungible asset the engine can hold and transfer. Immutable to the core.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Asset {
    pub id: Uuid,
    pub symbol: String,
    pub decimals: i16,
}
