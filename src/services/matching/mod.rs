//! Matching Engine (C5), Settlement (C6), Concurrency Controller (C7), and
//! Event Publisher (C8) — the subsystem that turns an incoming order into
//! fills, ledger transfers, and published events under a single per-market
//! lock and transaction.

pub mod core;
pub mod engine;
pub mod events;
pub mod lock;
pub mod settlement;

pub use core::{match_taker, MatchFill, MatchOutcome};
pub use engine::{MatchingEngine, MatchingResult, RemainingOrder};
pub use events::{EngineEvent, EventPublisher, OrderFillEvent, OrderMatchEvent};
pub use lock::MarketLock;
