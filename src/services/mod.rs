pub mod holdings;
pub mod markets;
pub mod matching;
pub mod orders;
pub mod trades;
