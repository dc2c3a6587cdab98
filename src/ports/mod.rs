//! Ports Layer - Trait definitions for external dependencies
//!
//! Following hexagonal architecture, these traits abstract:
//! - Candle supply (`PriceSource`)
//! - Scan history persistence (`HistoryStore`)

pub mod market_data;
pub mod history;
pub mod mocks;

pub use market_data::{align_pair, fetch_pair, MarketDataError, PriceSource};
pub use history::{HistoryError, HistoryStore};
pub use mocks::{InMemoryHistoryStore, MockPriceSource};
