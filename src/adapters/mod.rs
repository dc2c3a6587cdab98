//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Market Data: candle files, synthetic pairs, resampling
//! - History: JSON-lines snapshot store
//! - CLI: Command-line argument definitions

pub mod cli;
pub mod history;
pub mod market_data;

pub use cli::CliApp;
pub use history::JsonlHistoryStore;
pub use market_data::{FileCandleSource, ResamplingSource, SyntheticSource};
