//! Domain Layer - Pure types and arithmetic for pair analysis
//!
//! Nothing here touches I/O, async, or global state. Strategy and backtest
//! code build on these types; adapters only convert into them.

pub mod series;
pub mod stats;
pub mod trade;

pub use series::{Ohlcv, PairSeries};
pub use trade::{BacktestSummary, ExitReason, Trade, TradeDirection};
