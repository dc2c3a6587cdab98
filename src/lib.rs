//! Radar - Statistical-Arbitrage Pair Scanner Library
//!
//! Scores candidate pairs against a primary symbol and backtests the spread
//! entry rule.
//!
//! # Modules
//!
//! - `domain`: Core types and statistics (PairSeries, Trade, BacktestSummary)
//! - `strategy`: Pair analysis (stationarity, volatility, correlation regime,
//!   multi-timeframe confluence, reversion model)
//! - `backtest`: Spread backtester and walk-forward optimizer
//! - `ports`: Trait abstractions (PriceSource, HistoryStore)
//! - `adapters`: External implementations (candle files, synthetic data, history, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Pair scanner use case

pub mod domain;
pub mod strategy;
pub mod backtest;
pub mod ports;
pub mod adapters;
pub mod config;
pub mod application;

#[cfg(test)]
mod test_support;
