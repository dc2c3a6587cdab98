//! Backtesting - historical replay of the spread entry rule
//!
//! `engine` replays one parameter set; `walk_forward` searches the
//! parameter grid on rolling train windows and scores it out-of-sample.

pub mod engine;
pub mod walk_forward;

pub use engine::{run_backtest, BacktestResult, SkipReason};
pub use walk_forward::{
    run_walk_forward, OptimizationConfidence, OptimizedParams, WalkForwardParams, WindowResult,
};
