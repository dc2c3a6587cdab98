//! Strategy Layer - Pair analysis and scoring
//!
//! Each layer consumes the one below it:
//! - `stationarity`: rolling hedge ratio, ADF, cointegration, half-life
//! - `volatility`: volatility-adjusted z-score and signal quality tier
//! - `correlation_velocity`: correlation regime from its first and second derivative
//! - `pair_analyzer`: one scored result per pair
//! - `multi_timeframe`: cross-interval confluence
//! - `reversion_model`: empirical reversion odds from past results
//!
//! Everything here is a pure function of its inputs and an explicit config.

pub mod params;
pub mod stationarity;
pub mod volatility;
pub mod correlation_velocity;
pub mod pair_analyzer;
pub mod multi_timeframe;
pub mod reversion_model;

pub use params::{
    AnalysisConfig, BacktestConfig, ConfigError, MultiTimeframeConfig, ReversionModelOptions,
    StationarityConfig, VelocityConfig, VolatilityConfig, WalkForwardConfig,
};
pub use stationarity::StationarityAnalysis;
pub use volatility::{SignalQuality, VolatilityAdjustedSpreadResult};
pub use correlation_velocity::{CorrelationRegime, CorrelationVelocityResult};
pub use pair_analyzer::{
    analyze_pair, AnalysisNote, ConfluenceAnalysis, PairAnalysisResult, ReversionMethod,
    ReversionProbability, SignalDirection,
};
pub use multi_timeframe::{
    analyze_multi_timeframe, ConfluenceConfidence, ConfluenceNote, ConfluenceResult, TimeframeAnalysis,
};
pub use reversion_model::{rescale_with_history, HistoricalRecord, ReversionModel};
