//! Strategy Parameters
//!
//! Immutable configuration structs for every analysis layer. Each one is
//! passed explicitly into the function that consumes it; nothing reads
//! thresholds from global state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default rolling window for the backtester's spread z-score (bars)
pub const ROLLING_WINDOW: usize = 100;

/// Bars the backtester needs beyond the rolling window before it trades
pub const BACKTEST_MIN_EXTRA_BARS: usize = 10;

/// Stationarity / mean-reversion analyzer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationarityConfig {
    /// Trailing bars used for each rolling hedge-ratio regression
    pub rolling_window: usize,
    /// Minimum bars before any hedge ratio is estimated
    pub min_window: usize,
    /// Lagged differences in the ADF regression
    pub adf_lags: usize,
    /// Single ADF critical value (5%, constant, large sample)
    pub adf_critical_value: f64,
    /// Engle-Granger critical value for the residual test (5%, two series)
    pub cointegration_critical_value: f64,
    /// Shortest acceptable half-life (bars)
    pub min_half_life_bars: f64,
    /// Longest acceptable half-life (bars)
    pub max_half_life_bars: f64,
}

impl Default for StationarityConfig {
    fn default() -> Self {
        Self {
            rolling_window: 60,
            min_window: 30,
            adf_lags: 1,
            adf_critical_value: -2.86,
            cointegration_critical_value: -3.34,
            min_half_life_bars: 1.0,
            max_half_life_bars: 100.0,
        }
    }
}

impl StationarityConfig {
    pub fn with_rolling_window(mut self, window: usize) -> Self {
        self.rolling_window = window;
        self
    }

    pub fn with_half_life_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_half_life_bars = min;
        self.max_half_life_bars = max;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_window < 10 {
            return Err(ConfigError::InvalidWindow("stationarity.min_window", self.min_window, 10));
        }
        if self.rolling_window < self.min_window {
            return Err(ConfigError::InvalidWindow(
                "stationarity.rolling_window",
                self.rolling_window,
                self.min_window,
            ));
        }
        if self.adf_lags > 4 {
            return Err(ConfigError::OutOfRange("stationarity.adf_lags", self.adf_lags as f64));
        }
        if self.adf_critical_value >= 0.0 || self.cointegration_critical_value >= 0.0 {
            return Err(ConfigError::OutOfRange(
                "stationarity critical value",
                self.adf_critical_value.max(self.cointegration_critical_value),
            ));
        }
        if self.min_half_life_bars < 0.0 || self.max_half_life_bars <= self.min_half_life_bars {
            return Err(ConfigError::InvalidBounds(
                "stationarity half-life",
                self.min_half_life_bars,
                self.max_half_life_bars,
            ));
        }
        Ok(())
    }
}

/// Volatility-adjusted spread classifier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityConfig {
    /// Minimum returns per leg before volatility is meaningful
    pub min_samples: usize,
    /// |z| above which a low-volatility signal is premium
    pub premium_z: f64,
    /// |z| above which a moderate-volatility signal is strong
    pub strong_z: f64,
    /// |z| above which a signal is at least moderate
    pub moderate_z: f64,
    /// Combined volatility ceiling for premium
    pub premium_volatility: f64,
    /// Combined volatility ceiling for strong
    pub strong_volatility: f64,
    /// Combined volatility above which a weak signal is noisy
    pub noisy_volatility: f64,
    /// |adjusted z| mapped to a signal strength of 100
    pub strength_saturation_z: f64,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            min_samples: 10,
            premium_z: 2.0,
            strong_z: 1.5,
            moderate_z: 1.0,
            premium_volatility: 0.02,
            strong_volatility: 0.04,
            noisy_volatility: 0.05,
            strength_saturation_z: 3.0,
        }
    }
}

impl VolatilityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_samples < 2 {
            return Err(ConfigError::InvalidWindow("volatility.min_samples", self.min_samples, 2));
        }
        if !(self.premium_z >= self.strong_z && self.strong_z >= self.moderate_z && self.moderate_z > 0.0) {
            return Err(ConfigError::InvalidBounds("volatility z tiers", self.moderate_z, self.premium_z));
        }
        if !(self.premium_volatility > 0.0
            && self.premium_volatility <= self.strong_volatility
            && self.strong_volatility <= self.noisy_volatility)
        {
            return Err(ConfigError::InvalidBounds(
                "volatility cutoffs",
                self.premium_volatility,
                self.noisy_volatility,
            ));
        }
        if self.strength_saturation_z <= 0.0 {
            return Err(ConfigError::OutOfRange("volatility.strength_saturation_z", self.strength_saturation_z));
        }
        Ok(())
    }
}

/// Correlation velocity detector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityConfig {
    /// Returns per correlation window
    pub window: usize,
    /// Bars the previous window is shifted back
    pub shift: usize,
    /// |Δcorrelation| below which the regime is stable
    pub velocity_threshold: f64,
    /// Correlation at or above which the level is strong
    pub strong_correlation: f64,
    /// Correlation at or above which the level is moderate
    pub moderate_correlation: f64,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            window: 30,
            shift: 5,
            velocity_threshold: 0.01,
            strong_correlation: 0.7,
            moderate_correlation: 0.4,
        }
    }
}

impl VelocityConfig {
    /// Returns needed for current, previous and prior windows
    pub fn required_returns(&self) -> usize {
        self.window + 2 * self.shift
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window < 5 {
            return Err(ConfigError::InvalidWindow("velocity.window", self.window, 5));
        }
        if self.shift == 0 {
            return Err(ConfigError::InvalidWindow("velocity.shift", self.shift, 1));
        }
        if self.velocity_threshold < 0.0 {
            return Err(ConfigError::OutOfRange("velocity.velocity_threshold", self.velocity_threshold));
        }
        if !(0.0 < self.moderate_correlation && self.moderate_correlation < self.strong_correlation && self.strong_correlation <= 1.0) {
            return Err(ConfigError::InvalidBounds(
                "velocity correlation levels",
                self.moderate_correlation,
                self.strong_correlation,
            ));
        }
        Ok(())
    }
}

/// Pair analysis orchestrator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Trailing bars for the spread mean/std/z-score and leg volatility
    pub z_window: usize,
    /// Aligned bars required before any analysis runs
    pub min_bars: usize,
    /// |z| that counts as an extreme divergence
    pub extreme_z_score: f64,
    /// |z| that counts as an elevated divergence
    pub high_z_score: f64,
    /// Weight of the spread component in the opportunity score
    pub spread_weight: f64,
    /// Weight of the method component in the opportunity score
    pub method_weight: f64,
    /// Upper bound on the fallback reversion lookahead (bars)
    pub max_fallback_lookahead: usize,
    pub stationarity: StationarityConfig,
    pub volatility: VolatilityConfig,
    pub velocity: VelocityConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            z_window: 100,
            min_bars: 50,
            extreme_z_score: 2.0,
            high_z_score: 1.0,
            spread_weight: 0.6,
            method_weight: 0.4,
            max_fallback_lookahead: 50,
            stationarity: StationarityConfig::default(),
            volatility: VolatilityConfig::default(),
            velocity: VelocityConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn with_extreme_z_score(mut self, z: f64) -> Self {
        self.extreme_z_score = z;
        self
    }

    pub fn with_z_window(mut self, window: usize) -> Self {
        self.z_window = window;
        self
    }

    pub fn with_stationarity(mut self, stationarity: StationarityConfig) -> Self {
        self.stationarity = stationarity;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.z_window < 10 {
            return Err(ConfigError::InvalidWindow("analysis.z_window", self.z_window, 10));
        }
        if self.min_bars < self.stationarity.min_window {
            return Err(ConfigError::InvalidWindow(
                "analysis.min_bars",
                self.min_bars,
                self.stationarity.min_window,
            ));
        }
        if self.extreme_z_score <= 0.0 || self.extreme_z_score > 10.0 {
            return Err(ConfigError::InvalidZThreshold(self.extreme_z_score));
        }
        if self.high_z_score <= 0.0 || self.high_z_score > self.extreme_z_score {
            return Err(ConfigError::InvalidZThreshold(self.high_z_score));
        }
        let weights = self.spread_weight + self.method_weight;
        if self.spread_weight < 0.0 || self.method_weight < 0.0 || (weights - 1.0).abs() > 1e-9 {
            return Err(ConfigError::InvalidWeights(self.spread_weight, self.method_weight));
        }
        if self.max_fallback_lookahead == 0 {
            return Err(ConfigError::InvalidWindow("analysis.max_fallback_lookahead", 0, 1));
        }
        self.stationarity.validate()?;
        self.volatility.validate()?;
        self.velocity.validate()?;
        Ok(())
    }
}

/// Multi-timeframe aggregation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiTimeframeConfig {
    /// Per-interval weights; intervals not listed weigh 1.0
    pub weights: BTreeMap<String, f64>,
    /// Aligned fraction at or above which confidence can be high
    pub high_alignment: f64,
    /// Aligned fraction at or above which confidence is medium
    pub medium_alignment: f64,
    /// Mean agreement below which a low-agreement note is raised
    pub low_agreement: f64,
    /// Scores within this distance count as identical
    pub identical_score_epsilon: f64,
}

impl Default for MultiTimeframeConfig {
    fn default() -> Self {
        Self {
            weights: BTreeMap::new(),
            high_alignment: 0.8,
            medium_alignment: 0.5,
            low_agreement: 0.5,
            identical_score_epsilon: 1e-9,
        }
    }
}

impl MultiTimeframeConfig {
    pub fn weight_for(&self, interval: &str) -> f64 {
        self.weights.get(interval).copied().unwrap_or(1.0)
    }

    pub fn with_weight(mut self, interval: &str, weight: f64) -> Self {
        self.weights.insert(interval.to_string(), weight);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some((interval, w)) = self.weights.iter().find(|(_, w)| !(**w > 0.0) || !w.is_finite()) {
            return Err(ConfigError::InvalidTimeframeWeight(interval.clone(), *w));
        }
        if !(0.0 < self.medium_alignment && self.medium_alignment <= self.high_alignment && self.high_alignment <= 1.0) {
            return Err(ConfigError::InvalidBounds(
                "timeframe alignment",
                self.medium_alignment,
                self.high_alignment,
            ));
        }
        if !(0.0..=1.0).contains(&self.low_agreement) {
            return Err(ConfigError::OutOfRange("timeframes.low_agreement", self.low_agreement));
        }
        Ok(())
    }
}

/// Reversion probability model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReversionModelOptions {
    /// |z| at or above which a tradable snapshot is an entry
    pub entry_z_score: f64,
    /// |z| at or below which a later snapshot counts as reverted
    pub exit_z_score: f64,
    /// Snapshots scanned forward before an entry times out
    pub lookahead_bars: usize,
    /// Samples a bucket needs before it is trusted
    pub min_sample_size: usize,
}

impl Default for ReversionModelOptions {
    fn default() -> Self {
        Self {
            entry_z_score: 2.0,
            exit_z_score: 0.5,
            lookahead_bars: 10,
            min_sample_size: 10,
        }
    }
}

impl ReversionModelOptions {
    pub fn with_lookahead(mut self, bars: usize) -> Self {
        self.lookahead_bars = bars;
        self
    }

    pub fn with_min_sample_size(mut self, n: usize) -> Self {
        self.min_sample_size = n;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entry_z_score <= 0.0 {
            return Err(ConfigError::InvalidZThreshold(self.entry_z_score));
        }
        if self.exit_z_score < 0.0 || self.exit_z_score >= self.entry_z_score {
            return Err(ConfigError::InvalidBounds("reversion exit/entry z", self.exit_z_score, self.entry_z_score));
        }
        if self.lookahead_bars == 0 {
            return Err(ConfigError::InvalidWindow("reversion.lookahead_bars", 0, 1));
        }
        if self.min_sample_size == 0 {
            return Err(ConfigError::InvalidWindow("reversion.min_sample_size", 0, 1));
        }
        Ok(())
    }
}

/// Backtest trading rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// |z| that opens a position
    pub entry_spread_threshold: f64,
    /// Full-sample return correlation required to trade the pair
    pub min_correlation: f64,
    /// Combined P&L (percent) that closes a winner
    pub take_profit_percent: f64,
    /// Combined loss (percent) that closes a loser
    pub stop_loss_percent: f64,
    /// Trailing bars for the spread z-score
    pub rolling_window: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            entry_spread_threshold: 3.0,
            min_correlation: 0.7,
            take_profit_percent: 0.5,
            stop_loss_percent: 0.5,
            rolling_window: ROLLING_WINDOW,
        }
    }
}

impl BacktestConfig {
    pub fn with_entry_threshold(mut self, z: f64) -> Self {
        self.entry_spread_threshold = z;
        self
    }

    pub fn with_exits(mut self, take_profit_percent: f64, stop_loss_percent: f64) -> Self {
        self.take_profit_percent = take_profit_percent;
        self.stop_loss_percent = stop_loss_percent;
        self
    }

    pub fn with_min_correlation(mut self, min_correlation: f64) -> Self {
        self.min_correlation = min_correlation;
        self
    }

    /// Bars a series needs before the backtester runs
    pub fn min_bars(&self) -> usize {
        self.rolling_window + BACKTEST_MIN_EXTRA_BARS
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entry_spread_threshold == 0.0 || !self.entry_spread_threshold.is_finite() {
            return Err(ConfigError::InvalidZThreshold(self.entry_spread_threshold));
        }
        if !(-1.0..=1.0).contains(&self.min_correlation) {
            return Err(ConfigError::OutOfRange("backtest.min_correlation", self.min_correlation));
        }
        if self.take_profit_percent <= 0.0 || self.take_profit_percent > 100.0 {
            return Err(ConfigError::InvalidTakeProfit(self.take_profit_percent));
        }
        if self.stop_loss_percent <= 0.0 || self.stop_loss_percent > 100.0 {
            return Err(ConfigError::InvalidStopLoss(self.stop_loss_percent));
        }
        if self.rolling_window < 10 {
            return Err(ConfigError::InvalidWindow("backtest.rolling_window", self.rolling_window, 10));
        }
        Ok(())
    }
}

/// Walk-forward optimizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    /// Bars in each training slice
    pub train_window: usize,
    /// Bars in each held-out test slice
    pub test_window: usize,
    /// Entry thresholds searched on each training slice
    pub entry_thresholds: Vec<f64>,
    /// Take-profit levels searched
    pub take_profit_percents: Vec<f64>,
    /// Stop-loss levels searched
    pub stop_loss_percents: Vec<f64>,
    /// Trades a candidate needs on the training slice to be eligible
    pub min_train_trades: usize,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_window: 500,
            test_window: 100,
            entry_thresholds: vec![2.0, 2.5, 3.0],
            take_profit_percents: vec![0.3, 0.5, 1.0],
            stop_loss_percents: vec![0.3, 0.5, 1.0],
            min_train_trades: 1,
        }
    }
}

impl WalkForwardConfig {
    pub fn with_windows(mut self, train: usize, test: usize) -> Self {
        self.train_window = train;
        self.test_window = test;
        self
    }

    /// Number of parameter combinations tried per window
    pub fn grid_size(&self) -> usize {
        self.entry_thresholds.len() * self.take_profit_percents.len() * self.stop_loss_percents.len()
    }

    pub fn validate(&self, backtest: &BacktestConfig) -> Result<(), ConfigError> {
        if self.train_window < backtest.min_bars() {
            return Err(ConfigError::InvalidWindow(
                "walk_forward.train_window",
                self.train_window,
                backtest.min_bars(),
            ));
        }
        if self.test_window < BACKTEST_MIN_EXTRA_BARS {
            return Err(ConfigError::InvalidWindow(
                "walk_forward.test_window",
                self.test_window,
                BACKTEST_MIN_EXTRA_BARS,
            ));
        }
        if self.grid_size() == 0 {
            return Err(ConfigError::EmptyParameterGrid);
        }
        if let Some(&z) = self.entry_thresholds.iter().find(|z| **z == 0.0 || !z.is_finite()) {
            return Err(ConfigError::InvalidZThreshold(z));
        }
        if let Some(&tp) = self.take_profit_percents.iter().find(|tp| **tp <= 0.0) {
            return Err(ConfigError::InvalidTakeProfit(tp));
        }
        if let Some(&sl) = self.stop_loss_percents.iter().find(|sl| **sl <= 0.0) {
            return Err(ConfigError::InvalidStopLoss(sl));
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid window {0}: {1} (minimum {2})")]
    InvalidWindow(&'static str, usize, usize),
    #[error("Invalid z-threshold: {0}")]
    InvalidZThreshold(f64),
    #[error("Invalid bounds for {0}: {1} .. {2}")]
    InvalidBounds(&'static str, f64, f64),
    #[error("Value out of range for {0}: {1}")]
    OutOfRange(&'static str, f64),
    #[error("Invalid score weights: spread {0} + method {1} must sum to 1")]
    InvalidWeights(f64, f64),
    #[error("Invalid weight for timeframe {0}: {1}")]
    InvalidTimeframeWeight(String, f64),
    #[error("Invalid take profit: {0}% (must be 0 < profit <= 100)")]
    InvalidTakeProfit(f64),
    #[error("Invalid stop loss: {0}% (must be 0 < loss <= 100)")]
    InvalidStopLoss(f64),
    #[error("Walk-forward parameter grid is empty")]
    EmptyParameterGrid,
}
