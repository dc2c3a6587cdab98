//! Walk-Forward Optimizer
//!
//! Slides a train/test window pair across the series. For each window:
//! 1. grid-search entry threshold × take profit × stop loss on the train span
//! 2. replay the winner on the following test span (out-of-sample)
//! 3. replay the default parameters on the same test span as baseline
//!
//! The window advances by the test length, so test spans tile the series
//! without overlap.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::engine::run_backtest;
use crate::strategy::params::{BacktestConfig, WalkForwardConfig};

/// One point of the parameter grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardParams {
    pub entry_spread_threshold: f64,
    pub take_profit_percent: f64,
    pub stop_loss_percent: f64,
}

impl WalkForwardParams {
    pub fn from_config(config: &BacktestConfig) -> Self {
        Self {
            entry_spread_threshold: config.entry_spread_threshold,
            take_profit_percent: config.take_profit_percent,
            stop_loss_percent: config.stop_loss_percent,
        }
    }

    pub fn apply(&self, base: &BacktestConfig) -> BacktestConfig {
        base.clone()
            .with_entry_threshold(self.entry_spread_threshold)
            .with_exits(self.take_profit_percent, self.stop_loss_percent)
    }
}

impl std::fmt::Display for WalkForwardParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "entry {:.2} / tp {:.2}% / sl {:.2}%",
            self.entry_spread_threshold, self.take_profit_percent, self.stop_loss_percent
        )
    }
}

/// Outcome of one train/test window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    pub index: usize,
    /// Bar range [train_start, train_end) used for the grid search
    pub train_start: usize,
    pub train_end: usize,
    /// Bar range [test_start, test_end) traded out-of-sample
    pub test_start: usize,
    pub test_end: usize,
    pub params: WalkForwardParams,
    /// False when no grid point reached `min_train_trades`
    pub optimized: bool,
    pub train_profit_percent: f64,
    pub train_trades: usize,
    pub test_profit_percent: f64,
    pub test_trades: usize,
    pub test_winning_trades: usize,
    pub baseline_profit_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationConfidence {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for OptimizationConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimizationConfidence::High => write!(f, "high"),
            OptimizationConfidence::Medium => write!(f, "medium"),
            OptimizationConfidence::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedParams {
    pub symbol: String,
    pub primary_symbol: String,
    /// Most frequently selected parameters; defaults when no window ran
    pub recommended: WalkForwardParams,
    pub defaults: WalkForwardParams,
    pub windows: Vec<WindowResult>,
    pub out_of_sample_profit_percent: f64,
    pub out_of_sample_trades: usize,
    /// Fraction of out-of-sample trades that won, 0..=1
    pub out_of_sample_win_rate: f64,
    pub baseline_profit_percent: f64,
    /// Out-of-sample profit minus baseline profit, in percent points
    pub improvement_percent: f64,
    /// Fraction of windows with positive test profit
    pub positive_window_ratio: f64,
    pub confidence: OptimizationConfidence,
}

impl OptimizedParams {
    pub fn total_windows(&self) -> usize {
        self.windows.len()
    }
}

pub fn confidence_for(positive_ratio: f64, windows: usize) -> OptimizationConfidence {
    if windows >= 3 && positive_ratio >= 0.75 {
        OptimizationConfidence::High
    } else if windows > 0 && positive_ratio >= 0.5 {
        OptimizationConfidence::Medium
    } else {
        OptimizationConfidence::Low
    }
}

/// Best grid point on the train slice by total profit; ties keep the
/// earlier grid point
fn optimize_window(
    primary: &[f64],
    secondary: &[f64],
    symbol: &str,
    primary_symbol: &str,
    base: &BacktestConfig,
    config: &WalkForwardConfig,
) -> Option<(WalkForwardParams, f64, usize)> {
    let mut best: Option<(WalkForwardParams, f64, usize)> = None;

    for &entry in &config.entry_thresholds {
        for &take_profit in &config.take_profit_percents {
            for &stop_loss in &config.stop_loss_percents {
                let params = WalkForwardParams {
                    entry_spread_threshold: entry,
                    take_profit_percent: take_profit,
                    stop_loss_percent: stop_loss,
                };
                let result = run_backtest(primary, secondary, symbol, primary_symbol, &params.apply(base));
                if result.summary.total_trades < config.min_train_trades.max(1) {
                    continue;
                }
                let profit = result.summary.total_profit_percent;
                let better = match &best {
                    Some((_, best_profit, _)) => profit > *best_profit,
                    None => true,
                };
                if better {
                    best = Some((params, profit, result.summary.total_trades));
                }
            }
        }
    }

    best
}

/// Most frequent parameters across windows; ties go to the one selected first
fn mode_params(windows: &[WindowResult]) -> Option<WalkForwardParams> {
    let mut counts: Vec<(WalkForwardParams, usize)> = Vec::new();
    for window in windows {
        match counts.iter_mut().find(|(p, _)| *p == window.params) {
            Some((_, count)) => *count += 1,
            None => counts.push((window.params, 1)),
        }
    }

    let mut best: Option<(WalkForwardParams, usize)> = None;
    for (params, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((params, count));
        }
    }
    best.map(|(p, _)| p)
}

/// Run the walk-forward optimization. `backtest` supplies the defaults
/// (baseline) and every setting the grid does not vary.
pub fn run_walk_forward(
    primary_closes: &[f64],
    secondary_closes: &[f64],
    symbol: &str,
    primary_symbol: &str,
    backtest: &BacktestConfig,
    config: &WalkForwardConfig,
) -> OptimizedParams {
    let n = primary_closes.len().min(secondary_closes.len());
    let primary = &primary_closes[primary_closes.len() - n..];
    let secondary = &secondary_closes[secondary_closes.len() - n..];
    let defaults = WalkForwardParams::from_config(backtest);
    let warmup = backtest.rolling_window;

    let mut windows = Vec::new();
    let mut start = 0;
    while config.test_window > 0 && start + config.train_window + config.test_window <= n {
        let train_end = start + config.train_window;
        let test_end = train_end + config.test_window;
        // The test replay needs the preceding rolling window as warmup so
        // its first tradable bar is train_end
        let test_slice_start = train_end.saturating_sub(warmup);

        let train_p = &primary[start..train_end];
        let train_s = &secondary[start..train_end];
        let (params, train_profit, train_trades, optimized) =
            match optimize_window(train_p, train_s, symbol, primary_symbol, backtest, config) {
                Some((params, profit, trades)) => (params, profit, trades, true),
                None => {
                    debug!(
                        "{}/{} window {}: no grid point traded, using defaults",
                        primary_symbol,
                        symbol,
                        windows.len()
                    );
                    (defaults, 0.0, 0, false)
                }
            };

        let test_p = &primary[test_slice_start..test_end];
        let test_s = &secondary[test_slice_start..test_end];
        let test = run_backtest(test_p, test_s, symbol, primary_symbol, &params.apply(backtest));
        let baseline = run_backtest(test_p, test_s, symbol, primary_symbol, backtest);

        info!(
            "{}/{} window {}: {} -> test {:+.2}% ({} trades), baseline {:+.2}%",
            primary_symbol,
            symbol,
            windows.len(),
            params,
            test.summary.total_profit_percent,
            test.summary.total_trades,
            baseline.summary.total_profit_percent
        );

        windows.push(WindowResult {
            index: windows.len(),
            train_start: start,
            train_end,
            test_start: train_end,
            test_end,
            params,
            optimized,
            train_profit_percent: train_profit,
            train_trades,
            test_profit_percent: test.summary.total_profit_percent,
            test_trades: test.summary.total_trades,
            test_winning_trades: test.summary.winning_trades,
            baseline_profit_percent: baseline.summary.total_profit_percent,
        });

        start += config.test_window;
    }

    if windows.is_empty() {
        warn!(
            "{}/{}: {} bars, need {} for one walk-forward window",
            primary_symbol,
            symbol,
            n,
            config.train_window + config.test_window
        );
    }

    let out_of_sample_profit: f64 = windows.iter().map(|w| w.test_profit_percent).sum();
    let out_of_sample_trades: usize = windows.iter().map(|w| w.test_trades).sum();
    let out_of_sample_wins: usize = windows.iter().map(|w| w.test_winning_trades).sum();
    let baseline_profit: f64 = windows.iter().map(|w| w.baseline_profit_percent).sum();
    let positive = windows.iter().filter(|w| w.test_profit_percent > 0.0).count();
    let positive_window_ratio = if windows.is_empty() {
        0.0
    } else {
        positive as f64 / windows.len() as f64
    };

    OptimizedParams {
        symbol: symbol.to_string(),
        primary_symbol: primary_symbol.to_string(),
        recommended: mode_params(&windows).unwrap_or(defaults),
        defaults,
        out_of_sample_profit_percent: out_of_sample_profit,
        out_of_sample_trades,
        out_of_sample_win_rate: if out_of_sample_trades > 0 {
            out_of_sample_wins as f64 / out_of_sample_trades as f64
        } else {
            0.0
        },
        baseline_profit_percent: baseline_profit,
        improvement_percent: out_of_sample_profit - baseline_profit,
        positive_window_ratio,
        confidence: confidence_for(positive_window_ratio, windows.len()),
        windows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::cointegrated_prices;
    use approx::assert_relative_eq;

    fn small_grid() -> WalkForwardConfig {
        WalkForwardConfig {
            entry_thresholds: vec![2.0, 2.5],
            take_profit_percents: vec![0.3, 0.5],
            stop_loss_percents: vec![0.5, 1.0],
            ..WalkForwardConfig::default()
        }
    }

    #[test]
    fn test_confidence_bands() {
        assert_eq!(confidence_for(0.8, 4), OptimizationConfidence::High);
        assert_eq!(confidence_for(0.8, 2), OptimizationConfidence::Medium);
        assert_eq!(confidence_for(0.5, 6), OptimizationConfidence::Medium);
        assert_eq!(confidence_for(0.4, 6), OptimizationConfidence::Low);
        assert_eq!(confidence_for(0.0, 0), OptimizationConfidence::Low);
    }

    #[test]
    fn test_mode_prefers_most_frequent() {
        let a = WalkForwardParams { entry_spread_threshold: 2.0, take_profit_percent: 0.3, stop_loss_percent: 0.5 };
        let b = WalkForwardParams { entry_spread_threshold: 2.5, take_profit_percent: 0.5, stop_loss_percent: 1.0 };
        let window = |params| WindowResult {
            index: 0,
            train_start: 0,
            train_end: 0,
            test_start: 0,
            test_end: 0,
            params,
            optimized: true,
            train_profit_percent: 0.0,
            train_trades: 0,
            test_profit_percent: 0.0,
            test_trades: 0,
            test_winning_trades: 0,
            baseline_profit_percent: 0.0,
        };
        assert_eq!(mode_params(&[window(a), window(b), window(b)]), Some(b));
        assert_eq!(mode_params(&[window(a), window(b)]), Some(a));
        assert_eq!(mode_params(&[]), None);
    }

    #[test]
    fn test_short_series_has_no_windows() {
        let series = cointegrated_prices(550, 1.0, 0.8, 0.01, 5);
        let backtest = BacktestConfig::default();
        let result = run_walk_forward(&series.primary, &series.secondary, "B", "A", &backtest, &small_grid());

        assert_eq!(result.total_windows(), 0);
        assert_eq!(result.recommended, WalkForwardParams::from_config(&backtest));
        assert_eq!(result.confidence, OptimizationConfidence::Low);
        assert_eq!(result.out_of_sample_trades, 0);
    }

    #[test]
    fn test_windows_tile_the_series() {
        let series = cointegrated_prices(1100, 1.0, 0.8, 0.01, 11);
        let backtest = BacktestConfig::default();
        let config = small_grid();
        let result = run_walk_forward(&series.primary, &series.secondary, "B", "A", &backtest, &config);

        assert_eq!(result.total_windows(), 6);
        for (i, window) in result.windows.iter().enumerate() {
            assert_eq!(window.index, i);
            assert_eq!(window.train_start, i * 100);
            assert_eq!(window.train_end - window.train_start, 500);
            assert_eq!(window.test_start, window.train_end);
            assert_eq!(window.test_end - window.test_start, 100);
            if window.optimized {
                assert!(config.entry_thresholds.contains(&window.params.entry_spread_threshold));
                assert!(config.take_profit_percents.contains(&window.params.take_profit_percent));
                assert!(config.stop_loss_percents.contains(&window.params.stop_loss_percent));
                assert!(window.train_trades >= 1);
            } else {
                assert_eq!(window.params, result.defaults);
            }
        }
        for pair in result.windows.windows(2) {
            assert_eq!(pair[1].test_start, pair[0].test_end);
        }

        let test_sum: f64 = result.windows.iter().map(|w| w.test_profit_percent).sum();
        let baseline_sum: f64 = result.windows.iter().map(|w| w.baseline_profit_percent).sum();
        assert_relative_eq!(result.out_of_sample_profit_percent, test_sum, epsilon = 1e-9);
        assert_relative_eq!(result.improvement_percent, test_sum - baseline_sum, epsilon = 1e-9);
        assert!(result.windows.iter().any(|w| w.params == result.recommended));
        assert!((0.0..=1.0).contains(&result.out_of_sample_win_rate));
    }

    #[test]
    fn test_optimized_params_serialize() {
        let series = cointegrated_prices(700, 1.0, 0.8, 0.01, 2);
        let result = run_walk_forward(
            &series.primary,
            &series.secondary,
            "B",
            "A",
            &BacktestConfig::default(),
            &small_grid(),
        );
        let json = serde_json::to_string(&result).unwrap();
        let back: OptimizedParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total_windows(), result.total_windows());
        assert_eq!(back.recommended, result.recommended);
    }
}
