//! Stationarity / Mean-Reversion Analyzer
//!
//! Decides whether the log spread of a pair is worth trading:
//! - rolling OLS hedge ratio: ln(primary) = a + β·ln(secondary)
//! - spread_t = ln(primary_t) - β_current·ln(secondary_t)
//! - ADF regression: Δs_t = c + γ·s_{t-1} + Σ δ_j·Δs_{t-j}, t-stat of γ
//! - Engle-Granger check: Dickey-Fuller on the static full-sample residuals
//! - half-life from the AR(1) fit s_t = c + φ·s_{t-1}: -ln(2) / ln(φ)
//!
//! The ADF decision uses one fixed critical value instead of a sample-size
//! adjusted table.

use serde::{Deserialize, Serialize};

use crate::domain::stats::{self, linear_regression, multiple_regression};
use crate::domain::PairSeries;
use crate::strategy::params::StationarityConfig;

/// Half-life reported for fits with φ ≥ 1 (and the cap for very slow reversion)
pub const NON_MEAN_REVERTING_HALF_LIFE: f64 = 1000.0;

/// Result of the stationarity analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationarityAnalysis {
    pub adf_t_stat: f64,
    pub adf_critical_value: f64,
    pub adf_passed: bool,
    pub cointegration_t_stat: f64,
    pub cointegration_critical_value: f64,
    pub cointegration_passed: bool,
    pub half_life_bars: f64,
    pub half_life_passed: bool,
    /// ADF passed and half-life inside bounds
    pub is_mean_reverting: bool,
    /// ADF, cointegration and half-life all pass
    pub is_tradable: bool,
    /// Most recent rolling hedge ratio
    pub hedge_ratio: f64,
    /// Standard deviation of the rolling hedge ratios (stability)
    pub hedge_ratio_std: f64,
    /// AR(1) coefficient φ of the spread
    pub ar_coefficient: f64,
    /// Bars the analysis ran on
    pub sample_size: usize,
}

impl StationarityAnalysis {
    /// Non-tradable placeholder for input that cannot be tested
    pub fn neutral(config: &StationarityConfig, sample_size: usize) -> Self {
        Self {
            adf_t_stat: 0.0,
            adf_critical_value: config.adf_critical_value,
            adf_passed: false,
            cointegration_t_stat: 0.0,
            cointegration_critical_value: config.cointegration_critical_value,
            cointegration_passed: false,
            half_life_bars: 0.0,
            half_life_passed: false,
            is_mean_reverting: false,
            is_tradable: false,
            hedge_ratio: 1.0,
            hedge_ratio_std: 0.0,
            ar_coefficient: 0.0,
            sample_size,
        }
    }
}

/// Spread-only view: ADF + half-life without a hedge-ratio regression
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadStationarity {
    pub adf_t_stat: f64,
    pub adf_passed: bool,
    pub ar_coefficient: f64,
    pub half_life_bars: f64,
    pub half_life_passed: bool,
    pub is_mean_reverting: bool,
}

/// Rolling OLS β of ln(primary) on ln(secondary).
///
/// One estimate per bar from `min_window - 1` (inclusive) onward, each
/// over the trailing `rolling_window` bars or every bar so far when fewer
/// are available. Windows without variance in the regressor are skipped.
pub fn rolling_hedge_ratios(log_primary: &[f64], log_secondary: &[f64], config: &StationarityConfig) -> Vec<f64> {
    let n = log_primary.len().min(log_secondary.len());
    if n < config.min_window || config.min_window == 0 {
        return Vec::new();
    }

    (config.min_window - 1..n)
        .filter_map(|end| {
            let start = (end + 1).saturating_sub(config.rolling_window);
            linear_regression(&log_secondary[start..=end], &log_primary[start..=end]).map(|fit| fit.slope)
        })
        .collect()
}

/// Augmented Dickey-Fuller t-statistic of γ in
/// Δs_t = c + γ·s_{t-1} + Σ_{j=1..lags} δ_j·Δs_{t-j}.
///
/// Returns 0.0 when the regression cannot be solved.
pub fn adf_t_stat(series: &[f64], lags: usize) -> f64 {
    let n = series.len();
    if n <= 2 * lags + 4 {
        return 0.0;
    }

    let diff = |t: usize| series[t] - series[t - 1];
    let mut rows = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for t in (lags + 1)..n {
        let mut row = Vec::with_capacity(lags + 2);
        row.push(1.0);
        row.push(series[t - 1]);
        for j in 1..=lags {
            row.push(diff(t - j));
        }
        rows.push(row);
        y.push(diff(t));
    }

    multiple_regression(&rows, &y).map(|fit| fit.t_stat(1)).unwrap_or(0.0)
}

/// AR(1) coefficient φ and the implied half-life in bars.
///
/// 0 < φ < 1 gives -ln(2)/ln(φ), capped at `NON_MEAN_REVERTING_HALF_LIFE`;
/// φ ≥ 1 gives the cap; φ ≤ 0 reverts within a bar and gives 0.
pub fn half_life(series: &[f64]) -> (f64, f64) {
    if series.len() < 4 {
        return (1.0, NON_MEAN_REVERTING_HALF_LIFE);
    }
    let Some(fit) = linear_regression(&series[..series.len() - 1], &series[1..]) else {
        return (1.0, NON_MEAN_REVERTING_HALF_LIFE);
    };

    let phi = fit.slope;
    let half_life = if phi >= 1.0 {
        NON_MEAN_REVERTING_HALF_LIFE
    } else if phi <= 0.0 {
        0.0
    } else {
        (-(2f64.ln()) / phi.ln()).min(NON_MEAN_REVERTING_HALF_LIFE)
    };
    (phi, stats::finite_or_zero(half_life))
}

/// ADF and half-life on an already-built spread
pub fn analyze_spread(spread: &[f64], config: &StationarityConfig) -> SpreadStationarity {
    let adf = adf_t_stat(spread, config.adf_lags);
    let (phi, half_life_bars) = half_life(spread);
    let adf_passed = adf != 0.0 && adf < config.adf_critical_value;
    let half_life_passed =
        half_life_bars >= config.min_half_life_bars && half_life_bars <= config.max_half_life_bars;

    SpreadStationarity {
        adf_t_stat: adf,
        adf_passed,
        ar_coefficient: phi,
        half_life_bars,
        half_life_passed,
        is_mean_reverting: adf_passed && half_life_passed,
    }
}

/// Engle-Granger residual test: static OLS with intercept, then
/// Dickey-Fuller (no lags) on the residuals
pub fn cointegration_t_stat(log_primary: &[f64], log_secondary: &[f64]) -> f64 {
    let Some(fit) = linear_regression(log_secondary, log_primary) else {
        return 0.0;
    };
    let residuals: Vec<f64> = log_primary
        .iter()
        .zip(log_secondary.iter())
        .map(|(p, s)| p - fit.intercept - fit.slope * s)
        .collect();
    adf_t_stat(&residuals, 0)
}

/// Hedged log spread ln(p) - β·ln(s)
pub fn build_spread(log_primary: &[f64], log_secondary: &[f64], beta: f64) -> Vec<f64> {
    log_primary
        .iter()
        .zip(log_secondary.iter())
        .map(|(p, s)| p - beta * s)
        .collect()
}

/// Full stationarity analysis of an aligned price pair.
///
/// Never fails: misaligned legs, non-positive prices, or fewer than
/// `min_window` bars return `StationarityAnalysis::neutral`.
pub fn analyze(series: &PairSeries, config: &StationarityConfig) -> StationarityAnalysis {
    let n = series.len();
    if n < config.min_window || !series.has_valid_prices() {
        return StationarityAnalysis::neutral(config, n);
    }

    let log_primary = stats::log_prices(&series.primary);
    let log_secondary = stats::log_prices(&series.secondary);

    let betas = rolling_hedge_ratios(&log_primary, &log_secondary, config);
    let Some(&hedge_ratio) = betas.last() else {
        return StationarityAnalysis::neutral(config, n);
    };
    let hedge_ratio_std = stats::standard_deviation(&betas, None);

    let spread = build_spread(&log_primary, &log_secondary, hedge_ratio);
    let spread_result = analyze_spread(&spread, config);

    let coint = cointegration_t_stat(&log_primary, &log_secondary);
    let cointegration_passed = coint != 0.0 && coint < config.cointegration_critical_value;

    let is_tradable = spread_result.adf_passed && cointegration_passed && spread_result.half_life_passed;

    StationarityAnalysis {
        adf_t_stat: spread_result.adf_t_stat,
        adf_critical_value: config.adf_critical_value,
        adf_passed: spread_result.adf_passed,
        cointegration_t_stat: coint,
        cointegration_critical_value: config.cointegration_critical_value,
        cointegration_passed,
        half_life_bars: spread_result.half_life_bars,
        half_life_passed: spread_result.half_life_passed,
        is_mean_reverting: spread_result.is_mean_reverting,
        is_tradable,
        hedge_ratio,
        hedge_ratio_std,
        ar_coefficient: spread_result.ar_coefficient,
        sample_size: n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ar1_series, cointegrated_prices, diverging_prices, drifting_walk};
    use approx::assert_relative_eq;

    #[test]
    fn test_stationary_spread_is_mean_reverting() {
        let spread = ar1_series(300, 0.82, 0.01, 42);
        let config = StationarityConfig::default();
        let result = analyze_spread(&spread, &config);

        assert!(result.adf_t_stat < 0.0);
        assert!(result.adf_passed, "adf t = {}", result.adf_t_stat);
        assert!(result.half_life_bars > config.min_half_life_bars);
        assert!(result.half_life_bars < config.max_half_life_bars);
        assert!(result.is_mean_reverting);
    }

    #[test]
    fn test_drifting_walk_is_not_mean_reverting() {
        let spread = drifting_walk(300, 0.01, 0.002, 7);
        let result = analyze_spread(&spread, &StationarityConfig::default());
        assert!(!result.is_mean_reverting);
        assert!(!result.half_life_passed);
    }

    #[test]
    fn test_drifting_half_life_exceeds_stationary() {
        let config = StationarityConfig::default();
        let stationary = analyze_spread(&ar1_series(300, 0.82, 0.01, 42), &config);
        let drifting = analyze_spread(&drifting_walk(300, 0.01, 0.002, 7), &config);

        assert!(drifting.half_life_bars > stationary.half_life_bars);
        assert!(stationary.adf_t_stat < drifting.adf_t_stat);
    }

    #[test]
    fn test_half_life_formula() {
        // Noise-free AR(1) decay with an offset so the intercept fit is exact
        let series: Vec<f64> = (0..50).map(|t| 0.5f64.powi(t) + 1.0).collect();
        let (phi, hl) = half_life(&series);
        assert_relative_eq!(phi, 0.5, epsilon = 1e-6);
        assert_relative_eq!(hl, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_half_life_unit_root_is_capped() {
        let series: Vec<f64> = (0..50).map(|t| t as f64 * 0.1).collect();
        let (phi, hl) = half_life(&series);
        assert!(phi >= 1.0 - 1e-9);
        assert_eq!(hl, NON_MEAN_REVERTING_HALF_LIFE);
    }

    #[test]
    fn test_rolling_hedge_ratio_starts_at_min_window() {
        let config = StationarityConfig::default().with_rolling_window(40);
        let x: Vec<f64> = (0..100).map(|t| (t as f64 / 7.0).sin()).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 0.3).collect();
        let betas = rolling_hedge_ratios(&y, &x, &config);

        assert_eq!(betas.len(), 100 - config.min_window + 1);
        for b in betas {
            assert_relative_eq!(b, 2.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_cointegrated_pair_is_tradable() {
        let series = cointegrated_prices(400, 1.2, 0.8, 0.01, 11);
        let config = StationarityConfig::default().with_rolling_window(120);
        let result = analyze(&series, &config);

        assert_relative_eq!(result.hedge_ratio, 1.2, epsilon = 0.05);
        assert!(result.adf_passed, "adf t = {}", result.adf_t_stat);
        assert!(result.cointegration_passed, "coint t = {}", result.cointegration_t_stat);
        assert!(result.half_life_passed, "half-life = {}", result.half_life_bars);
        assert!(result.is_tradable);
        assert_eq!(result.sample_size, 400);
    }

    #[test]
    fn test_diverging_legs_not_tradable() {
        let series = diverging_prices(400, 5);
        let result = analyze(&series, &StationarityConfig::default());
        assert!(!result.is_tradable);
    }

    #[test]
    fn test_insufficient_data_is_neutral() {
        let config = StationarityConfig::default();
        let series = PairSeries::new(vec![100.0; 10], vec![50.0; 10]);
        let result = analyze(&series, &config);

        assert!(!result.is_tradable);
        assert!(!result.adf_passed);
        assert_eq!(result.sample_size, 10);
        assert_eq!(result.adf_critical_value, -2.86);
    }

    #[test]
    fn test_invalid_prices_are_neutral() {
        let mut series = cointegrated_prices(200, 1.0, 0.8, 0.01, 3);
        series.primary[50] = -1.0;
        assert!(!analyze(&series, &StationarityConfig::default()).is_tradable);
    }
}
