//! Pair Backtest Engine
//!
//! Replays the spread rule bar by bar over two aligned close series:
//! - spread = ln(primary) - ln(secondary), z over the trailing rolling window
//! - flat and |z| > |entry|: open (short primary when z > 0, else long primary)
//! - in position: close on take profit, stop loss, or the final bar
//!
//! One position at a time; a position closed on bar i cannot be replaced
//! before bar i + 1, and nothing opens on the final bar.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::stats;
use crate::domain::trade::{combined_pnl_percent, equity_curve, BacktestSummary, ExitReason, Trade, TradeDirection};
use crate::domain::PairSeries;
use crate::strategy::params::BacktestConfig;

/// Why a backtest produced no trades by construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Fewer than rolling_window + 10 aligned bars, or unusable prices
    InsufficientData,
    /// Full-sample return correlation under `min_correlation`
    CorrelationBelowThreshold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub primary_symbol: String,
    pub config: BacktestConfig,
    /// Aligned bars replayed
    pub bars: usize,
    /// Full-sample return correlation
    pub correlation: f64,
    pub trades: Vec<Trade>,
    pub summary: BacktestSummary,
    /// Cumulative profit: leading 0, then one point per trade
    pub equity_curve: Vec<f64>,
    pub skip_reason: Option<SkipReason>,
}

impl BacktestResult {
    fn empty(
        symbol: &str,
        primary_symbol: &str,
        config: &BacktestConfig,
        bars: usize,
        correlation: f64,
        reason: SkipReason,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            primary_symbol: primary_symbol.to_string(),
            config: config.clone(),
            bars,
            correlation,
            trades: Vec::new(),
            summary: BacktestSummary::default(),
            equity_curve: vec![0.0],
            skip_reason: Some(reason),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skip_reason.is_some()
    }
}

struct OpenPosition {
    entry_index: usize,
    entry_z_score: f64,
    entry_correlation: f64,
    entry_price_primary: f64,
    entry_price_secondary: f64,
    direction: TradeDirection,
}

/// z-score of bar `i` against the `window` spread values ending at `i`
fn rolling_z(spread: &[f64], i: usize, window: usize) -> f64 {
    stats::last_z_score(&spread[i + 1 - window..=i])
}

/// Run the backtest. Never fails; unusable input yields an empty result
/// carrying a `SkipReason`.
pub fn run_backtest(
    primary_closes: &[f64],
    secondary_closes: &[f64],
    symbol: &str,
    primary_symbol: &str,
    config: &BacktestConfig,
) -> BacktestResult {
    let n = primary_closes.len().min(secondary_closes.len());
    let series = PairSeries::new(
        primary_closes[primary_closes.len() - n..].to_vec(),
        secondary_closes[secondary_closes.len() - n..].to_vec(),
    );
    let window = config.rolling_window.max(2);

    if n < window + crate::strategy::params::BACKTEST_MIN_EXTRA_BARS || !series.has_valid_prices() {
        debug!("{}/{}: {} bars, backtest skipped", primary_symbol, symbol, n);
        return BacktestResult::empty(symbol, primary_symbol, config, n, 0.0, SkipReason::InsufficientData);
    }

    let primary_returns = stats::calculate_returns(&series.primary);
    let secondary_returns = stats::calculate_returns(&series.secondary);
    let correlation = stats::pearson_correlation(&primary_returns, &secondary_returns);
    if correlation < config.min_correlation {
        info!(
            "{}/{}: correlation {:.3} below {:.2}, pair excluded",
            primary_symbol, symbol, correlation, config.min_correlation
        );
        return BacktestResult::empty(
            symbol,
            primary_symbol,
            config,
            n,
            correlation,
            SkipReason::CorrelationBelowThreshold,
        );
    }

    let spread: Vec<f64> = series
        .primary
        .iter()
        .zip(series.secondary.iter())
        .map(|(p, s)| p.ln() - s.ln())
        .collect();
    let entry_threshold = config.entry_spread_threshold.abs();

    let mut trades = Vec::new();
    let mut position: Option<OpenPosition> = None;

    for i in window..n {
        let price_primary = series.primary[i];
        let price_secondary = series.secondary[i];

        if let Some(open) = &position {
            let pnl = combined_pnl_percent(
                open.direction,
                open.entry_price_primary,
                open.entry_price_secondary,
                price_primary,
                price_secondary,
            );
            let exit_reason = if pnl >= config.take_profit_percent {
                Some(ExitReason::TakeProfit)
            } else if pnl <= -config.stop_loss_percent {
                Some(ExitReason::StopLoss)
            } else if i == n - 1 {
                Some(ExitReason::EndOfData)
            } else {
                None
            };

            if let Some(exit_reason) = exit_reason {
                let trade = Trade {
                    entry_index: open.entry_index,
                    exit_index: i,
                    entry_z_score: open.entry_z_score,
                    exit_z_score: rolling_z(&spread, i, window),
                    entry_correlation: open.entry_correlation,
                    entry_price_primary: open.entry_price_primary,
                    entry_price_secondary: open.entry_price_secondary,
                    exit_price_primary: price_primary,
                    exit_price_secondary: price_secondary,
                    direction: open.direction,
                    profit_percent: pnl,
                    exit_reason,
                    duration_bars: i - open.entry_index,
                };
                debug!(
                    "{}/{}: {} {} -> {} {:+.3}% ({})",
                    primary_symbol, symbol, trade.direction, trade.entry_index, i, pnl, exit_reason
                );
                trades.push(trade);
                position = None;
            }
            continue;
        }

        if i == n - 1 {
            break;
        }

        let z = rolling_z(&spread, i, window);
        if z.abs() > entry_threshold {
            // Returns ending at bar i are primary_returns[..i]
            let entry_correlation = stats::pearson_correlation(
                &primary_returns[i - window..i],
                &secondary_returns[i - window..i],
            );
            position = Some(OpenPosition {
                entry_index: i,
                entry_z_score: z,
                entry_correlation,
                entry_price_primary: price_primary,
                entry_price_secondary: price_secondary,
                direction: TradeDirection::from_z_score(z),
            });
        }
    }

    let summary = BacktestSummary::from_trades(&trades);
    info!(
        "{}/{}: {} trades, win rate {:.1}%, total {:+.2}%",
        primary_symbol,
        symbol,
        summary.total_trades,
        summary.win_rate * 100.0,
        summary.total_profit_percent
    );

    BacktestResult {
        symbol: symbol.to_string(),
        primary_symbol: primary_symbol.to_string(),
        config: config.clone(),
        bars: n,
        correlation,
        equity_curve: equity_curve(&trades),
        trades,
        summary,
        skip_reason: None,
    }
}
