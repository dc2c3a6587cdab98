//! Simulated pair trades and their summary statistics

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Which leg is bought
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    /// Long primary, short secondary (spread below its mean)
    LongPrimary,
    /// Short primary, long secondary (spread above its mean)
    ShortPrimary,
}

impl TradeDirection {
    /// Direction that bets on a spread z-score returning to zero
    pub fn from_z_score(z: f64) -> Self {
        if z > 0.0 {
            TradeDirection::ShortPrimary
        } else {
            TradeDirection::LongPrimary
        }
    }

    /// +1 for the primary leg when long, -1 when short
    pub fn primary_sign(&self) -> f64 {
        match self {
            TradeDirection::LongPrimary => 1.0,
            TradeDirection::ShortPrimary => -1.0,
        }
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeDirection::LongPrimary => write!(f, "long_primary"),
            TradeDirection::ShortPrimary => write!(f, "short_primary"),
        }
    }
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::TakeProfit => write!(f, "take_profit"),
            ExitReason::StopLoss => write!(f, "stop_loss"),
            ExitReason::EndOfData => write!(f, "end_of_data"),
        }
    }
}

/// One closed round trip on both legs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_z_score: f64,
    pub exit_z_score: f64,
    pub entry_correlation: f64,
    pub entry_price_primary: f64,
    pub entry_price_secondary: f64,
    pub exit_price_primary: f64,
    pub exit_price_secondary: f64,
    pub direction: TradeDirection,
    /// Mean of the two legs' signed percentage moves
    pub profit_percent: f64,
    pub exit_reason: ExitReason,
    pub duration_bars: usize,
}

/// Combined P&L (percent) of a pair position.
///
/// Each leg's move is signed independently: the primary leg takes the
/// direction's sign, the secondary leg the opposite one.
pub fn combined_pnl_percent(
    direction: TradeDirection,
    entry_primary: f64,
    entry_secondary: f64,
    price_primary: f64,
    price_secondary: f64,
) -> f64 {
    if entry_primary <= 0.0 || entry_secondary <= 0.0 {
        return 0.0;
    }
    let sign = direction.primary_sign();
    let primary_move = sign * (price_primary - entry_primary) / entry_primary * 100.0;
    let secondary_move = -sign * (price_secondary - entry_secondary) / entry_secondary * 100.0;
    let pnl = (primary_move + secondary_move) / 2.0;
    if pnl.is_finite() {
        pnl
    } else {
        0.0
    }
}

/// Aggregate statistics over a trade list
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Fraction of trades with positive profit, 0..=1
    pub win_rate: f64,
    pub total_profit_percent: f64,
    pub average_profit_percent: f64,
    /// Largest running-peak minus running-equity gap, in percent points
    pub max_drawdown_percent: f64,
    /// Gross profit / gross loss; infinite with profit and no losses
    #[serde(with = "unbounded_f64")]
    pub profit_factor: f64,
    pub average_duration_bars: f64,
    pub largest_win_percent: f64,
    pub largest_loss_percent: f64,
}

impl BacktestSummary {
    pub fn from_trades(trades: &[Trade]) -> Self {
        if trades.is_empty() {
            return Self::default();
        }

        let n = trades.len() as f64;
        let winning_trades = trades.iter().filter(|t| t.profit_percent > 0.0).count();
        let losing_trades = trades.iter().filter(|t| t.profit_percent < 0.0).count();
        let total_profit_percent: f64 = trades.iter().map(|t| t.profit_percent).sum();

        let gross_profit: f64 = trades.iter().map(|t| t.profit_percent.max(0.0)).sum();
        let gross_loss: f64 = trades.iter().map(|t| (-t.profit_percent).max(0.0)).sum();
        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let curve = equity_curve(trades);

        Self {
            total_trades: trades.len(),
            winning_trades,
            losing_trades,
            win_rate: winning_trades as f64 / n,
            total_profit_percent,
            average_profit_percent: total_profit_percent / n,
            max_drawdown_percent: max_drawdown(&curve),
            profit_factor,
            average_duration_bars: trades.iter().map(|t| t.duration_bars as f64).sum::<f64>() / n,
            largest_win_percent: trades.iter().map(|t| t.profit_percent).fold(0.0, f64::max),
            largest_loss_percent: trades.iter().map(|t| t.profit_percent).fold(0.0, f64::min),
        }
    }
}

/// Running cumulative profit: a leading 0 then one point per trade
pub fn equity_curve(trades: &[Trade]) -> Vec<f64> {
    let mut curve = Vec::with_capacity(trades.len() + 1);
    let mut equity = 0.0;
    curve.push(equity);
    for trade in trades {
        equity += trade.profit_percent;
        curve.push(equity);
    }
    curve
}

/// Largest drop from a running peak
pub fn max_drawdown(curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0f64;
    for &equity in curve {
        peak = peak.max(equity);
        worst = worst.max(peak - equity);
    }
    worst
}

/// JSON has no infinity; write it as `null` and read `null` back as +∞
mod unbounded_f64 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}
