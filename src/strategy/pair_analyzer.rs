//! Pair Analysis Orchestrator
//!
//! Composes the stationarity, volatility and correlation-velocity layers
//! into one scored `PairAnalysisResult` per pair and timeframe.
//!
//! opportunity = 0.6 · spread_opportunity + 0.4 · method_average
//! - spread_opportunity: |z| / (1.5 · extreme_z) · 100, saturating at 100
//! - method_average: mean of the stationarity score and the signal-quality score
//!
//! The score is rounded and forced to 0 for a non-tradable spread.

use serde::{Deserialize, Serialize};
use statrs::function::erf::erf;
use std::fmt;

use crate::domain::stats;
use crate::domain::PairSeries;
use crate::strategy::correlation_velocity::{self, CorrelationRegime, CorrelationVelocityResult};
use crate::strategy::params::AnalysisConfig;
use crate::strategy::stationarity::{self, StationarityAnalysis};
use crate::strategy::volatility::{self, SignalQuality, VolatilityAdjustedSpreadResult};

/// |z| at which the spread component saturates, as a multiple of the extreme threshold
const SPREAD_SATURATION_MULTIPLE: f64 = 1.5;
/// Bounds on the static fallback reversion probability
const FALLBACK_PROBABILITY_FLOOR: f64 = 0.05;
const FALLBACK_PROBABILITY_CEILING: f64 = 0.95;
/// Confluence rating at which the threshold flag is raised
const CONFLUENCE_THRESHOLD: u8 = 2;

/// Which side of the spread a signal favours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalDirection {
    /// Spread below its mean: buy primary, sell secondary
    LongSpread,
    /// Spread above its mean: sell primary, buy secondary
    ShortSpread,
    Neutral,
}

impl SignalDirection {
    pub fn from_z_score(z: f64) -> Self {
        if z < 0.0 {
            Self::LongSpread
        } else if z > 0.0 {
            Self::ShortSpread
        } else {
            Self::Neutral
        }
    }
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LongSpread => write!(f, "long_spread"),
            Self::ShortSpread => write!(f, "short_spread"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// Multi-indicator agreement for one pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfluenceAnalysis {
    /// Number of true indicators, 0-3
    pub rating: u8,
    pub direction: SignalDirection,
    /// Rating reached the confluence threshold
    pub meets_threshold: bool,
    pub extreme_z_score: bool,
    pub correlation_supportive: bool,
    pub strong_signal_quality: bool,
}

impl ConfluenceAnalysis {
    pub fn new(extreme_z_score: bool, correlation_supportive: bool, strong_signal_quality: bool, z_score: f64) -> Self {
        let rating = [extreme_z_score, correlation_supportive, strong_signal_quality]
            .iter()
            .filter(|b| **b)
            .count() as u8;
        Self {
            rating,
            direction: SignalDirection::from_z_score(z_score),
            meets_threshold: rating >= CONFLUENCE_THRESHOLD,
            extreme_z_score,
            correlation_supportive,
            strong_signal_quality,
        }
    }
}

/// How a reversion probability was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversionMethod {
    /// Empirical rate from labelled history
    History,
    /// Static estimate from the current z-score and stationarity
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReversionProbability {
    /// Strictly inside (0, 1)
    pub probability: f64,
    pub lookahead_bars: usize,
    pub sample_size: usize,
    pub wins: usize,
    pub method: ReversionMethod,
}

impl ReversionProbability {
    /// Static estimate used until history is available.
    ///
    /// Φ(|z|) from the standard normal CDF, shrunk halfway toward 0.5 when
    /// the spread is not tradable, kept within [0.05, 0.95]. The lookahead
    /// is the rounded half-life clamped to [1, max_lookahead].
    pub fn fallback(z_score: f64, stationarity: &StationarityAnalysis, max_lookahead: usize) -> Self {
        let z = stats::finite_or_zero(z_score).abs();
        let mut probability = 0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2));
        if !stationarity.is_tradable {
            probability = 0.5 + (probability - 0.5) / 2.0;
        }
        let probability = stats::clamp(probability, FALLBACK_PROBABILITY_FLOOR, FALLBACK_PROBABILITY_CEILING);

        let max_lookahead = max_lookahead.max(1);
        let lookahead_bars = stationarity.half_life_bars.round().clamp(1.0, max_lookahead as f64) as usize;

        Self {
            probability,
            lookahead_bars,
            sample_size: 0,
            wins: 0,
            method: ReversionMethod::Fallback,
        }
    }
}

/// Structured diagnostic attached to a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisNote {
    LengthMismatch { primary: usize, secondary: usize },
    InsufficientData { bars: usize, required: usize },
    InvalidPrices,
    ExtremeZScore { z_score: f64, threshold: f64 },
    ElevatedZScore { z_score: f64, threshold: f64 },
    NotTradable,
    AdfFailed { t_stat: f64, critical_value: f64 },
    CointegrationFailed { t_stat: f64, critical_value: f64 },
    HalfLifeOutOfRange { half_life_bars: f64, min: f64, max: f64 },
    MeanReverting { half_life_bars: f64 },
    CorrelationStrengthening { velocity: f64 },
    CorrelationStableStrong,
    CorrelationWeakening { velocity: f64 },
    CorrelationBreakingDown { velocity: f64 },
    SignalQuality { quality: SignalQuality },
    HighConfluence { rating: u8 },
    NonFiniteScore,
    HistoryRescaled { probability: f64, sample_size: usize },
}

impl fmt::Display for AnalysisNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthMismatch { primary, secondary } => {
                write!(f, "Series lengths differ ({} vs {}), trimmed to the common tail", primary, secondary)
            }
            Self::InsufficientData { bars, required } => {
                write!(f, "Insufficient data: {} aligned bars, {} required", bars, required)
            }
            Self::InvalidPrices => write!(f, "Non-positive or non-finite prices"),
            Self::ExtremeZScore { z_score, threshold } => {
                write!(f, "Z-score {:.2} exceeds extreme threshold {:.2}", z_score, threshold)
            }
            Self::ElevatedZScore { z_score, threshold } => {
                write!(f, "Z-score {:.2} above {:.2}", z_score, threshold)
            }
            Self::NotTradable => write!(f, "Spread failed the tradability gate"),
            Self::AdfFailed { t_stat, critical_value } => {
                write!(f, "ADF t-stat {:.2} not below {:.2}", t_stat, critical_value)
            }
            Self::CointegrationFailed { t_stat, critical_value } => {
                write!(f, "Cointegration t-stat {:.2} not below {:.2}", t_stat, critical_value)
            }
            Self::HalfLifeOutOfRange { half_life_bars, min, max } => {
                write!(f, "Half-life {:.1} bars outside [{:.0}, {:.0}]", half_life_bars, min, max)
            }
            Self::MeanReverting { half_life_bars } => {
                write!(f, "Spread mean-reverting, half-life {:.1} bars", half_life_bars)
            }
            Self::CorrelationStrengthening { velocity } => {
                write!(f, "Correlation strengthening ({:+.3})", velocity)
            }
            Self::CorrelationStableStrong => write!(f, "Correlation stable and strong"),
            Self::CorrelationWeakening { velocity } => write!(f, "Correlation weakening ({:+.3})", velocity),
            Self::CorrelationBreakingDown { velocity } => {
                write!(f, "Correlation breaking down ({:+.3})", velocity)
            }
            Self::SignalQuality { quality } => write!(f, "Signal quality: {}", quality),
            Self::HighConfluence { rating } => write!(f, "Confluence {}/3", rating),
            Self::NonFiniteScore => write!(f, "Non-finite score discarded"),
            Self::HistoryRescaled { probability, sample_size } => write!(
                f,
                "Reversion probability {:.0}% from {} historical signals",
                probability * 100.0,
                sample_size
            ),
        }
    }
}

/// Scored analysis of one pair on one timeframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairAnalysisResult {
    pub symbol: String,
    pub primary_symbol: String,
    /// Aligned bars analyzed
    pub bars: usize,
    pub correlation: f64,
    pub spread_mean: f64,
    pub spread_std_dev: f64,
    pub z_score: f64,
    pub hedge_ratio: f64,
    pub stationarity: StationarityAnalysis,
    /// 0-100
    pub opportunity_score: f64,
    pub reversion_probability: ReversionProbability,
    pub volatility: VolatilityAdjustedSpreadResult,
    pub correlation_velocity: CorrelationVelocityResult,
    pub confluence: ConfluenceAnalysis,
    pub notes: Vec<AnalysisNote>,
}

impl PairAnalysisResult {
    /// Non-tradable, zero-opportunity result
    pub fn neutral(symbol: &str, primary_symbol: &str, bars: usize, config: &AnalysisConfig, notes: Vec<AnalysisNote>) -> Self {
        let stationarity = StationarityAnalysis::neutral(&config.stationarity, bars);
        Self {
            symbol: symbol.to_string(),
            primary_symbol: primary_symbol.to_string(),
            bars,
            correlation: 0.0,
            spread_mean: 0.0,
            spread_std_dev: 0.0,
            z_score: 0.0,
            hedge_ratio: stationarity.hedge_ratio,
            reversion_probability: ReversionProbability::fallback(0.0, &stationarity, config.max_fallback_lookahead),
            stationarity,
            opportunity_score: 0.0,
            volatility: VolatilityAdjustedSpreadResult::insufficient(0.0),
            correlation_velocity: correlation_velocity::analyze(&[], &[], &config.velocity),
            confluence: ConfluenceAnalysis::new(false, false, false, 0.0),
            notes,
        }
    }

    pub fn is_tradable(&self) -> bool {
        self.stationarity.is_tradable
    }

    pub fn direction(&self) -> SignalDirection {
        self.confluence.direction
    }
}

/// Spread component: monotonic in |z|, 100 at 1.5 × the extreme threshold
pub fn spread_opportunity(z_score: f64, extreme_z_score: f64) -> f64 {
    if extreme_z_score <= 0.0 {
        return 0.0;
    }
    stats::clamp(
        z_score.abs() / (SPREAD_SATURATION_MULTIPLE * extreme_z_score) * 100.0,
        0.0,
        100.0,
    )
}

/// Method component: mean of the stationarity score and the quality score.
///
/// A tradable spread scores 100; otherwise each passing check contributes
/// (ADF 40, cointegration 30, half-life 30).
pub fn method_average(stationarity: &StationarityAnalysis, quality: SignalQuality) -> f64 {
    let stationarity_score = if stationarity.is_tradable {
        100.0
    } else {
        let mut score = 0.0;
        if stationarity.adf_passed {
            score += 40.0;
        }
        if stationarity.cointegration_passed {
            score += 30.0;
        }
        if stationarity.half_life_passed {
            score += 30.0;
        }
        score
    };
    (stationarity_score + quality.score()) / 2.0
}

/// Blend, round, and gate the opportunity score
pub fn opportunity_score(spread_component: f64, method_component: f64, is_tradable: bool, config: &AnalysisConfig) -> f64 {
    let score = (config.spread_weight * spread_component + config.method_weight * method_component).round();
    if !is_tradable || !score.is_finite() {
        return 0.0;
    }
    stats::clamp(score, 0.0, 100.0)
}

/// Analyze one pair.
///
/// Legs of different length are trimmed to their common most recent bars.
/// Never fails: too little data or bad prices produce a neutral result
/// with an explanatory note.
pub fn analyze_pair(
    primary_closes: &[f64],
    secondary_closes: &[f64],
    symbol: &str,
    primary_symbol: &str,
    config: &AnalysisConfig,
) -> PairAnalysisResult {
    let mut notes = Vec::new();

    let n = primary_closes.len().min(secondary_closes.len());
    if primary_closes.len() != secondary_closes.len() {
        notes.push(AnalysisNote::LengthMismatch {
            primary: primary_closes.len(),
            secondary: secondary_closes.len(),
        });
    }
    let series = PairSeries::new(
        primary_closes[primary_closes.len() - n..].to_vec(),
        secondary_closes[secondary_closes.len() - n..].to_vec(),
    );

    if n < config.min_bars {
        notes.push(AnalysisNote::InsufficientData { bars: n, required: config.min_bars });
        return PairAnalysisResult::neutral(symbol, primary_symbol, n, config, notes);
    }
    if !series.has_valid_prices() {
        notes.push(AnalysisNote::InvalidPrices);
        return PairAnalysisResult::neutral(symbol, primary_symbol, n, config, notes);
    }

    let primary_returns = stats::calculate_returns(&series.primary);
    let secondary_returns = stats::calculate_returns(&series.secondary);
    let window = config.z_window.min(n);
    let recent_returns = (window - 1).min(primary_returns.len());
    let recent_primary = &primary_returns[primary_returns.len() - recent_returns..];
    let recent_secondary = &secondary_returns[secondary_returns.len() - recent_returns..];
    let correlation = stats::pearson_correlation(recent_primary, recent_secondary);

    let stationarity = stationarity::analyze(&series, &config.stationarity);
    let hedge_ratio = stationarity.hedge_ratio;

    let spread = stationarity::build_spread(
        &stats::log_prices(&series.primary),
        &stats::log_prices(&series.secondary),
        hedge_ratio,
    );
    let recent_spread = &spread[spread.len() - window..];
    let spread_mean = stats::mean(recent_spread);
    let spread_std_dev = stats::standard_deviation(recent_spread, Some(spread_mean));
    let z_score = stats::last_z_score(recent_spread);

    let volatility = volatility::classify(z_score, recent_primary, recent_secondary, &config.volatility);
    let velocity = correlation_velocity::analyze(&primary_returns, &secondary_returns, &config.velocity);

    let spread_component = spread_opportunity(z_score, config.extreme_z_score);
    let method_component = method_average(&stationarity, volatility.signal_quality);
    let raw_score = config.spread_weight * spread_component + config.method_weight * method_component;
    if !raw_score.is_finite() {
        notes.push(AnalysisNote::NonFiniteScore);
    }
    let opportunity = opportunity_score(spread_component, method_component, stationarity.is_tradable, config);

    let confluence = ConfluenceAnalysis::new(
        z_score.abs() > config.extreme_z_score,
        velocity.regime.is_supportive(),
        volatility.signal_quality.is_strong(),
        z_score,
    );

    push_factor_notes(&mut notes, z_score, &stationarity, &volatility, &velocity, &confluence, config);

    let reversion_probability = ReversionProbability::fallback(z_score, &stationarity, config.max_fallback_lookahead);

    PairAnalysisResult {
        symbol: symbol.to_string(),
        primary_symbol: primary_symbol.to_string(),
        bars: n,
        correlation,
        spread_mean,
        spread_std_dev,
        z_score,
        hedge_ratio,
        stationarity,
        opportunity_score: opportunity,
        reversion_probability,
        volatility,
        correlation_velocity: velocity,
        confluence,
        notes,
    }
}

fn push_factor_notes(
    notes: &mut Vec<AnalysisNote>,
    z_score: f64,
    stationarity: &StationarityAnalysis,
    volatility: &VolatilityAdjustedSpreadResult,
    velocity: &CorrelationVelocityResult,
    confluence: &ConfluenceAnalysis,
    config: &AnalysisConfig,
) {
    if z_score.abs() > config.extreme_z_score {
        notes.push(AnalysisNote::ExtremeZScore { z_score, threshold: config.extreme_z_score });
    } else if z_score.abs() > config.high_z_score {
        notes.push(AnalysisNote::ElevatedZScore { z_score, threshold: config.high_z_score });
    }

    if stationarity.is_tradable {
        notes.push(AnalysisNote::MeanReverting { half_life_bars: stationarity.half_life_bars });
    } else {
        notes.push(AnalysisNote::NotTradable);
        if !stationarity.adf_passed {
            notes.push(AnalysisNote::AdfFailed {
                t_stat: stationarity.adf_t_stat,
                critical_value: stationarity.adf_critical_value,
            });
        }
        if !stationarity.cointegration_passed {
            notes.push(AnalysisNote::CointegrationFailed {
                t_stat: stationarity.cointegration_t_stat,
                critical_value: stationarity.cointegration_critical_value,
            });
        }
        if !stationarity.half_life_passed {
            notes.push(AnalysisNote::HalfLifeOutOfRange {
                half_life_bars: stationarity.half_life_bars,
                min: config.stationarity.min_half_life_bars,
                max: config.stationarity.max_half_life_bars,
            });
        }
    }

    if velocity.is_valid {
        match velocity.regime {
            CorrelationRegime::Strengthening => {
                notes.push(AnalysisNote::CorrelationStrengthening { velocity: velocity.velocity })
            }
            CorrelationRegime::StableStrong => notes.push(AnalysisNote::CorrelationStableStrong),
            CorrelationRegime::Weakening => {
                notes.push(AnalysisNote::CorrelationWeakening { velocity: velocity.velocity })
            }
            CorrelationRegime::BreakingDown => {
                notes.push(AnalysisNote::CorrelationBreakingDown { velocity: velocity.velocity })
            }
            _ => {}
        }
    }

    notes.push(AnalysisNote::SignalQuality { quality: volatility.signal_quality });

    if confluence.meets_threshold {
        notes.push(AnalysisNote::HighConfluence { rating: confluence.rating });
    }
}
