//! Multi-Timeframe Confluence Engine
//!
//! Runs the pair analysis once per interval and rolls the results up into
//! a single `ConfluenceResult`: majority direction, agreement ratios, a
//! weighted composite score and a confidence tier.
//!
//! confluence = weighted_mean(opportunity) × (0.6 + 0.6 · mean_agreement)
//!
//! Full agreement lifts the weighted mean by 20%, agreement at one third
//! pulls it down by 20%.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

use crate::domain::stats;
use crate::domain::PairSeries;
use crate::strategy::correlation_velocity::CorrelationLevel;
use crate::strategy::pair_analyzer::{analyze_pair, PairAnalysisResult, SignalDirection};
use crate::strategy::params::{AnalysisConfig, MultiTimeframeConfig};
use crate::strategy::volatility::SignalQuality;

const AGREEMENT_BASE: f64 = 0.6;
const AGREEMENT_GAIN: f64 = 0.6;

/// One interval's analysis with its aggregation weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeAnalysis {
    pub interval: String,
    pub result: PairAnalysisResult,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfluenceConfidence {
    High,
    Medium,
    Low,
    /// Long and short timeframes split nearly evenly
    Mixed,
}

impl fmt::Display for ConfluenceConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
            Self::Mixed => write!(f, "mixed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Empty,
    Misaligned,
    InsufficientData { bars: usize, required: usize },
}

/// Aggregation diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfluenceNote {
    SkippedTimeframe { interval: String, reason: SkipReason },
    NoTimeframes,
    /// Every timeframe reported the same score; likely duplicated data
    IdenticalScores { score: f64, timeframes: usize },
    LowAgreement { agreement: f64 },
}

impl fmt::Display for ConfluenceNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SkippedTimeframe { interval, reason } => {
                match reason {
                    SkipReason::Empty => write!(f, "Skipped {}: no data", interval),
                    SkipReason::Misaligned => write!(f, "Skipped {}: legs misaligned", interval),
                    SkipReason::InsufficientData { bars, required } => {
                        write!(f, "Skipped {}: {} bars, {} required", interval, bars, required)
                    }
                }
            }
            Self::NoTimeframes => write!(f, "No timeframe had usable data"),
            Self::IdenticalScores { score, timeframes } => write!(
                f,
                "Data quality warning: all {} timeframes scored {:.0}",
                timeframes, score
            ),
            Self::LowAgreement { agreement } => {
                write!(f, "Low cross-timeframe agreement ({:.0}%)", agreement * 100.0)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfluenceResult {
    pub symbol: String,
    pub primary_symbol: String,
    pub timeframes: Vec<TimeframeAnalysis>,
    /// Timeframes whose direction matches the majority
    pub aligned_timeframes: usize,
    pub total_timeframes: usize,
    pub best_timeframe: Option<String>,
    pub worst_timeframe: Option<String>,
    pub z_score_agreement: f64,
    pub correlation_agreement: f64,
    pub quality_agreement: f64,
    /// 0-100
    pub confluence_score: f64,
    pub confidence: ConfluenceConfidence,
    pub signal_direction: SignalDirection,
    pub notes: Vec<ConfluenceNote>,
}

/// Run the pair analysis for every interval with usable data.
///
/// Intervals whose legs are empty, of different length, or shorter than
/// `analysis.min_bars` are skipped and reported as notes rather than scored
/// as zero.
pub fn analyze_timeframes(
    series_by_interval: &BTreeMap<String, PairSeries>,
    symbol: &str,
    primary_symbol: &str,
    analysis: &AnalysisConfig,
    config: &MultiTimeframeConfig,
) -> (Vec<TimeframeAnalysis>, Vec<ConfluenceNote>) {
    let mut timeframes = Vec::with_capacity(series_by_interval.len());
    let mut notes = Vec::new();

    for (interval, series) in series_by_interval {
        let reason = if !series.is_aligned() {
            Some(SkipReason::Misaligned)
        } else if series.is_empty() {
            Some(SkipReason::Empty)
        } else if series.len() < analysis.min_bars {
            Some(SkipReason::InsufficientData { bars: series.len(), required: analysis.min_bars })
        } else {
            None
        };
        if let Some(reason) = reason {
            tracing::debug!("{} {}: skipping {} ({:?})", primary_symbol, symbol, interval, reason);
            notes.push(ConfluenceNote::SkippedTimeframe { interval: interval.clone(), reason });
            continue;
        }

        let result = analyze_pair(&series.primary, &series.secondary, symbol, primary_symbol, analysis);
        timeframes.push(TimeframeAnalysis {
            interval: interval.clone(),
            result,
            weight: config.weight_for(interval),
        });
    }

    (timeframes, notes)
}

/// Majority direction; a tie for the top count is neutral
pub fn majority_direction(directions: &[SignalDirection]) -> SignalDirection {
    let count = |d: SignalDirection| directions.iter().filter(|x| **x == d).count();
    let mut counts = [
        (SignalDirection::LongSpread, count(SignalDirection::LongSpread)),
        (SignalDirection::ShortSpread, count(SignalDirection::ShortSpread)),
        (SignalDirection::Neutral, count(SignalDirection::Neutral)),
    ];
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    if counts[0].1 == 0 || counts[0].1 == counts[1].1 {
        SignalDirection::Neutral
    } else {
        counts[0].0
    }
}

/// Share of items that fall in the most common bucket
fn agreement<K: Eq + Hash>(keys: impl Iterator<Item = K>) -> f64 {
    let mut counts: HashMap<K, usize> = HashMap::new();
    let mut total = 0usize;
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    counts.values().copied().max().unwrap_or(0) as f64 / total as f64
}

fn z_sign_bucket(z: f64) -> i8 {
    if z > 0.0 {
        1
    } else if z < 0.0 {
        -1
    } else {
        0
    }
}

/// Roll per-interval analyses into one result
pub fn aggregate(
    symbol: &str,
    primary_symbol: &str,
    timeframes: Vec<TimeframeAnalysis>,
    mut notes: Vec<ConfluenceNote>,
    analysis: &AnalysisConfig,
    config: &MultiTimeframeConfig,
) -> ConfluenceResult {
    let total = timeframes.len();
    if total == 0 {
        notes.push(ConfluenceNote::NoTimeframes);
        return ConfluenceResult {
            symbol: symbol.to_string(),
            primary_symbol: primary_symbol.to_string(),
            timeframes,
            aligned_timeframes: 0,
            total_timeframes: 0,
            best_timeframe: None,
            worst_timeframe: None,
            z_score_agreement: 0.0,
            correlation_agreement: 0.0,
            quality_agreement: 0.0,
            confluence_score: 0.0,
            confidence: ConfluenceConfidence::Low,
            signal_direction: SignalDirection::Neutral,
            notes,
        };
    }

    let directions: Vec<SignalDirection> = timeframes.iter().map(|t| t.result.direction()).collect();
    let signal_direction = majority_direction(&directions);
    let aligned_timeframes = directions.iter().filter(|d| **d == signal_direction).count();

    let strong = analysis.velocity.strong_correlation;
    let moderate = analysis.velocity.moderate_correlation;
    let z_score_agreement = agreement(timeframes.iter().map(|t| z_sign_bucket(t.result.z_score)));
    let correlation_agreement = agreement(
        timeframes
            .iter()
            .map(|t| CorrelationLevel::from_correlation(t.result.correlation, strong, moderate)),
    );
    let quality_agreement = agreement(timeframes.iter().map(|t| t.result.volatility.signal_quality));
    let mean_agreement = (z_score_agreement + correlation_agreement + quality_agreement) / 3.0;

    let weight_sum: f64 = timeframes.iter().map(|t| t.weight).sum();
    let weighted_score = if weight_sum > 0.0 {
        timeframes.iter().map(|t| t.weight * t.result.opportunity_score).sum::<f64>() / weight_sum
    } else {
        0.0
    };
    let confluence_score = stats::clamp(
        stats::finite_or_zero(weighted_score * (AGREEMENT_BASE + AGREEMENT_GAIN * mean_agreement)),
        0.0,
        100.0,
    );
    if mean_agreement < config.low_agreement {
        notes.push(ConfluenceNote::LowAgreement { agreement: mean_agreement });
    }

    let mut best: Option<&TimeframeAnalysis> = None;
    let mut worst: Option<&TimeframeAnalysis> = None;
    for tf in &timeframes {
        if best.map_or(true, |b| tf.result.opportunity_score > b.result.opportunity_score) {
            best = Some(tf);
        }
        if worst.map_or(true, |w| tf.result.opportunity_score < w.result.opportunity_score) {
            worst = Some(tf);
        }
    }
    let best_timeframe = best.map(|t| t.interval.clone());
    let worst_timeframe = worst.map(|t| t.interval.clone());

    let long = directions.iter().filter(|d| **d == SignalDirection::LongSpread).count();
    let short = directions.iter().filter(|d| **d == SignalDirection::ShortSpread).count();
    let aligned_ratio = aligned_timeframes as f64 / total as f64;
    let mean_quality_rank =
        timeframes.iter().map(|t| t.result.volatility.signal_quality.rank() as f64).sum::<f64>() / total as f64;

    let mut confidence = if long > 0 && short > 0 && long.abs_diff(short) <= 1 {
        ConfluenceConfidence::Mixed
    } else if aligned_ratio >= config.high_alignment && mean_quality_rank >= SignalQuality::Strong.rank() as f64 {
        ConfluenceConfidence::High
    } else if aligned_ratio >= config.medium_alignment {
        ConfluenceConfidence::Medium
    } else {
        ConfluenceConfidence::Low
    };

    let first_score = timeframes[0].result.opportunity_score;
    let identical = total > 2
        && timeframes
            .iter()
            .all(|t| (t.result.opportunity_score - first_score).abs() <= config.identical_score_epsilon);
    if identical {
        tracing::warn!(
            "{} {}: all {} timeframes scored {:.0}, treating as a data-quality issue",
            primary_symbol,
            symbol,
            total,
            first_score
        );
        notes.push(ConfluenceNote::IdenticalScores { score: first_score, timeframes: total });
        if confidence == ConfluenceConfidence::High {
            confidence = ConfluenceConfidence::Medium;
        }
    }

    ConfluenceResult {
        symbol: symbol.to_string(),
        primary_symbol: primary_symbol.to_string(),
        timeframes,
        aligned_timeframes,
        total_timeframes: total,
        best_timeframe,
        worst_timeframe,
        z_score_agreement,
        correlation_agreement,
        quality_agreement,
        confluence_score,
        confidence,
        signal_direction,
        notes,
    }
}

/// Analyze every interval and aggregate in one call
pub fn analyze_multi_timeframe(
    series_by_interval: &BTreeMap<String, PairSeries>,
    symbol: &str,
    primary_symbol: &str,
    analysis: &AnalysisConfig,
    config: &MultiTimeframeConfig,
) -> ConfluenceResult {
    let (timeframes, notes) = analyze_timeframes(series_by_interval, symbol, primary_symbol, analysis, config);
    aggregate(symbol, primary_symbol, timeframes, notes, analysis, config)
}
