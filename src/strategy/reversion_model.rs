//! Reversion Probability Model
//!
//! Mines a time-ordered log of past analyses for labelled outcomes: every
//! tradable snapshot with |z| ≥ entry is followed forward for up to
//! `lookahead_bars` snapshots of the same pair. It counts as reverted when
//! the z-score changes sign, falls to the exit level, or halves. Running
//! out of lookahead is a loss; running out of history is no label at all.
//!
//! Outcomes are counted under a ladder of bucket keys, most specific
//! first. A query walks the same ladder and takes the first bucket with
//! enough samples. Probabilities are Laplace smoothed: (wins + 1) / (total + 2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::stats;
use crate::strategy::correlation_velocity::CorrelationLevel;
use crate::strategy::pair_analyzer::{
    AnalysisNote, PairAnalysisResult, ReversionMethod, ReversionProbability, SignalDirection,
};
use crate::strategy::params::ReversionModelOptions;

/// |z| at or above which a signal is in the high bucket
const HIGH_Z_BUCKET: f64 = 2.0;
/// |z| at or above which a signal is in the extreme bucket
const EXTREME_Z_BUCKET: f64 = 3.0;
/// |correlation| bucket edges
const STRONG_CORRELATION_BUCKET: f64 = 0.7;
const MODERATE_CORRELATION_BUCKET: f64 = 0.4;

/// Snapshot of one scan: every pair analyzed against `primary_pair` on
/// `interval` at `timestamp`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub primary_pair: String,
    pub interval: String,
    pub timestamp: DateTime<Utc>,
    pub entries: Vec<PairAnalysisResult>,
}

impl HistoricalRecord {
    pub fn new(primary_pair: &str, interval: &str, timestamp: DateTime<Utc>, entries: Vec<PairAnalysisResult>) -> Self {
        Self {
            primary_pair: primary_pair.to_string(),
            interval: interval.to_string(),
            timestamp,
            entries,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZBucket {
    Medium,
    High,
    Extreme,
}

impl ZBucket {
    pub fn from_z_score(z: f64) -> Self {
        let abs_z = z.abs();
        if abs_z >= EXTREME_Z_BUCKET {
            Self::Extreme
        } else if abs_z >= HIGH_Z_BUCKET {
            Self::High
        } else {
            Self::Medium
        }
    }
}

fn correlation_bucket(correlation: f64) -> CorrelationLevel {
    CorrelationLevel::from_correlation(correlation.abs(), STRONG_CORRELATION_BUCKET, MODERATE_CORRELATION_BUCKET)
}

/// Composite counter key, listed from most to least specific
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BucketKey {
    PairDirectionZCorrelation {
        symbol: String,
        direction: SignalDirection,
        z: ZBucket,
        correlation: CorrelationLevel,
    },
    PairDirection {
        symbol: String,
        direction: SignalDirection,
    },
    PrimarySymbolDirection {
        primary: String,
        symbol: String,
        direction: SignalDirection,
    },
    DirectionZCorrelation {
        direction: SignalDirection,
        z: ZBucket,
        correlation: CorrelationLevel,
    },
    Direction(SignalDirection),
    Global,
}

impl BucketKey {
    /// The full ladder for one analysis, most specific first
    pub fn ladder(result: &PairAnalysisResult) -> [BucketKey; 6] {
        let direction = SignalDirection::from_z_score(result.z_score);
        let z = ZBucket::from_z_score(result.z_score);
        let correlation = correlation_bucket(result.correlation);
        [
            BucketKey::PairDirectionZCorrelation {
                symbol: result.symbol.clone(),
                direction,
                z,
                correlation,
            },
            BucketKey::PairDirection { symbol: result.symbol.clone(), direction },
            BucketKey::PrimarySymbolDirection {
                primary: result.primary_symbol.clone(),
                symbol: result.symbol.clone(),
                direction,
            },
            BucketKey::DirectionZCorrelation { direction, z, correlation },
            BucketKey::Direction(direction),
            BucketKey::Global,
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounter {
    pub wins: usize,
    pub total: usize,
}

impl OutcomeCounter {
    /// (wins + 1) / (total + 2)
    pub fn smoothed_probability(&self) -> f64 {
        (self.wins as f64 + 1.0) / (self.total as f64 + 2.0)
    }
}

/// Immutable outcome statistics for one primary pair and interval
#[derive(Debug, Clone)]
pub struct ReversionModel {
    primary_pair: String,
    interval: String,
    options: ReversionModelOptions,
    counters: HashMap<BucketKey, OutcomeCounter>,
    labelled: usize,
}

/// Label one entry: Some(true) reverted, Some(false) timed out, None unlabelable
fn label_outcome(entry: &PairAnalysisResult, future: &[&PairAnalysisResult], options: &ReversionModelOptions) -> Option<bool> {
    let entry_z = entry.z_score;
    let entry_sign = entry_z.signum();

    for step in 1..=options.lookahead_bars {
        let later = future.get(step - 1)?;
        let z = later.z_score;
        let flipped = z != 0.0 && z.signum() != entry_sign;
        if flipped || z.abs() <= options.exit_z_score || z.abs() <= entry_z.abs() / 2.0 {
            return Some(true);
        }
    }
    Some(false)
}

impl ReversionModel {
    /// Train on the records matching `primary_pair` and `interval`
    pub fn build(history: &[HistoricalRecord], primary_pair: &str, interval: &str, options: &ReversionModelOptions) -> Self {
        let mut records: Vec<&HistoricalRecord> = history
            .iter()
            .filter(|r| r.primary_pair == primary_pair && r.interval == interval)
            .collect();
        records.sort_by_key(|r| r.timestamp);

        // Per-symbol timelines, in time order
        let mut timelines: HashMap<&str, Vec<&PairAnalysisResult>> = HashMap::new();
        for record in &records {
            for entry in &record.entries {
                timelines.entry(entry.symbol.as_str()).or_default().push(entry);
            }
        }

        let mut counters: HashMap<BucketKey, OutcomeCounter> = HashMap::new();
        let mut labelled = 0usize;
        let mut skipped = 0usize;

        for timeline in timelines.values() {
            for (i, entry) in timeline.iter().enumerate() {
                let z = stats::finite_or_zero(entry.z_score);
                if z.abs() < options.entry_z_score || !entry.is_tradable() {
                    continue;
                }
                match label_outcome(entry, &timeline[i + 1..], options) {
                    Some(won) => {
                        labelled += 1;
                        for key in BucketKey::ladder(entry) {
                            let counter = counters.entry(key).or_default();
                            counter.total += 1;
                            if won {
                                counter.wins += 1;
                            }
                        }
                    }
                    None => skipped += 1,
                }
            }
        }

        tracing::debug!(
            "Reversion model {} {}: {} records, {} labelled signals, {} unlabelable",
            primary_pair,
            interval,
            records.len(),
            labelled,
            skipped
        );

        Self {
            primary_pair: primary_pair.to_string(),
            interval: interval.to_string(),
            options: options.clone(),
            counters,
            labelled,
        }
    }

    pub fn primary_pair(&self) -> &str {
        &self.primary_pair
    }

    pub fn interval(&self) -> &str {
        &self.interval
    }

    /// Number of labelled signals the model was trained on
    pub fn sample_count(&self) -> usize {
        self.labelled
    }

    pub fn is_empty(&self) -> bool {
        self.labelled == 0
    }

    pub fn counter(&self, key: &BucketKey) -> Option<OutcomeCounter> {
        self.counters.get(key).copied()
    }

    /// Empirical reversion probability for a new analysis.
    ///
    /// First bucket on the ladder with at least `min_sample_size` samples,
    /// else the bucket with the most samples, else `None`.
    pub fn estimate(&self, result: &PairAnalysisResult) -> Option<ReversionProbability> {
        let mut largest: Option<OutcomeCounter> = None;
        let mut chosen = None;

        for key in BucketKey::ladder(result) {
            let Some(counter) = self.counters.get(&key).copied() else {
                continue;
            };
            if counter.total >= self.options.min_sample_size {
                chosen = Some(counter);
                break;
            }
            if counter.total > 0 && largest.map_or(true, |l| counter.total > l.total) {
                largest = Some(counter);
            }
        }

        let counter = chosen.or(largest)?;
        Some(ReversionProbability {
            probability: counter.smoothed_probability(),
            lookahead_bars: self.options.lookahead_bars,
            sample_size: counter.total,
            wins: counter.wins,
            method: ReversionMethod::History,
        })
    }
}

/// Replace the fallback probability with an empirical one and rescale the
/// opportunity score by their ratio:
/// clamp(round(score · p_history / p_fallback), 0, 100)
pub fn rescale_with_history(result: &PairAnalysisResult, estimate: ReversionProbability) -> PairAnalysisResult {
    let mut rescaled = result.clone();
    let baseline = result.reversion_probability.probability;

    let score = if baseline > 0.0 {
        (result.opportunity_score * estimate.probability / baseline).round()
    } else {
        result.opportunity_score
    };
    rescaled.opportunity_score = if result.is_tradable() {
        stats::clamp(stats::finite_or_zero(score), 0.0, 100.0)
    } else {
        0.0
    };
    rescaled.notes.push(AnalysisNote::HistoryRescaled {
        probability: estimate.probability,
        sample_size: estimate.sample_size,
    });
    rescaled.reversion_probability = estimate;
    rescaled
}
