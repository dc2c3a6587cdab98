//! Price Series Types
//!
//! `Ohlcv` bars come from the market-data collaborator; `PairSeries` is the
//! aligned two-leg close series every analysis function consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlcv {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Ohlcv {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self { timestamp, open, high, low, close, volume }
    }

    /// Validate OHLC data integrity
    pub fn is_valid(&self) -> bool {
        self.high >= self.low
            && self.close >= self.low
            && self.close <= self.high
            && self.open >= self.low
            && self.open <= self.high
            && self.close > 0.0
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.open.is_finite()
    }
}

/// Two close-price legs aligned bar for bar
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairSeries {
    pub primary: Vec<f64>,
    pub secondary: Vec<f64>,
}

impl PairSeries {
    pub fn new(primary: Vec<f64>, secondary: Vec<f64>) -> Self {
        Self { primary, secondary }
    }

    /// Number of aligned bars (0 when the legs disagree)
    pub fn len(&self) -> usize {
        if self.is_aligned() {
            self.primary.len()
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Both legs have the same length
    pub fn is_aligned(&self) -> bool {
        self.primary.len() == self.secondary.len()
    }

    /// Every price is finite and strictly positive
    pub fn has_valid_prices(&self) -> bool {
        self.primary
            .iter()
            .chain(self.secondary.iter())
            .all(|p| p.is_finite() && *p > 0.0)
    }

    /// Bars `[start, end)` of both legs
    pub fn slice(&self, start: usize, end: usize) -> PairSeries {
        let end = end.min(self.len());
        let start = start.min(end);
        PairSeries {
            primary: self.primary[start..end].to_vec(),
            secondary: self.secondary[start..end].to_vec(),
        }
    }

    /// Join two candle lists on timestamp, keeping only bars present in
    /// both. Input order is irrelevant; output is ascending by time.
    pub fn align(primary: &[Ohlcv], secondary: &[Ohlcv]) -> PairSeries {
        let mut left: Vec<&Ohlcv> = primary.iter().collect();
        let mut right: Vec<&Ohlcv> = secondary.iter().collect();
        left.sort_by_key(|c| c.timestamp);
        right.sort_by_key(|c| c.timestamp);

        let mut out = PairSeries::default();
        let (mut i, mut j) = (0, 0);
        while i < left.len() && j < right.len() {
            match left[i].timestamp.cmp(&right[j].timestamp) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    out.primary.push(left[i].close);
                    out.secondary.push(right[j].close);
                    i += 1;
                    j += 1;
                }
            }
        }
        out
    }
}
