//! Synthetic cointegrated-pair source for demos and tests.
//!
//! Every symbol is ln(p) = ln(base) + beta·f_t + r_t where f_t is a random
//! walk shared by all symbols on an interval and r_t a per-symbol AR(1)
//! residual. Any two symbols are therefore cointegrated with hedge ratio
//! beta_a / beta_b. Output is a pure function of (seed, symbol, interval, limit).

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::Normal;

use super::resample::parse_interval;
use crate::domain::Ohlcv;
use crate::ports::{MarketDataError, PriceSource};

const FACTOR_SIGMA: f64 = 0.01;
const RESIDUAL_PHI: f64 = 0.9;
const RESIDUAL_SIGMA: f64 = 0.003;

/// FNV-1a, stable across platforms and releases
fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3))
}

#[derive(Debug, Clone)]
pub struct SyntheticSource {
    seed: u64,
    native: Vec<String>,
    end: DateTime<Utc>,
}

impl SyntheticSource {
    pub fn new(seed: u64) -> Self {
        let end = Utc
            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Self {
            seed,
            native: ["15m", "1h", "4h", "1d"].iter().map(|s| s.to_string()).collect(),
            end,
        }
    }

    pub fn with_native_intervals(mut self, intervals: &[&str]) -> Self {
        self.native = intervals.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = end;
        self
    }

    /// Open time of the bar `bars_back` periods before the anchor
    fn bar_time(&self, period: Duration, bars_back: usize) -> Result<DateTime<Utc>, MarketDataError> {
        i64::try_from(bars_back)
            .ok()
            .and_then(|n| period.num_seconds().checked_mul(n))
            .and_then(Duration::try_seconds)
            .and_then(|offset| self.end.checked_sub_signed(offset))
            .ok_or_else(|| {
                MarketDataError::Generator(format!("bar {} periods before {} is out of range", bars_back, self.end))
            })
    }

    fn log_prices(&self, symbol: &str, interval: &str, n: usize, normal: &Normal) -> Vec<f64> {
        let mut factor_rng = StdRng::seed_from_u64(self.seed ^ fnv1a(interval));
        let mut symbol_rng = StdRng::seed_from_u64(self.seed ^ fnv1a(symbol).rotate_left(17) ^ fnv1a(interval));

        let base = 10f64.powf(symbol_rng.gen_range(1.0..3.0)).ln();
        let beta = symbol_rng.gen_range(0.7..1.3);

        let mut factor = 0.0;
        let mut residual = 0.0;
        (0..n)
            .map(|_| {
                factor += FACTOR_SIGMA * factor_rng.sample(normal);
                residual = RESIDUAL_PHI * residual + RESIDUAL_SIGMA * symbol_rng.sample(normal);
                base + beta * factor + residual
            })
            .collect()
    }
}

#[async_trait]
impl PriceSource for SyntheticSource {
    async fn fetch_candles(&self, symbol: &str, interval: &str, limit: usize)
        -> Result<Vec<Ohlcv>, MarketDataError> {
        if !self.native.iter().any(|i| i == interval) {
            return Err(MarketDataError::UnsupportedInterval(interval.to_string()));
        }
        let period = parse_interval(interval)
            .ok_or_else(|| MarketDataError::UnsupportedInterval(interval.to_string()))?;
        let normal = Normal::new(0.0, 1.0).map_err(|e| MarketDataError::Generator(e.to_string()))?;

        let log_prices = self.log_prices(symbol, interval, limit, &normal);
        let mut candles = Vec::with_capacity(limit);
        let mut previous: Option<f64> = None;
        for (i, lp) in log_prices.iter().enumerate() {
            let close = lp.exp();
            let open = previous.unwrap_or(close);
            previous = Some(close);
            candles.push(Ohlcv::new(
                self.bar_time(period, limit - 1 - i)?,
                open,
                open.max(close) * 1.001,
                open.min(close) * 0.999,
                close,
                1_000.0 * (1.0 + (close - open).abs() / open),
            ));
        }
        Ok(candles)
    }

    fn native_intervals(&self) -> Vec<String> {
        self.native.clone()
    }
}
