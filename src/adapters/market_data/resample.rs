//! Resampling wrapper
//!
//! Serves intervals the inner source lacks by aggregating the coarsest
//! native interval that divides the requested one. Buckets are
//! floor(epoch_seconds / period), so `1w` buckets start on Thursdays.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::domain::Ohlcv;
use crate::ports::{MarketDataError, PriceSource};

/// Parse `<n>m`, `<n>h`, `<n>d`, `<n>w` into a period
pub fn parse_interval(interval: &str) -> Option<Duration> {
    let interval = interval.trim();
    let unit = interval.chars().last()?;
    let count: i64 = interval[..interval.len() - unit.len_utf8()].parse().ok()?;
    if count <= 0 {
        return None;
    }
    match unit {
        'm' => Some(Duration::minutes(count)),
        'h' => Some(Duration::hours(count)),
        'd' => Some(Duration::days(count)),
        'w' => Some(Duration::weeks(count)),
        _ => None,
    }
}

/// Aggregate ascending candles into `period` buckets:
/// open=first, high=max, low=min, close=last, volume=sum
pub fn resample(candles: &[Ohlcv], period: Duration) -> Vec<Ohlcv> {
    let period_secs = period.num_seconds();
    if period_secs <= 0 {
        return Vec::new();
    }

    let mut out: Vec<Ohlcv> = Vec::new();
    let mut current_bucket: Option<i64> = None;

    for candle in candles {
        let bucket = candle.timestamp.timestamp().div_euclid(period_secs);
        match (current_bucket, out.last_mut()) {
            (Some(b), Some(bar)) if b == bucket => {
                bar.high = bar.high.max(candle.high);
                bar.low = bar.low.min(candle.low);
                bar.close = candle.close;
                bar.volume += candle.volume;
            }
            _ => {
                let Some(start) = DateTime::<Utc>::from_timestamp(bucket * period_secs, 0) else {
                    continue;
                };
                out.push(Ohlcv::new(start, candle.open, candle.high, candle.low, candle.close, candle.volume));
                current_bucket = Some(bucket);
            }
        }
    }

    out
}

/// `PriceSource` that synthesises non-native intervals from its inner source
#[derive(Debug, Clone)]
pub struct ResamplingSource<S> {
    inner: S,
}

impl<S: PriceSource> ResamplingSource<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Coarsest native interval whose period divides `target`
    fn base_interval(&self, target: Duration) -> Option<(String, Duration)> {
        self.inner
            .native_intervals()
            .into_iter()
            .filter_map(|i| parse_interval(&i).map(|p| (i, p)))
            .filter(|(_, p)| {
                p.num_seconds() > 0
                    && p.num_seconds() <= target.num_seconds()
                    && target.num_seconds() % p.num_seconds() == 0
            })
            .max_by_key(|(_, p)| p.num_seconds())
    }
}

#[async_trait]
impl<S: PriceSource> PriceSource for ResamplingSource<S> {
    async fn fetch_candles(&self, symbol: &str, interval: &str, limit: usize)
        -> Result<Vec<Ohlcv>, MarketDataError> {
        if self.inner.native_intervals().iter().any(|i| i == interval) {
            return self.inner.fetch_candles(symbol, interval, limit).await;
        }

        let target = parse_interval(interval)
            .ok_or_else(|| MarketDataError::UnsupportedInterval(interval.to_string()))?;
        let (base, base_period) = self
            .base_interval(target)
            .ok_or_else(|| MarketDataError::UnsupportedInterval(interval.to_string()))?;

        let ratio = (target.num_seconds() / base_period.num_seconds()) as usize;
        // One spare bucket covers a partial bucket at the start
        let fine_limit = limit.saturating_add(1).saturating_mul(ratio);
        debug!("{} {}: resampling {} x{} ({} bars)", symbol, interval, base, ratio, fine_limit);

        let fine = self.inner.fetch_candles(symbol, &base, fine_limit).await?;
        let bars = resample(&fine, target);
        let skip = bars.len().saturating_sub(limit);
        Ok(bars.into_iter().skip(skip).collect())
    }

    fn native_intervals(&self) -> Vec<String> {
        self.inner.native_intervals()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::MockPriceSource;
    use chrono::TimeZone;

    fn hourly(n: usize) -> Vec<Ohlcv> {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let c = 100.0 + i as f64;
                Ohlcv::new(start + Duration::hours(i as i64), c - 0.5, c + 1.0, c - 1.0, c, 2.0)
            })
            .collect()
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("15m"), Some(Duration::minutes(15)));
        assert_eq!(parse_interval("4h"), Some(Duration::hours(4)));
        assert_eq!(parse_interval("1d"), Some(Duration::days(1)));
        assert_eq!(parse_interval("2w"), Some(Duration::weeks(2)));
        assert_eq!(parse_interval("0h"), None);
        assert_eq!(parse_interval("h"), None);
        assert_eq!(parse_interval("3x"), None);
    }

    #[test]
    fn test_resample_aggregates_ohlcv() {
        let bars = resample(&hourly(8), Duration::hours(4));
        assert_eq!(bars.len(), 2);

        let first = &bars[0];
        assert_eq!(first.timestamp, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(first.open, 99.5);
        assert_eq!(first.high, 104.0);
        assert_eq!(first.low, 99.0);
        assert_eq!(first.close, 103.0);
        assert_eq!(first.volume, 8.0);
        assert_eq!(bars[1].close, 107.0);
    }

    #[tokio::test]
    async fn test_resampling_source_synthesises_interval() {
        let source = ResamplingSource::new(MockPriceSource::new().with_candles("ETH", "1h", hourly(48)));

        let bars = source.fetch_candles("ETH", "4h", 5).await.unwrap();
        assert_eq!(bars.len(), 5);
        assert_eq!(bars[4].close, 147.0);
        assert_eq!(source.inner().get_calls()[0].1, "1h");
    }

    #[tokio::test]
    async fn test_resampling_source_passes_native_through() {
        let source = ResamplingSource::new(MockPriceSource::new().with_candles("ETH", "1h", hourly(10)));
        let bars = source.fetch_candles("ETH", "1h", 4).await.unwrap();
        assert_eq!(bars.len(), 4);
    }

    #[tokio::test]
    async fn test_resampling_source_rejects_indivisible() {
        let source = ResamplingSource::new(MockPriceSource::new().with_candles("ETH", "1h", hourly(10)));
        let err = source.fetch_candles("ETH", "90m", 4).await.unwrap_err();
        assert!(matches!(err, MarketDataError::UnsupportedInterval(_)));
    }
}
