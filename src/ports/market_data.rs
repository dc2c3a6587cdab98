//! Price source port
//!
//! The analysis core never fetches data; whatever implements `PriceSource`
//! supplies candles and the caller aligns them into a `PairSeries`.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Ohlcv, PairSeries};

/// Market data error type
#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Unsupported interval: {0}")]
    UnsupportedInterval(String),

    #[error("No candles for {symbol} on {interval}")]
    NoData { symbol: String, interval: String },

    #[error("Data parsing error: {0}")]
    ParseError(String),

    #[error("Generator error: {0}")]
    Generator(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Candle supplier for one symbol/interval at a time
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Most recent `limit` candles, ascending by timestamp
    async fn fetch_candles(&self, symbol: &str, interval: &str, limit: usize)
        -> Result<Vec<Ohlcv>, MarketDataError>;

    /// Intervals the source serves without resampling
    fn native_intervals(&self) -> Vec<String>;
}

/// Fetch both legs and join them on timestamp
pub async fn fetch_pair<S: PriceSource + ?Sized>(
    source: &S,
    primary_symbol: &str,
    symbol: &str,
    interval: &str,
    limit: usize,
) -> Result<PairSeries, MarketDataError> {
    let primary = source.fetch_candles(primary_symbol, interval, limit).await?;
    let secondary = source.fetch_candles(symbol, interval, limit).await?;
    Ok(align_pair(&primary, &secondary))
}

/// Join two candle lists on timestamp, dropping bars missing from either
/// side or carrying unusable prices
pub fn align_pair(primary: &[Ohlcv], secondary: &[Ohlcv]) -> PairSeries {
    let primary: Vec<Ohlcv> = primary.iter().filter(|c| c.is_valid()).cloned().collect();
    let secondary: Vec<Ohlcv> = secondary.iter().filter(|c| c.is_valid()).cloned().collect();
    PairSeries::align(&primary, &secondary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bar(minute: i64, close: f64) -> Ohlcv {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
        Ohlcv::new(ts, close, close, close, close, 10.0)
    }

    #[test]
    fn test_align_pair_drops_invalid_bars() {
        let a = vec![bar(0, 1.0), bar(1, f64::NAN), bar(2, 3.0)];
        let b = vec![bar(0, 10.0), bar(1, 20.0), bar(2, 30.0)];
        let pair = align_pair(&a, &b);
        assert_eq!(pair.primary, vec![1.0, 3.0]);
        assert_eq!(pair.secondary, vec![10.0, 30.0]);
    }
}
