//! Candle-file source: `<dir>/<SYMBOL>_<interval>.json`, each a JSON array
//! of `Ohlcv` bars
//!
//! The directory is listed once in `open`; files added later are still read
//! by `fetch_candles` but do not change the native interval set.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::Ohlcv;
use crate::ports::{MarketDataError, PriceSource};

#[derive(Debug, Clone)]
pub struct FileCandleSource {
    dir: PathBuf,
    intervals: Vec<String>,
}

impl FileCandleSource {
    /// List the candle files under `dir`. A missing directory yields a
    /// source with no native intervals.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, MarketDataError> {
        let dir = dir.into();
        let intervals = list_intervals(&dir).await?;
        debug!("{}: native intervals {:?}", dir.display(), intervals);
        Ok(Self { dir, intervals })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, symbol: &str, interval: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.json", symbol, interval))
    }
}

#[async_trait]
impl PriceSource for FileCandleSource {
    async fn fetch_candles(&self, symbol: &str, interval: &str, limit: usize)
        -> Result<Vec<Ohlcv>, MarketDataError> {
        let path = self.path_for(symbol, interval);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MarketDataError::NoData {
                    symbol: symbol.to_string(),
                    interval: interval.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut candles: Vec<Ohlcv> = serde_json::from_str(&content)
            .map_err(|e| MarketDataError::ParseError(format!("{}: {}", path.display(), e)))?;
        candles.sort_by_key(|c| c.timestamp);
        debug!("Loaded {} candles from {}", candles.len(), path.display());

        let skip = candles.len().saturating_sub(limit);
        Ok(candles.into_iter().skip(skip).collect())
    }

    fn native_intervals(&self) -> Vec<String> {
        self.intervals.clone()
    }
}

/// Interval suffixes of every `*_<interval>.json` file in the directory
async fn list_intervals(dir: &Path) -> Result<Vec<String>, MarketDataError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut intervals = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some((_, interval)) = name.strip_suffix(".json").and_then(|stem| stem.rsplit_once('_')) {
            intervals.push(interval.to_string());
        }
    }
    intervals.sort();
    intervals.dedup();
    Ok(intervals)
}
