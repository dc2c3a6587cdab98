//! Pair Scanner
//!
//! End-to-end scan of one primary symbol against a candidate list:
//! 1. Fetch and align candles per (symbol, interval)
//! 2. Analyze every interval on a blocking worker
//! 3. Rescale results with per-interval reversion models built from history
//! 4. Aggregate across intervals and rank by confluence score
//! 5. Append one history snapshot per interval

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::domain::PairSeries;
use crate::ports::{align_pair, HistoryError, HistoryStore, MarketDataError, PriceSource};
use crate::strategy::multi_timeframe::{aggregate, analyze_timeframes, ConfluenceResult};
use crate::strategy::params::{AnalysisConfig, ConfigError, MultiTimeframeConfig, ReversionModelOptions};
use crate::strategy::reversion_model::{rescale_with_history, HistoricalRecord, ReversionModel};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),
    #[error("History error: {0}")]
    History(#[from] HistoryError),
    #[error("Invalid settings: {0}")]
    Config(#[from] ConfigError),
    #[error("Analysis worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
    #[error("No data for primary symbol {0} on any interval")]
    NoPrimaryData(String),
}

/// Everything a scan needs besides its collaborators
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    pub primary_symbol: String,
    pub symbols: Vec<String>,
    pub intervals: Vec<String>,
    pub candle_limit: usize,
    /// Keep only the best N results (0 = all)
    pub top_n: usize,
    pub analysis: AnalysisConfig,
    pub timeframes: MultiTimeframeConfig,
    pub reversion: ReversionModelOptions,
}

impl From<&Config> for ScanSettings {
    fn from(config: &Config) -> Self {
        Self {
            primary_symbol: config.scan.primary_symbol.clone(),
            symbols: config.scan.symbols.clone(),
            intervals: config.scan.intervals.clone(),
            candle_limit: config.scan.candle_limit,
            top_n: config.scan.top_n,
            analysis: AnalysisConfig::from(config),
            timeframes: config.timeframes.clone(),
            reversion: config.reversion.clone(),
        }
    }
}

/// A fetch that failed without aborting the scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFailure {
    pub symbol: String,
    pub interval: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub primary_symbol: String,
    pub timestamp: DateTime<Utc>,
    /// Ranked by confluence score, best first
    pub results: Vec<ConfluenceResult>,
    pub failures: Vec<ScanFailure>,
    /// Intervals whose results were rescaled by a history model
    pub history_intervals: Vec<String>,
}

pub struct PairScanner {
    source: Arc<dyn PriceSource>,
    history: Arc<dyn HistoryStore>,
    settings: ScanSettings,
}

impl PairScanner {
    pub fn new(
        source: Arc<dyn PriceSource>,
        history: Arc<dyn HistoryStore>,
        settings: ScanSettings,
    ) -> Result<Self, ScanError> {
        settings.analysis.validate()?;
        settings.timeframes.validate()?;
        settings.reversion.validate()?;
        Ok(Self { source, history, settings })
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Scan every configured symbol now and record the snapshots
    pub async fn scan(&self) -> Result<ScanReport, ScanError> {
        self.scan_at(Utc::now()).await
    }

    /// Scan every configured symbol, stamping history with `timestamp`
    pub async fn scan_at(&self, timestamp: DateTime<Utc>) -> Result<ScanReport, ScanError> {
        let symbols = self.settings.symbols.clone();
        self.run(&symbols, timestamp, true).await
    }

    /// Analyze one symbol across all intervals without recording history
    pub async fn analyze_symbol(&self, symbol: &str) -> Result<ConfluenceResult, ScanError> {
        let report = self.run(&[symbol.to_string()], Utc::now(), false).await?;
        report
            .results
            .into_iter()
            .next()
            .ok_or_else(|| ScanError::MarketData(MarketDataError::UnknownSymbol(symbol.to_string())))
    }

    async fn run(&self, symbols: &[String], timestamp: DateTime<Utc>, persist: bool) -> Result<ScanReport, ScanError> {
        let primary = self.settings.primary_symbol.clone();
        let limit = self.settings.candle_limit;
        info!("Scanning {} symbols against {} on {:?}", symbols.len(), primary, self.settings.intervals);

        let mut failures = Vec::new();
        let mut primary_candles = BTreeMap::new();
        for interval in &self.settings.intervals {
            match self.source.fetch_candles(&primary, interval, limit).await {
                Ok(candles) => {
                    primary_candles.insert(interval.clone(), candles);
                }
                Err(e) => {
                    warn!("{} {}: {}", primary, interval, e);
                    failures.push(ScanFailure {
                        symbol: primary.clone(),
                        interval: interval.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        if primary_candles.is_empty() {
            return Err(ScanError::NoPrimaryData(primary));
        }

        let mut models = BTreeMap::new();
        for interval in primary_candles.keys() {
            let records = self.history.load(&primary, interval).await?;
            let model = ReversionModel::build(&records, &primary, interval, &self.settings.reversion);
            debug!(
                "{} {}: reversion model from {} records, {} samples",
                primary,
                interval,
                records.len(),
                model.sample_count()
            );
            models.insert(interval.clone(), model);
        }

        let mut results = Vec::with_capacity(symbols.len());
        let mut snapshots: BTreeMap<String, Vec<_>> = BTreeMap::new();
        let mut history_intervals = Vec::new();

        for symbol in symbols {
            let mut series_by_interval: BTreeMap<String, PairSeries> = BTreeMap::new();
            for (interval, primary_bars) in &primary_candles {
                match self.source.fetch_candles(symbol, interval, limit).await {
                    Ok(candles) => {
                        series_by_interval.insert(interval.clone(), align_pair(primary_bars, &candles));
                    }
                    Err(e) => {
                        warn!("{} {}: {}", symbol, interval, e);
                        failures.push(ScanFailure {
                            symbol: symbol.clone(),
                            interval: interval.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
            if series_by_interval.is_empty() {
                continue;
            }

            let analysis = self.settings.analysis.clone();
            let timeframes_cfg = self.settings.timeframes.clone();
            let (worker_symbol, worker_primary) = (symbol.clone(), primary.clone());
            let (mut timeframes, notes) = tokio::task::spawn_blocking(move || {
                analyze_timeframes(&series_by_interval, &worker_symbol, &worker_primary, &analysis, &timeframes_cfg)
            })
            .await?;

            for timeframe in &mut timeframes {
                let Some(model) = models.get(&timeframe.interval) else {
                    continue;
                };
                if let Some(estimate) = model.estimate(&timeframe.result) {
                    timeframe.result = rescale_with_history(&timeframe.result, estimate);
                    if !history_intervals.contains(&timeframe.interval) {
                        history_intervals.push(timeframe.interval.clone());
                    }
                }
                snapshots
                    .entry(timeframe.interval.clone())
                    .or_default()
                    .push(timeframe.result.clone());
            }

            let result = aggregate(symbol, &primary, timeframes, notes, &self.settings.analysis, &self.settings.timeframes);
            debug!(
                "{}/{}: confluence {:.1} ({}, {})",
                primary, symbol, result.confluence_score, result.confidence, result.signal_direction
            );
            results.push(result);
        }

        if persist {
            for (interval, entries) in snapshots {
                let record = HistoricalRecord::new(&primary, &interval, timestamp, entries);
                self.history.append(&record).await?;
            }
        }

        results.sort_by(|a, b| b.confluence_score.total_cmp(&a.confluence_score));
        if self.settings.top_n > 0 {
            results.truncate(self.settings.top_n);
        }
        history_intervals.sort();

        info!(
            "Scan complete: {} results, {} fetch failures",
            results.len(),
            failures.len()
        );

        Ok(ScanReport {
            primary_symbol: primary,
            timestamp,
            results,
            failures,
            history_intervals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::market_data::SyntheticSource;
    use crate::ports::{InMemoryHistoryStore, MockPriceSource};
    use chrono::{Duration, TimeZone};

    fn settings(symbols: &[&str]) -> ScanSettings {
        let config = Config::default();
        ScanSettings {
            primary_symbol: "BTC".to_string(),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            intervals: vec!["1h".to_string(), "4h".to_string()],
            candle_limit: 300,
            ..ScanSettings::from(&config)
        }
    }

    fn scanner(symbols: &[&str], history: Arc<InMemoryHistoryStore>) -> PairScanner {
        PairScanner::new(Arc::new(SyntheticSource::new(9)), history, settings(symbols)).unwrap()
    }

    #[tokio::test]
    async fn test_scan_ranks_and_records() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let scanner = scanner(&["ETH", "SOL", "BNB"], history.clone());
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let report = scanner.scan_at(t0).await.unwrap();
        assert_eq!(report.results.len(), 3);
        assert!(report.failures.is_empty());
        for pair in report.results.windows(2) {
            assert!(pair[0].confluence_score >= pair[1].confluence_score);
        }
        for result in &report.results {
            assert_eq!(result.total_timeframes, 2);
            assert!((0.0..=100.0).contains(&result.confluence_score));
        }

        // One snapshot per interval, each carrying every symbol
        assert_eq!(history.len(), 2);
        let hourly = history.load("BTC", "1h").await.unwrap();
        assert_eq!(hourly.len(), 1);
        assert_eq!(hourly[0].entries.len(), 3);
        assert_eq!(hourly[0].timestamp, t0);
    }

    #[tokio::test]
    async fn test_failed_symbol_is_reported_not_fatal() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let source = SyntheticSource::new(9).with_native_intervals(&["1h"]);
        let mut settings = settings(&["ETH"]);
        settings.intervals = vec!["1h".to_string(), "4h".to_string()];
        let scanner = PairScanner::new(Arc::new(source), history, settings).unwrap();

        let report = scanner.scan_at(Utc::now()).await.unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].total_timeframes, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].symbol, "BTC");
        assert_eq!(report.failures[0].interval, "4h");
    }

    #[tokio::test]
    async fn test_missing_primary_is_error() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let scanner = PairScanner::new(Arc::new(MockPriceSource::new()), history, settings(&["ETH"])).unwrap();
        let err = scanner.scan_at(Utc::now()).await.unwrap_err();
        assert!(matches!(err, ScanError::NoPrimaryData(p) if p == "BTC"));
    }

    #[tokio::test]
    async fn test_analyze_symbol_does_not_record() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let scanner = scanner(&["ETH"], history.clone());
        let result = scanner.analyze_symbol("SOL").await.unwrap();
        assert_eq!(result.symbol, "SOL");
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_top_n_truncates() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let mut settings = settings(&["ETH", "SOL", "BNB"]);
        settings.top_n = 2;
        let scanner = PairScanner::new(Arc::new(SyntheticSource::new(9)), history, settings).unwrap();
        let report = scanner.scan_at(Utc::now()).await.unwrap();
        assert_eq!(report.results.len(), 2);
    }

    #[tokio::test]
    async fn test_repeated_scans_accumulate_history() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let scanner = scanner(&["ETH"], history.clone());
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        for i in 0..3 {
            scanner.scan_at(t0 + Duration::hours(i)).await.unwrap();
        }
        let hourly = history.load("BTC", "1h").await.unwrap();
        assert_eq!(hourly.len(), 3);
        assert!(hourly.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut settings = settings(&["ETH"]);
        settings.analysis.spread_weight = 0.9;
        let result = PairScanner::new(
            Arc::new(MockPriceSource::new()),
            Arc::new(InMemoryHistoryStore::new()),
            settings,
        );
        assert!(matches!(result, Err(ScanError::Config(_))));
    }
}
