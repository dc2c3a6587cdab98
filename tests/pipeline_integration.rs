//! Pipeline Integration Tests
//!
//! Drives the public API end to end without network access:
//! 1. SyntheticSource -> PairScanner -> JsonlHistoryStore
//! 2. Stored history -> ReversionModel -> rescaled results
//! 3. fetch_pair -> run_backtest / run_walk_forward
//! 4. Resampled intervals through the multi-timeframe engine

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;

use statarb_radar::adapters::{JsonlHistoryStore, ResamplingSource, SyntheticSource};
use statarb_radar::application::{PairScanner, ScanSettings};
use statarb_radar::backtest::{run_backtest, run_walk_forward, OptimizationConfidence};
use statarb_radar::config::{parse_config, Config};
use statarb_radar::domain::ExitReason;
use statarb_radar::ports::{fetch_pair, HistoryStore, PriceSource};
use statarb_radar::strategy::{
    analyze_multi_timeframe, analyze_pair, AnalysisConfig, BacktestConfig, MultiTimeframeConfig,
    ReversionMethod, ReversionModel, WalkForwardConfig,
};

// ============================================================================
// Test Fixtures
// ============================================================================

fn scan_settings(symbols: &[&str]) -> ScanSettings {
    let config = parse_config(
        r#"
[scan]
primary_symbol = "BTC"
symbols = ["ETH"]
intervals = ["1h", "2h", "4h"]
candle_limit = 300
"#,
    )
    .unwrap();
    ScanSettings {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        ..ScanSettings::from(&config)
    }
}

fn resampled_source(seed: u64) -> Arc<dyn PriceSource> {
    // 2h is not native and must be built from 1h bars
    Arc::new(ResamplingSource::new(SyntheticSource::new(seed)))
}

// ============================================================================
// Scanner + history
// ============================================================================

#[tokio::test]
async fn test_scan_persists_and_reloads_history() {
    let dir = TempDir::new().unwrap();
    let history = Arc::new(JsonlHistoryStore::new(dir.path().join("history.jsonl")));
    let scanner = PairScanner::new(resampled_source(21), history.clone(), scan_settings(&["ETH", "SOL"])).unwrap();

    let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let report = scanner.scan_at(t0).await.unwrap();

    assert_eq!(report.results.len(), 2);
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    for result in &report.results {
        assert_eq!(result.total_timeframes, 3);
        assert!(result.aligned_timeframes <= result.total_timeframes);
        assert!((0.0..=100.0).contains(&result.confluence_score));
        for timeframe in &result.timeframes {
            assert!((0.0..=100.0).contains(&timeframe.result.opportunity_score));
            if !timeframe.result.is_tradable() {
                assert_eq!(timeframe.result.opportunity_score, 0.0);
            }
        }
    }

    for interval in ["1h", "2h", "4h"] {
        let records = history.load("BTC", interval).await.unwrap();
        assert_eq!(records.len(), 1, "interval {}", interval);
        assert_eq!(records[0].entries.len(), 2);
    }
}

#[tokio::test]
async fn test_history_feeds_reversion_model() {
    let dir = TempDir::new().unwrap();
    let history = Arc::new(JsonlHistoryStore::new(dir.path().join("history.jsonl")));
    let scanner = PairScanner::new(resampled_source(5), history.clone(), scan_settings(&["ETH"])).unwrap();

    let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    for i in 0..4 {
        scanner.scan_at(t0 + Duration::hours(i)).await.unwrap();
    }

    let records = history.load("BTC", "1h").await.unwrap();
    assert_eq!(records.len(), 4);
    let model = ReversionModel::build(&records, "BTC", "1h", &Default::default());
    assert_eq!(model.primary_pair(), "BTC");

    // Whatever the model says, a rescaled result stays within bounds and
    // records where its probability came from
    let report = scanner.scan_at(t0 + Duration::hours(4)).await.unwrap();
    for timeframe in &report.results[0].timeframes {
        let p = &timeframe.result.reversion_probability;
        assert!(p.probability > 0.0 && p.probability < 1.0);
        match p.method {
            ReversionMethod::History => assert!(p.sample_size > 0),
            ReversionMethod::Fallback => assert_eq!(p.sample_size, 0),
        }
    }
}

// ============================================================================
// Backtest + walk-forward
// ============================================================================

#[tokio::test]
async fn test_backtest_on_synthetic_pair() {
    let source = SyntheticSource::new(11);
    let series = fetch_pair(&source, "BTC", "ETH", "1h", 1000).await.unwrap();
    assert_eq!(series.len(), 1000);

    let config = BacktestConfig::default().with_entry_threshold(2.0).with_min_correlation(0.5);
    let result = run_backtest(&series.primary, &series.secondary, "ETH", "BTC", &config);

    assert_eq!(result.equity_curve.len(), result.trades.len() + 1);
    for pair in result.trades.windows(2) {
        assert!(pair[1].entry_index > pair[0].exit_index);
    }
    for trade in &result.trades {
        if trade.exit_reason == ExitReason::EndOfData {
            assert_eq!(trade.exit_index, 999);
        }
    }
    let wins = result.trades.iter().filter(|t| t.profit_percent > 0.0).count();
    assert_eq!(result.summary.winning_trades, wins);
}

#[tokio::test]
async fn test_short_history_backtest_is_empty() {
    let source = SyntheticSource::new(11);
    let series = fetch_pair(&source, "BTC", "ETH", "1h", 60).await.unwrap();
    let result = run_backtest(&series.primary, &series.secondary, "ETH", "BTC", &BacktestConfig::default());
    assert!(result.trades.is_empty());
    assert_eq!(result.summary.total_trades, 0);
    assert_eq!(result.summary.total_profit_percent, 0.0);
}

#[tokio::test]
async fn test_walk_forward_on_synthetic_pair() {
    let source = SyntheticSource::new(3);
    let series = fetch_pair(&source, "BTC", "SOL", "1h", 900).await.unwrap();

    let backtest = BacktestConfig::default().with_min_correlation(0.5);
    let config = WalkForwardConfig::default().with_windows(400, 100);
    let result = run_walk_forward(&series.primary, &series.secondary, "SOL", "BTC", &backtest, &config);

    // Windows start at 0, 100, 200, 300, 400
    assert_eq!(result.total_windows(), 5);
    assert_eq!(result.windows.last().unwrap().test_end, 900);
    let expected = result.out_of_sample_profit_percent - result.baseline_profit_percent;
    assert!((result.improvement_percent - expected).abs() < 1e-9);
    if result.positive_window_ratio < 0.5 {
        assert_eq!(result.confidence, OptimizationConfidence::Low);
    }
}

// ============================================================================
// Multi-timeframe with resampled data
// ============================================================================

#[tokio::test]
async fn test_resampled_intervals_feed_confluence() {
    let source = ResamplingSource::new(SyntheticSource::new(8));
    let mut series_by_interval = BTreeMap::new();
    for interval in ["1h", "2h", "4h"] {
        let pair = fetch_pair(&source, "BTC", "ETH", interval, 200).await.unwrap();
        assert_eq!(pair.len(), 200, "interval {}", interval);
        series_by_interval.insert(interval.to_string(), pair);
    }

    let analysis = AnalysisConfig::default();
    let result = analyze_multi_timeframe(
        &series_by_interval,
        "ETH",
        "BTC",
        &analysis,
        &MultiTimeframeConfig::default().with_weight("4h", 2.0),
    );
    assert_eq!(result.total_timeframes, 3);
    assert!(result.best_timeframe.is_some());

    let direct = analyze_pair(
        &series_by_interval["1h"].primary,
        &series_by_interval["1h"].secondary,
        "ETH",
        "BTC",
        &analysis,
    );
    let from_engine = result.timeframes.iter().find(|t| t.interval == "1h").unwrap();
    assert_eq!(from_engine.result.z_score, direct.z_score);
    assert_eq!(from_engine.weight, 1.0);
}

#[test]
fn test_default_config_round_trips() {
    let config = Config::default();
    let text = toml::to_string(&config).unwrap();
    assert_eq!(parse_config(&text).unwrap(), config);
}
