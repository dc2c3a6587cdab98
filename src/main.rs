//! Radar - Statistical-Arbitrage Pair Scanner
//!
//! Scores candidate pairs against a primary symbol and backtests the spread rule.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use statarb_radar::adapters::cli::{
    AnalyzeCmd, BacktestCmd, CliApp, Command, ConfigCheckCmd, DataArgs, OptimizeCmd, ScanCmd,
};
use statarb_radar::adapters::{FileCandleSource, JsonlHistoryStore, ResamplingSource, SyntheticSource};
use statarb_radar::application::{PairScanner, ScanReport, ScanSettings};
use statarb_radar::backtest::{run_backtest, run_walk_forward, BacktestResult, OptimizedParams};
use statarb_radar::config::{load_config, Config};
use statarb_radar::ports::{fetch_pair, PriceSource};
use statarb_radar::strategy::ConfluenceResult;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (RADAR_DATA_DIR, RADAR_HISTORY_PATH)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();

    match app.command {
        Command::Analyze(cmd) => {
            let config = load_or_default(&cmd.data)?;
            init_logging(app.verbose, app.debug, &config)?;
            analyze_command(cmd, config).await
        }
        Command::Scan(cmd) => {
            let config = load_or_default(&cmd.data)?;
            init_logging(app.verbose, app.debug, &config)?;
            scan_command(cmd, config).await
        }
        Command::Backtest(cmd) => {
            let config = load_or_default(&cmd.data)?;
            init_logging(app.verbose, app.debug, &config)?;
            backtest_command(cmd, config).await
        }
        Command::Optimize(cmd) => {
            let config = load_or_default(&cmd.data)?;
            init_logging(app.verbose, app.debug, &config)?;
            optimize_command(cmd, config).await
        }
        Command::ConfigCheck(cmd) => {
            init_logging(app.verbose, app.debug, &Config::default())?;
            config_check_command(cmd)
        }
    }
}

/// `[logging] level` wins over the flags; RUST_LOG wins over both
fn init_logging(verbose: bool, debug: bool, config: &Config) -> Result<()> {
    let level = match &config.logging.level {
        Some(level) => level.as_str(),
        None if debug => "debug",
        None if verbose => "info",
        None => "warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    Ok(())
}

/// Load the config file; a missing file falls back to defaults
fn load_or_default(data: &DataArgs) -> Result<Config> {
    let path = shellexpand::tilde(&data.config.to_string_lossy()).to_string();
    let mut config = if Path::new(&path).exists() {
        load_config(&path).with_context(|| format!("Failed to load configuration from {}", path))?
    } else {
        eprintln!("Config {} not found, using defaults", path);
        Config::default()
    };

    if let Some(primary) = &data.primary {
        config.scan.symbols.retain(|s| s != primary);
        config.scan.primary_symbol = primary.clone();
    }
    Ok(config)
}

async fn build_source(data: &DataArgs, config: &Config) -> Result<Arc<dyn PriceSource>> {
    match data.synthetic {
        Some(seed) => {
            tracing::info!("Using synthetic source (seed {})", seed);
            Ok(Arc::new(ResamplingSource::new(SyntheticSource::new(seed))))
        }
        None => {
            let dir = config.scan.resolved_data_dir();
            tracing::info!("Reading candles from {}", dir.display());
            let source = FileCandleSource::open(&dir)
                .await
                .with_context(|| format!("Failed to list candle files in {}", dir.display()))?;
            Ok(Arc::new(ResamplingSource::new(source)))
        }
    }
}

async fn build_scanner(data: &DataArgs, config: &Config) -> Result<PairScanner> {
    let history_path = config.scan.resolved_history_path();
    tracing::info!("History: {}", history_path.display());
    let history = Arc::new(JsonlHistoryStore::new(history_path));
    PairScanner::new(build_source(data, config).await?, history, ScanSettings::from(config))
        .context("Invalid scan settings")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

/// Handle analyze command
async fn analyze_command(cmd: AnalyzeCmd, config: Config) -> Result<()> {
    let scanner = build_scanner(&cmd.data, &config).await?;
    let result = scanner
        .analyze_symbol(&cmd.symbol)
        .await
        .with_context(|| format!("Failed to analyze {}", cmd.symbol))?;

    if cmd.data.json {
        return print_json(&result);
    }
    print_confluence(&result);
    for timeframe in &result.timeframes {
        let r = &timeframe.result;
        println!(
            "  {:>4}  z {:+6.2}  corr {:5.2}  beta {:6.3}  half-life {:6.1}  score {:5.1}  p(revert) {:4.0}% [{:?}]",
            timeframe.interval,
            r.z_score,
            r.correlation,
            r.hedge_ratio,
            r.stationarity.half_life_bars,
            r.opportunity_score,
            r.reversion_probability.probability * 100.0,
            r.reversion_probability.method,
        );
        for note in &r.notes {
            println!("        - {}", note);
        }
    }
    Ok(())
}

/// Handle scan command
async fn scan_command(cmd: ScanCmd, mut config: Config) -> Result<()> {
    if let Some(top) = cmd.top {
        config.scan.top_n = top;
    }
    let scanner = build_scanner(&cmd.data, &config).await?;
    let report = scanner.scan().await.context("Scan failed")?;

    if cmd.data.json {
        return print_json(&report);
    }
    print_report(&report);
    Ok(())
}

/// Handle backtest command
async fn backtest_command(cmd: BacktestCmd, config: Config) -> Result<()> {
    let mut backtest = config.backtest.clone();
    if let Some(entry) = cmd.entry {
        backtest = backtest.with_entry_threshold(entry);
    }
    let take_profit = cmd.take_profit.unwrap_or(backtest.take_profit_percent);
    let stop_loss = cmd.stop_loss.unwrap_or(backtest.stop_loss_percent);
    backtest = backtest.with_exits(take_profit, stop_loss);
    backtest.validate().context("Invalid backtest parameters")?;

    let source = build_source(&cmd.data, &config).await?;
    let primary = &config.scan.primary_symbol;
    let series = fetch_pair(source.as_ref(), primary, &cmd.symbol, &cmd.interval, cmd.bars)
        .await
        .with_context(|| format!("Failed to load {}/{} {}", primary, cmd.symbol, cmd.interval))?;

    let symbol = cmd.symbol.clone();
    let primary_symbol = primary.clone();
    let result = tokio::task::spawn_blocking(move || {
        run_backtest(&series.primary, &series.secondary, &symbol, &primary_symbol, &backtest)
    })
    .await
    .context("Backtest worker failed")?;

    if cmd.data.json {
        return print_json(&result);
    }
    print_backtest(&result, cmd.trades);
    Ok(())
}

/// Handle optimize command
async fn optimize_command(cmd: OptimizeCmd, config: Config) -> Result<()> {
    let source = build_source(&cmd.data, &config).await?;
    let primary = &config.scan.primary_symbol;
    let series = fetch_pair(source.as_ref(), primary, &cmd.symbol, &cmd.interval, cmd.bars)
        .await
        .with_context(|| format!("Failed to load {}/{} {}", primary, cmd.symbol, cmd.interval))?;

    let symbol = cmd.symbol.clone();
    let primary_symbol = primary.clone();
    let backtest = config.backtest.clone();
    let walk_forward = config.walk_forward.clone();
    let result = tokio::task::spawn_blocking(move || {
        run_walk_forward(&series.primary, &series.secondary, &symbol, &primary_symbol, &backtest, &walk_forward)
    })
    .await
    .context("Optimizer worker failed")?;

    if cmd.data.json {
        return print_json(&result);
    }
    print_optimization(&result);
    Ok(())
}

/// Handle config-check command
fn config_check_command(cmd: ConfigCheckCmd) -> Result<()> {
    let config = load_config(&cmd.config)
        .with_context(|| format!("Configuration {} is invalid", cmd.config.display()))?;

    println!("✓ {} is valid", cmd.config.display());
    println!("  Primary: {}", config.scan.primary_symbol);
    println!("  Symbols: {}", config.scan.symbols.join(", "));
    println!("  Intervals: {}", config.scan.intervals.join(", "));
    println!("  Candle dir: {}", config.scan.resolved_data_dir().display());
    println!("  History: {}", config.scan.resolved_history_path().display());
    println!(
        "  Backtest: entry {:.2} / tp {:.2}% / sl {:.2}% / min corr {:.2}",
        config.backtest.entry_spread_threshold,
        config.backtest.take_profit_percent,
        config.backtest.stop_loss_percent,
        config.backtest.min_correlation
    );
    println!(
        "  Walk-forward: train {} / test {} / {} grid points",
        config.walk_forward.train_window,
        config.walk_forward.test_window,
        config.walk_forward.grid_size()
    );
    Ok(())
}

fn print_confluence(result: &ConfluenceResult) {
    println!(
        "{}/{}: confluence {:.1} ({} confidence), {} | {}/{} timeframes aligned, best {}",
        result.primary_symbol,
        result.symbol,
        result.confluence_score,
        result.confidence,
        result.signal_direction,
        result.aligned_timeframes,
        result.total_timeframes,
        result.best_timeframe.as_deref().unwrap_or("-"),
    );
    for note in &result.notes {
        println!("  ! {}", note);
    }
}

fn print_report(report: &ScanReport) {
    println!("┌─────────────────────────────────────────────┐");
    println!("│  Radar scan vs {:<29}│", report.primary_symbol);
    println!("│  {:<43}│", report.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    println!("└─────────────────────────────────────────────┘");

    for (rank, result) in report.results.iter().enumerate() {
        print!("{:>3}. ", rank + 1);
        print_confluence(result);
    }
    if !report.history_intervals.is_empty() {
        println!("\nHistory-calibrated intervals: {}", report.history_intervals.join(", "));
    }
    for failure in &report.failures {
        println!("  ✗ {} {}: {}", failure.symbol, failure.interval, failure.error);
    }
}

fn print_backtest(result: &BacktestResult, show_trades: bool) {
    let s = &result.summary;
    println!("Backtest {}/{} ({} bars, correlation {:.3})", result.primary_symbol, result.symbol, result.bars, result.correlation);
    if let Some(reason) = result.skip_reason {
        println!("  Skipped: {:?}", reason);
        return;
    }
    println!("  Trades: {} ({} won, {} lost)", s.total_trades, s.winning_trades, s.losing_trades);
    println!("  Win rate: {:.1}%", s.win_rate * 100.0);
    println!("  Total profit: {:+.2}%  (avg {:+.3}%)", s.total_profit_percent, s.average_profit_percent);
    println!("  Max drawdown: {:.2}%", s.max_drawdown_percent);
    println!("  Profit factor: {:.2}", s.profit_factor);
    println!("  Avg duration: {:.1} bars", s.average_duration_bars);
    println!("  Largest win/loss: {:+.2}% / {:+.2}%", s.largest_win_percent, s.largest_loss_percent);

    if show_trades {
        for trade in &result.trades {
            println!(
                "    {:>5} -> {:>5}  {:<13}  z {:+5.2} -> {:+5.2}  {:+.3}%  ({})",
                trade.entry_index,
                trade.exit_index,
                trade.direction.to_string(),
                trade.entry_z_score,
                trade.exit_z_score,
                trade.profit_percent,
                trade.exit_reason
            );
        }
    }
}

fn print_optimization(result: &OptimizedParams) {
    println!("Walk-forward {}/{}: {} windows", result.primary_symbol, result.symbol, result.total_windows());
    for window in &result.windows {
        println!(
            "  #{:<2} train [{}, {}) test [{}, {})  {}  test {:+.2}% ({} trades)  baseline {:+.2}%",
            window.index,
            window.train_start,
            window.train_end,
            window.test_start,
            window.test_end,
            window.params,
            window.test_profit_percent,
            window.test_trades,
            window.baseline_profit_percent
        );
    }
    println!("  Recommended: {}", result.recommended);
    println!(
        "  Out-of-sample: {:+.2}% over {} trades, win rate {:.1}%",
        result.out_of_sample_profit_percent,
        result.out_of_sample_trades,
        result.out_of_sample_win_rate * 100.0
    );
    println!(
        "  Baseline: {:+.2}%  Improvement: {:+.2}%  Confidence: {}",
        result.baseline_profit_percent, result.improvement_percent, result.confidence
    );
}
