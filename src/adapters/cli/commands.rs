//! CLI Command Definitions
//!
//! Argument parsing for the `radar` binary. Uses clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Radar - statistical-arbitrage pair scanner
#[derive(Parser, Debug)]
#[command(
    name = "radar",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Statistical-arbitrage pair scanner",
    long_about = "Radar scores candidate pairs against a primary symbol using spread \
                  stationarity, volatility-adjusted z-scores, correlation regime and \
                  multi-timeframe confluence, and backtests the spread rule."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze one symbol against the primary across all intervals
    Analyze(AnalyzeCmd),

    /// Scan every configured symbol and record history
    Scan(ScanCmd),

    /// Backtest the spread rule on one pair
    Backtest(BacktestCmd),

    /// Walk-forward optimize the spread rule on one pair
    Optimize(OptimizeCmd),

    /// Validate a configuration file
    ConfigCheck(ConfigCheckCmd),
}

/// Options shared by every data-consuming command
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/radar.toml")]
    pub config: PathBuf,

    /// Use the seeded synthetic source instead of candle files
    #[arg(long, value_name = "SEED")]
    pub synthetic: Option<u64>,

    /// Override the primary symbol
    #[arg(long, value_name = "SYMBOL")]
    pub primary: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct AnalyzeCmd {
    /// Candidate symbol (e.g., ETH)
    #[arg(value_name = "SYMBOL")]
    pub symbol: String,

    #[command(flatten)]
    pub data: DataArgs,
}

#[derive(Parser, Debug)]
pub struct ScanCmd {
    #[command(flatten)]
    pub data: DataArgs,

    /// Show only the best N results
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct BacktestCmd {
    /// Candidate symbol (e.g., ETH)
    #[arg(value_name = "SYMBOL")]
    pub symbol: String,

    #[command(flatten)]
    pub data: DataArgs,

    /// Interval to backtest on
    #[arg(short, long, value_name = "INTERVAL", default_value = "1h")]
    pub interval: String,

    /// Bars to load
    #[arg(long, value_name = "BARS", default_value = "1000")]
    pub bars: usize,

    /// Override the entry |z| threshold
    #[arg(long, value_name = "Z")]
    pub entry: Option<f64>,

    /// Override take profit percent
    #[arg(long, value_name = "PCT")]
    pub take_profit: Option<f64>,

    /// Override stop loss percent
    #[arg(long, value_name = "PCT")]
    pub stop_loss: Option<f64>,

    /// Print every trade
    #[arg(long)]
    pub trades: bool,
}

#[derive(Parser, Debug)]
pub struct OptimizeCmd {
    /// Candidate symbol (e.g., ETH)
    #[arg(value_name = "SYMBOL")]
    pub symbol: String,

    #[command(flatten)]
    pub data: DataArgs,

    /// Interval to optimize on
    #[arg(short, long, value_name = "INTERVAL", default_value = "1h")]
    pub interval: String,

    /// Bars to load
    #[arg(long, value_name = "BARS", default_value = "2000")]
    pub bars: usize,
}

#[derive(Parser, Debug)]
pub struct ConfigCheckCmd {
    /// Path to configuration file
    #[arg(value_name = "FILE", default_value = "config/radar.toml")]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_app_parse_analyze() {
        let args = vec!["radar", "analyze", "ETH", "--config", "test.toml"];
        let app = CliApp::try_parse_from(args).unwrap();

        match app.command {
            Command::Analyze(cmd) => {
                assert_eq!(cmd.symbol, "ETH");
                assert_eq!(cmd.data.config, PathBuf::from("test.toml"));
                assert!(cmd.data.synthetic.is_none());
                assert!(!cmd.data.json);
            }
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn test_cli_app_parse_scan_synthetic() {
        let args = vec!["radar", "scan", "--synthetic", "42", "--json", "--top", "5"];
        let app = CliApp::try_parse_from(args).unwrap();

        match app.command {
            Command::Scan(cmd) => {
                assert_eq!(cmd.data.synthetic, Some(42));
                assert!(cmd.data.json);
                assert_eq!(cmd.top, Some(5));
                assert_eq!(cmd.data.config, PathBuf::from("config/radar.toml"));
            }
            _ => panic!("Expected Scan command"),
        }
    }

    #[test]
    fn test_cli_app_parse_backtest_overrides() {
        let args = vec![
            "radar", "backtest", "SOL", "--interval", "4h", "--entry", "2.5", "--take-profit", "0.8", "--trades",
        ];
        let app = CliApp::try_parse_from(args).unwrap();

        match app.command {
            Command::Backtest(cmd) => {
                assert_eq!(cmd.symbol, "SOL");
                assert_eq!(cmd.interval, "4h");
                assert_eq!(cmd.entry, Some(2.5));
                assert_eq!(cmd.take_profit, Some(0.8));
                assert!(cmd.stop_loss.is_none());
                assert_eq!(cmd.bars, 1000);
                assert!(cmd.trades);
            }
            _ => panic!("Expected Backtest command"),
        }
    }

    #[test]
    fn test_cli_app_parse_optimize() {
        let args = vec!["radar", "optimize", "ETH", "--primary", "SOL"];
        let app = CliApp::try_parse_from(args).unwrap();

        match app.command {
            Command::Optimize(cmd) => {
                assert_eq!(cmd.data.primary.as_deref(), Some("SOL"));
                assert_eq!(cmd.bars, 2000);
            }
            _ => panic!("Expected Optimize command"),
        }
    }

    #[test]
    fn test_cli_app_parse_config_check() {
        let app = CliApp::try_parse_from(vec!["radar", "config-check", "my.toml"]).unwrap();
        match app.command {
            Command::ConfigCheck(cmd) => assert_eq!(cmd.config, PathBuf::from("my.toml")),
            _ => panic!("Expected ConfigCheck command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let app = CliApp::try_parse_from(vec!["radar", "scan", "--verbose"]).unwrap();
        assert!(app.verbose);
        assert!(!app.debug);

        let app = CliApp::try_parse_from(vec!["radar", "--debug", "scan"]).unwrap();
        assert!(app.debug);
    }

    #[test]
    fn test_missing_symbol_fails() {
        assert!(CliApp::try_parse_from(vec!["radar", "analyze"]).is_err());
    }
}
