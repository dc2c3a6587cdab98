//! Configuration Loader
//!
//! Loads and validates configuration from TOML files. Every section is
//! optional and falls back to the documented defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::adapters::market_data::parse_interval;
use crate::strategy::params::{
    AnalysisConfig, BacktestConfig, ConfigError as ParamError, MultiTimeframeConfig, ReversionModelOptions,
    StationarityConfig, VelocityConfig, VolatilityConfig, WalkForwardConfig,
};

/// Main configuration structure matching radar.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analysis: AnalysisSection,
    pub stationarity: StationarityConfig,
    pub volatility: VolatilityConfig,
    pub velocity: VelocityConfig,
    pub timeframes: MultiTimeframeConfig,
    pub reversion: ReversionModelOptions,
    pub backtest: BacktestConfig,
    pub walk_forward: WalkForwardConfig,
    pub scan: ScanSection,
    pub logging: LoggingSection,
}

/// Orchestrator thresholds; the nested analyzers have their own sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSection {
    pub z_window: usize,
    pub min_bars: usize,
    pub extreme_z_score: f64,
    pub high_z_score: f64,
    pub spread_weight: f64,
    pub method_weight: f64,
    pub max_fallback_lookahead: usize,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        let defaults = AnalysisConfig::default();
        Self {
            z_window: defaults.z_window,
            min_bars: defaults.min_bars,
            extreme_z_score: defaults.extreme_z_score,
            high_z_score: defaults.high_z_score,
            spread_weight: defaults.spread_weight,
            method_weight: defaults.method_weight,
            max_fallback_lookahead: defaults.max_fallback_lookahead,
        }
    }
}

/// Scanner universe and data locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSection {
    /// Leg every candidate is paired against
    pub primary_symbol: String,
    pub symbols: Vec<String>,
    pub intervals: Vec<String>,
    /// Candles requested per symbol and interval
    pub candle_limit: usize,
    /// Directory of `<SYMBOL>_<interval>.json` candle files
    pub data_dir: String,
    /// JSON-lines scan history
    pub history_path: String,
    /// Keep only the best N results (0 = all)
    pub top_n: usize,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            primary_symbol: "BTC".to_string(),
            symbols: vec!["ETH".to_string(), "SOL".to_string(), "BNB".to_string()],
            intervals: vec!["1h".to_string(), "4h".to_string(), "1d".to_string()],
            candle_limit: 500,
            data_dir: "data/candles".to_string(),
            history_path: "data/history.jsonl".to_string(),
            top_n: 0,
        }
    }
}

impl ScanSection {
    /// Candle directory, `RADAR_DATA_DIR` taking precedence
    pub fn resolved_data_dir(&self) -> PathBuf {
        expand(&std::env::var("RADAR_DATA_DIR").unwrap_or_else(|_| self.data_dir.clone()))
    }

    /// History file, `RADAR_HISTORY_PATH` taking precedence
    pub fn resolved_history_path(&self) -> PathBuf {
        expand(&std::env::var("RADAR_HISTORY_PATH").unwrap_or_else(|_| self.history_path.clone()))
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error". Overrides the CLI flags.
    pub level: Option<String>,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(#[from] ParamError),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

/// Load configuration from a TOML file (`~` is expanded)
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = expand(&path.as_ref().to_string_lossy());
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        let analysis = AnalysisConfig::from(self);
        analysis.validate()?;
        self.timeframes.validate()?;
        self.reversion.validate()?;
        self.backtest.validate()?;
        self.walk_forward.validate(&self.backtest)?;

        if self.scan.primary_symbol.is_empty() {
            return Err(ConfigError::ValidationError("scan.primary_symbol cannot be empty".to_string()));
        }
        if self.scan.symbols.iter().any(|s| s == &self.scan.primary_symbol) {
            return Err(ConfigError::ValidationError(format!(
                "scan.symbols cannot contain the primary symbol {}",
                self.scan.primary_symbol
            )));
        }
        if self.scan.intervals.is_empty() {
            return Err(ConfigError::ValidationError("scan.intervals cannot be empty".to_string()));
        }
        if let Some(bad) = self.scan.intervals.iter().find(|i| parse_interval(i).is_none()) {
            return Err(ConfigError::ValidationError(format!(
                "scan.intervals: unrecognized interval '{}'",
                bad
            )));
        }
        if self.scan.candle_limit < analysis.min_bars {
            return Err(ConfigError::ValidationError(format!(
                "scan.candle_limit must be >= analysis.min_bars ({}), got {}",
                analysis.min_bars, self.scan.candle_limit
            )));
        }

        if let Some(level) = &self.logging.level {
            if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
                return Err(ConfigError::ValidationError(format!("logging.level: unknown level '{}'", level)));
            }
        }

        Ok(())
    }
}

// Conversion from Config to the orchestrator settings
impl From<&Config> for AnalysisConfig {
    fn from(config: &Config) -> Self {
        AnalysisConfig {
            z_window: config.analysis.z_window,
            min_bars: config.analysis.min_bars,
            extreme_z_score: config.analysis.extreme_z_score,
            high_z_score: config.analysis.high_z_score,
            spread_weight: config.analysis.spread_weight,
            method_weight: config.analysis.method_weight,
            max_fallback_lookahead: config.analysis.max_fallback_lookahead,
            stationarity: config.stationarity.clone(),
            volatility: config.volatility.clone(),
            velocity: config.velocity.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> String {
        r#"
[analysis]
extreme_z_score = 2.5
high_z_score = 1.2

[stationarity]
rolling_window = 80
max_half_life_bars = 60.0

[timeframes]
weights = { "1h" = 1.0, "4h" = 1.5, "1d" = 2.0 }

[backtest]
entry_spread_threshold = 2.5
take_profit_percent = 0.8

[walk_forward]
train_window = 400
test_window = 80

[scan]
primary_symbol = "BTC"
symbols = ["ETH", "SOL"]
intervals = ["1h", "4h"]
candle_limit = 600
data_dir = "~/radar/candles"

[logging]
level = "debug"
"#
        .to_string()
    }

    #[test]
    fn test_load_valid_config() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(create_valid_config().as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.analysis.extreme_z_score, 2.5);
        assert_eq!(config.analysis.z_window, 100);
        assert_eq!(config.stationarity.rolling_window, 80);
        assert_eq!(config.stationarity.min_window, 30);
        assert_eq!(config.timeframes.weight_for("1d"), 2.0);
        assert_eq!(config.backtest.take_profit_percent, 0.8);
        assert_eq!(config.backtest.stop_loss_percent, 0.5);
        assert_eq!(config.walk_forward.train_window, 400);
        assert_eq!(config.scan.symbols, vec!["ETH".to_string(), "SOL".to_string()]);
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(AnalysisConfig::from(&config), AnalysisConfig::default());
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/radar.toml");
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let result = parse_config("[analysis\nz_window = 1");
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let result = parse_config("[analysis]\nspread_weight = 0.9\nmethod_weight = 0.4\n");
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidParameter(ParamError::InvalidWeights(_, _))
        ));
    }

    #[test]
    fn test_invalid_interval_rejected() {
        let result = parse_config("[scan]\nintervals = [\"1h\", \"tick\"]\n");
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_primary_in_symbols_rejected() {
        let result = parse_config("[scan]\nprimary_symbol = \"ETH\"\nsymbols = [\"ETH\", \"SOL\"]\n");
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_config_to_analysis_config() {
        let config = parse_config(&create_valid_config()).unwrap();
        let analysis = AnalysisConfig::from(&config);

        assert_eq!(analysis.extreme_z_score, 2.5);
        assert_eq!(analysis.high_z_score, 1.2);
        assert_eq!(analysis.stationarity.rolling_window, 80);
        assert_eq!(analysis.stationarity.max_half_life_bars, 60.0);
        assert_eq!(analysis.volatility, VolatilityConfig::default());
    }

    #[test]
    fn test_tilde_expansion() {
        let config = parse_config(&create_valid_config()).unwrap();
        if std::env::var("RADAR_DATA_DIR").is_err() {
            let dir = config.scan.resolved_data_dir();
            assert!(!dir.to_string_lossy().starts_with('~'));
            assert!(dir.ends_with("radar/candles"));
        }
    }
}
