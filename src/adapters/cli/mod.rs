//! CLI Adapter
//!
//! Command-line interface for the radar scanner.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{
    AnalyzeCmd, BacktestCmd, CliApp, Command, ConfigCheckCmd, DataArgs, OptimizeCmd, ScanCmd,
};
