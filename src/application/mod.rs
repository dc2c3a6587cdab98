//! Application Layer - use cases wiring ports to the analysis core

pub mod scanner;

pub use scanner::{PairScanner, ScanError, ScanFailure, ScanReport, ScanSettings};
