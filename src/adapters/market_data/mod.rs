//! Market Data Adapters
//!
//! Candle sources behind the `PriceSource` port:
//! - `FileCandleSource`: JSON candle files on disk
//! - `SyntheticSource`: seeded cointegrated series for demos and tests
//! - `ResamplingSource`: wraps either one and builds non-native intervals

mod file_source;
mod resample;
mod synthetic;

pub use file_source::FileCandleSource;
pub use resample::{parse_interval, resample, ResamplingSource};
pub use synthetic::SyntheticSource;
