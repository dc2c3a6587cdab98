//! History store port
//!
//! Append-only log of scan snapshots. The application layer is the only
//! writer; the reversion model reads a snapshot of it per build.

use async_trait::async_trait;
use thiserror::Error;

use crate::strategy::reversion_model::HistoricalRecord;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Records for `primary_pair` on `interval`, ascending by timestamp
    async fn load(&self, primary_pair: &str, interval: &str) -> Result<Vec<HistoricalRecord>, HistoryError>;

    async fn append(&self, record: &HistoricalRecord) -> Result<(), HistoryError>;
}
