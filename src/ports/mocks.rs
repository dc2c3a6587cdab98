//! In-memory port implementations that record calls and serve canned data

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::history::{HistoryError, HistoryStore};
use super::market_data::{MarketDataError, PriceSource};
use crate::domain::Ohlcv;
use crate::strategy::reversion_model::HistoricalRecord;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock price source keyed by (symbol, interval)
#[derive(Debug, Default, Clone)]
pub struct MockPriceSource {
    calls: Arc<Mutex<Vec<(String, String)>>>,
    candles: Arc<Mutex<HashMap<(String, String), Vec<Ohlcv>>>>,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the candles served for a symbol/interval
    pub fn with_candles(self, symbol: &str, interval: &str, candles: Vec<Ohlcv>) -> Self {
        lock(&self.candles).insert((symbol.to_string(), interval.to_string()), candles);
        self
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<(String, String)> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn fetch_candles(&self, symbol: &str, interval: &str, limit: usize)
        -> Result<Vec<Ohlcv>, MarketDataError> {
        lock(&self.calls).push((symbol.to_string(), interval.to_string()));
        let candles = lock(&self.candles)
            .get(&(symbol.to_string(), interval.to_string()))
            .cloned()
            .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.to_string()))?;
        let skip = candles.len().saturating_sub(limit);
        Ok(candles.into_iter().skip(skip).collect())
    }

    fn native_intervals(&self) -> Vec<String> {
        let mut intervals: Vec<String> = lock(&self.candles).keys().map(|(_, i)| i.clone()).collect();
        intervals.sort();
        intervals.dedup();
        intervals
    }
}

/// History store backed by a shared vector
#[derive(Debug, Default, Clone)]
pub struct InMemoryHistoryStore {
    records: Arc<Mutex<Vec<HistoricalRecord>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<HistoricalRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn load(&self, primary_pair: &str, interval: &str) -> Result<Vec<HistoricalRecord>, HistoryError> {
        let mut records: Vec<HistoricalRecord> = lock(&self.records)
            .iter()
            .filter(|r| r.primary_pair == primary_pair && r.interval == interval)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }

    async fn append(&self, record: &HistoricalRecord) -> Result<(), HistoryError> {
        lock(&self.records).push(record.clone());
        Ok(())
    }
}
