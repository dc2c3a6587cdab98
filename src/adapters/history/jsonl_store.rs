//! JSON-lines history store: one `HistoricalRecord` per line, append-only

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::ports::{HistoryError, HistoryStore};
use crate::strategy::reversion_model::HistoricalRecord;

#[derive(Debug)]
pub struct JsonlHistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every parseable record in the file, in file order
    pub async fn load_all(&self) -> Result<Vec<HistoricalRecord>, HistoryError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoricalRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("{}:{}: skipping corrupted history line: {}", self.path.display(), line_no + 1, e),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl HistoryStore for JsonlHistoryStore {
    async fn load(&self, primary_pair: &str, interval: &str) -> Result<Vec<HistoricalRecord>, HistoryError> {
        let mut records: Vec<HistoricalRecord> = self
            .load_all()
            .await?
            .into_iter()
            .filter(|r| r.primary_pair == primary_pair && r.interval == interval)
            .collect();
        records.sort_by_key(|r| r.timestamp);
        debug!("Loaded {} history records for {} {}", records.len(), primary_pair, interval);
        Ok(records)
    }

    async fn append(&self, record: &HistoricalRecord) -> Result<(), HistoryError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(
            "Appended {} {} snapshot ({} entries) to {}",
            record.primary_pair,
            record.interval,
            record.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}
