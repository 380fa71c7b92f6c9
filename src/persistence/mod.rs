//! Persistence module
//!
//! Append-only CSV history of produced signals plus a pluggable object
//! store for latest-value payloads. Both are side channels: the ingest
//! cycle works entirely in memory and treats persistence failures as
//! warnings, not errors.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock as AsyncRwLock;
use tracing::info;

use crate::types::ConsensusResult;

/// Signal record for CSV storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalHistoryRecord {
    /// Blend timestamp in epoch milliseconds
    pub timestamp: i64,
    pub feed_id: String,
    pub value: f64,
    pub live_weight: f64,
    pub mock_weight: f64,
    /// Whether any live sample contributed this cycle
    pub live_present: bool,
}

/// Daily CSV files of every signal the core produced
pub struct SignalHistory {
    data_dir: PathBuf,
    writer: Arc<AsyncRwLock<csv::Writer<std::fs::File>>>,
}

impl SignalHistory {
    pub fn new(data_dir: &str) -> Result<Self> {
        let data_dir = PathBuf::from(data_dir);

        fs::create_dir_all(data_dir.join("signals")).context("Failed to create data directory")?;

        let today = Utc::now().format("%Y-%m-%d");
        let writer = Self::create_writer(
            &data_dir.join("signals"),
            &format!("signals_{}.csv", today),
        )?;

        info!(dir = %data_dir.display(), "signal history ready");
        Ok(SignalHistory {
            data_dir,
            writer: Arc::new(AsyncRwLock::new(writer)),
        })
    }

    fn create_writer(dir: &Path, filename: &str) -> Result<csv::Writer<std::fs::File>> {
        let path = dir.join(filename);
        let file_has_data =
            path.exists() && fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .append(true)
            .open(&path)
            .context("Failed to open CSV file")?;

        let writer = WriterBuilder::new()
            .has_headers(!file_has_data)
            .from_writer(file);

        Ok(writer)
    }

    /// Append one produced signal
    pub async fn save_signal(&self, result: &ConsensusResult, live_present: bool) -> Result<()> {
        let record = SignalHistoryRecord {
            timestamp: result.computed_at.timestamp_millis(),
            feed_id: result.feed_id.clone(),
            value: result.value,
            live_weight: result.live_weight,
            mock_weight: result.mock_weight,
            live_present,
        };
        let mut writer = self.writer.write().await;
        writer
            .serialize(&record)
            .context("Failed to write signal record")?;
        writer.flush().context("Failed to flush signal writer")?;
        Ok(())
    }

    /// Read back today's records, oldest first
    pub fn load_today(&self) -> Result<Vec<SignalHistoryRecord>> {
        let today = Utc::now().format("%Y-%m-%d");
        let path = self
            .data_dir
            .join("signals")
            .join(format!("signals_{}.csv", today));
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut records = Vec::new();
        for row in reader.deserialize() {
            let record: SignalHistoryRecord = row.context("Failed to parse signal record")?;
            records.push(record);
        }
        Ok(records)
    }
}

/// Address of one object inside a store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorePointer {
    pub bucket: String,
    pub key: String,
}

impl StorePointer {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        StorePointer {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for StorePointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Latest-value payload storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, pointer: &StorePointer, payload: Vec<u8>) -> Result<()>;
    async fn get(&self, pointer: &StorePointer) -> Result<Option<Vec<u8>>>;
}

/// Process-local object store
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: AsyncRwLock<HashMap<StorePointer, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        MemoryObjectStore::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, pointer: &StorePointer, payload: Vec<u8>) -> Result<()> {
        self.objects.write().await.insert(pointer.clone(), payload);
        Ok(())
    }

    async fn get(&self, pointer: &StorePointer) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.read().await.get(pointer).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn temp_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("oracle_core_test_{}", name));
        fs::remove_dir_all(&dir).ok();
        dir
    }

    fn make_result(feed_id: &str, value: f64) -> ConsensusResult {
        ConsensusResult {
            feed_id: feed_id.to_string(),
            value,
            live_weight: 0.7,
            mock_weight: 0.3,
            computed_at: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        }
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let dir = temp_data_dir("roundtrip");
        let history = SignalHistory::new(dir.to_str().unwrap()).unwrap();

        history
            .save_signal(&make_result("price/btc_usd", 64_700.0), true)
            .await
            .unwrap();
        history
            .save_signal(&make_result("price/eth_usd", 3_300.0), false)
            .await
            .unwrap();

        let records = history.load_today().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].feed_id, "price/btc_usd");
        assert_eq!(records[0].value, 64_700.0);
        assert!(records[0].live_present);
        assert!(!records[1].live_present);

        fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn reopening_appends_without_duplicate_headers() {
        let dir = temp_data_dir("reopen");
        {
            let history = SignalHistory::new(dir.to_str().unwrap()).unwrap();
            history
                .save_signal(&make_result("price/btc_usd", 1.0), true)
                .await
                .unwrap();
        }
        let history = SignalHistory::new(dir.to_str().unwrap()).unwrap();
        history
            .save_signal(&make_result("price/btc_usd", 2.0), true)
            .await
            .unwrap();

        let records = history.load_today().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].value, 1.0);
        assert_eq!(records[1].value, 2.0);

        fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn memory_store_put_then_get() {
        let store = MemoryObjectStore::new();
        let pointer = StorePointer::new("signals", "price/btc_usd/latest");

        assert!(store.get(&pointer).await.unwrap().is_none());
        store.put(&pointer, b"payload".to_vec()).await.unwrap();
        assert_eq!(
            store.get(&pointer).await.unwrap(),
            Some(b"payload".to_vec())
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn memory_store_overwrites_same_pointer() {
        let store = MemoryObjectStore::new();
        let pointer = StorePointer::new("signals", "price/eth_usd/latest");

        store.put(&pointer, b"old".to_vec()).await.unwrap();
        store.put(&pointer, b"new".to_vec()).await.unwrap();

        assert_eq!(store.get(&pointer).await.unwrap(), Some(b"new".to_vec()));
        assert_eq!(store.len().await, 1);
    }
}
