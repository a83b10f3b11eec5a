use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::errors::WebGenResult;

/// Outcome of one command attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub command: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

impl MetricRecord {
    pub fn now(command: &str, success: bool) -> Self {
        Self {
            command: command.to_string(),
            timestamp: Utc::now(),
            success,
        }
    }
}

/// Append-only destination for metric records. The core never reads back.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn append(&self, record: MetricRecord) -> WebGenResult<()>;
}

/// One JSON record per line, never pruned.
pub struct JsonlMetricsLog {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlMetricsLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MetricsSink for JsonlMetricsLog {
    async fn append(&self, record: MetricRecord) -> WebGenResult<()> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        tracing::debug!(path = %self.path.display(), success = record.success, "metric appended");
        Ok(())
    }
}

/// Keeps records in memory; for offline runs and tests.
#[derive(Default)]
pub struct MemoryMetrics {
    records: Mutex<Vec<MetricRecord>>,
}

impl MemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<MetricRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl MetricsSink for MemoryMetrics {
    async fn append(&self, record: MetricRecord) -> WebGenResult<()> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn jsonl_log_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlMetricsLog::new(dir.path().join("nested").join("metrics.jsonl"));

        log.append(MetricRecord::now("Search for shoes", true)).await.unwrap();
        log.append(MetricRecord::now("Scroll down", false)).await.unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let records: Vec<MetricRecord> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].command, "Search for shoes");
        assert!(records[0].success);
        assert!(!records[1].success);
        assert!(records[0].timestamp <= records[1].timestamp);
    }

    #[tokio::test]
    async fn memory_metrics_keep_order() {
        let metrics = MemoryMetrics::new();
        metrics.append(MetricRecord::now("a", true)).await.unwrap();
        metrics.append(MetricRecord::now("b", false)).await.unwrap();
        let commands: Vec<_> = metrics.records().into_iter().map(|r| r.command).collect();
        assert_eq!(commands, ["a", "b"]);
    }
}
