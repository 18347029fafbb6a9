//! Finished-session records handed to the history collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// One finished session.
///
/// The screenshot travels with the record but is stored by the recorder
/// itself, never inlined in the serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub question: String,
    pub answer: String,
    pub lecture: String,
    pub explanation: String,
    pub model_id: String,
    pub turbo: bool,
    pub solve_failed: bool,
    pub screenshot_mime: String,
    #[serde(skip)]
    pub screenshot: Vec<u8>,
}

pub trait HistoryRecorder: Send + Sync {
    /// Persists `record`.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the pipeline logs and otherwise ignores
    /// failures.
    fn record(&self, record: &HistoryRecord) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHistory;

impl HistoryRecorder for NoopHistory {
    fn record(&self, _record: &HistoryRecord) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Keeps records in memory; used by tests and headless runs.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<HistoryRecord>>,
}

impl MemoryHistory {
    pub fn records(&self) -> Vec<HistoryRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl HistoryRecorder for MemoryHistory {
    fn record(&self, record: &HistoryRecord) -> anyhow::Result<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
