//! Best-effort, detached search-history recording
//!
//! Records are handed off through a bounded channel to a task that outlives
//! the request, so an early client disconnect cannot lose an already
//! enqueued record and a slow sink cannot back-pressure a search. The
//! writer's errors are contained here and never reach the caller.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// One recorded search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub tenant_id: String,
    pub job_id: Uuid,
    pub query_text: String,
    pub recorded_at: DateTime<Utc>,
}

/// Destination for history records
pub trait HistorySink: Send + Sync {
    fn record(&self, record: HistoryRecord) -> Result<(), String>;
}

/// In-memory ring sink, the default for embedded deployments and tests
#[derive(Default)]
pub struct MemoryHistorySink {
    records: Mutex<Vec<HistoryRecord>>,
    capacity: usize,
}

impl MemoryHistorySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            capacity,
        }
    }

    pub fn snapshot(&self) -> Vec<HistoryRecord> {
        self.records.lock().clone()
    }
}

impl HistorySink for MemoryHistorySink {
    fn record(&self, record: HistoryRecord) -> Result<(), String> {
        let mut records = self.records.lock();
        if self.capacity > 0 && records.len() >= self.capacity {
            records.remove(0);
        }
        records.push(record);
        Ok(())
    }
}

/// Fire-and-forget producer side of the history pipeline
#[derive(Clone)]
pub struct SearchHistoryRecorder {
    tx: mpsc::Sender<HistoryRecord>,
}

impl SearchHistoryRecorder {
    /// Spawn the detached drain task and return the producer handle.
    /// Must be called within a tokio runtime.
    pub fn new(sink: Arc<dyn HistorySink>, queue_depth: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<HistoryRecord>(queue_depth.max(1));

        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(err) = sink.record(record) {
                    tracing::warn!(error = %err, "search history write failed");
                }
            }
        });

        Self { tx }
    }

    /// Enqueue a record. A full queue drops the record silently.
    pub fn record(&self, record: HistoryRecord) {
        if self.tx.try_send(record).is_err() {
            tracing::debug!("history queue full, dropping record");
        }
    }
}
