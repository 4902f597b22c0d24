//! Persistent audit sink
//!
//! Write-only from the coordinator's point of view: rows are created once and
//! updated on every status change, never read back while a run is in flight.

use super::record::{ExecutionId, ExecutionRecord};
use agentpod_foundation::{AuditStorage, Result};
use parking_lot::Mutex;
use std::collections::HashMap;

pub trait AuditSink: Send + Sync {
    fn record_created(&self, record: &ExecutionRecord) -> Result<()>;

    fn record_updated(&self, record: &ExecutionRecord) -> Result<()>;

    fn record_deleted(&self, id: &ExecutionId) -> Result<()>;
}

impl AuditSink for AuditStorage {
    fn record_created(&self, record: &ExecutionRecord) -> Result<()> {
        self.create_execution(&record.to_row()?)
    }

    fn record_updated(&self, record: &ExecutionRecord) -> Result<()> {
        self.update_execution(&record.to_row()?)
    }

    fn record_deleted(&self, id: &ExecutionId) -> Result<()> {
        self.delete_execution(&id.to_string()).map(|_| ())
    }
}

/// Keeps the latest copy of every record (tests, and runs without a database)
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<HashMap<ExecutionId, ExecutionRecord>>,
    writes: Mutex<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ExecutionId) -> Option<ExecutionRecord> {
        self.records.lock().get(id).cloned()
    }

    /// Total create and update calls seen
    pub fn writes(&self) -> usize {
        *self.writes.lock()
    }

    fn store(&self, record: &ExecutionRecord) {
        self.records.lock().insert(record.id, record.clone());
        *self.writes.lock() += 1;
    }
}

impl AuditSink for MemorySink {
    fn record_created(&self, record: &ExecutionRecord) -> Result<()> {
        self.store(record);
        Ok(())
    }

    fn record_updated(&self, record: &ExecutionRecord) -> Result<()> {
        self.store(record);
        Ok(())
    }

    fn record_deleted(&self, id: &ExecutionId) -> Result<()> {
        self.records.lock().remove(id);
        Ok(())
    }
}
