//! Storage-collaborator boundary.
//!
//! Persistence is best-effort: the orchestrator logs a warning on a store
//! error and carries on with the in-memory result.

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use crate::log::ExecutionLog;
use crate::models::ExecutionRecord;

/// Failure reported by the storage collaborator.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

/// Persists execution records at start and at the terminal transition.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Called once when the execution enters `executing`.
    async fn record_started(&self, record: &ExecutionRecord) -> Result<(), StoreError>;

    /// Called once when the execution reaches a terminal status.
    async fn record_finished(
        &self,
        record: &ExecutionRecord,
        log: &ExecutionLog,
    ) -> Result<(), StoreError>;
}

/// Store that drops everything. For callers that only want the in-memory
/// result.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStore;

#[async_trait]
impl ExecutionStore for NoopStore {
    async fn record_started(&self, _record: &ExecutionRecord) -> Result<(), StoreError> {
        Ok(())
    }

    async fn record_finished(
        &self,
        _record: &ExecutionRecord,
        _log: &ExecutionLog,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}

/// In-memory store used by tests and local CLI runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    started: Mutex<Vec<ExecutionRecord>>,
    finished: Mutex<Vec<(ExecutionRecord, ExecutionLog)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started_count(&self) -> usize {
        self.started.lock().expect("store lock poisoned").len()
    }

    pub fn finished_records(&self) -> Vec<ExecutionRecord> {
        self.finished
            .lock()
            .expect("store lock poisoned")
            .iter()
            .map(|(record, _)| record.clone())
            .collect()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryStore {
    async fn record_started(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        self.started
            .lock()
            .map_err(|_| StoreError("store lock poisoned".into()))?
            .push(record.clone());
        Ok(())
    }

    async fn record_finished(
        &self,
        record: &ExecutionRecord,
        log: &ExecutionLog,
    ) -> Result<(), StoreError> {
        self.finished
            .lock()
            .map_err(|_| StoreError("store lock poisoned".into()))?
            .push((record.clone(), log.clone()));
        Ok(())
    }
}
