//! Postgres-backed implementations of the collaborator traits.
//!
//! `PgInvoiceSource` sits behind fetch nodes; `PgExecutionStore` receives
//! the orchestrator's best-effort persistence calls. Database faults map
//! into the collaborator error types and never panic.

use async_trait::async_trait;
use tracing::debug;

use engine::{ExecutionLog, ExecutionRecord, ExecutionStore, StoreError};
use nodes::collab::{InvoiceQuery, InvoiceSource, ProviderError};
use nodes::InvoiceRecord;

use crate::repository::{executions, invoices};
use crate::DbPool;

/// Data collaborator backed by the `invoices` table.
#[derive(Clone)]
pub struct PgInvoiceSource {
    pool: DbPool,
}

impl PgInvoiceSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvoiceSource for PgInvoiceSource {
    async fn fetch(&self, query: &InvoiceQuery) -> Result<Vec<InvoiceRecord>, ProviderError> {
        let rows = invoices::fetch_invoices(&self.pool, query)
            .await
            .map_err(|e| ProviderError(e.to_string()))?;

        debug!(count = rows.len(), "fetched invoice rows");
        rows.into_iter()
            .map(|row| row.into_record().map_err(|e| ProviderError(e.to_string())))
            .collect()
    }
}

/// Storage collaborator backed by the `workflow_executions` table.
#[derive(Clone)]
pub struct PgExecutionStore {
    pool: DbPool,
}

impl PgExecutionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionStore for PgExecutionStore {
    async fn record_started(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        executions::insert_execution(&self.pool, record)
            .await
            .map_err(|e| StoreError(e.to_string()))
    }

    async fn record_finished(
        &self,
        record: &ExecutionRecord,
        log: &ExecutionLog,
    ) -> Result<(), StoreError> {
        executions::finalize_execution(&self.pool, record, log)
            .await
            .map_err(|e| StoreError(e.to_string()))
    }
}
