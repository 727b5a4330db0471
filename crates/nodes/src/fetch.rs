//! Data-fetch nodes.
//!
//! Fetch nodes pull records from the data collaborator and apply the
//! request filters locally. They never mutate stored data, and an empty
//! result set is a successful (empty) output, not a failure.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::collab::{InvoiceQuery, InvoiceSource};
use crate::error::NodeError;
use crate::payload::{InvoiceCategory, InvoiceRecord, Payload, PaymentState};
use crate::traits::{parse_params, ExecutionContext, NodeCategory, NodeInput, ProcessingNode};

/// Which date column a date-window filter applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    #[default]
    InvoiceDate,
    DueDate,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FetchParams {
    pub category: Option<InvoiceCategory>,
    pub company_id: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub date_field: DateField,
    pub status: Vec<PaymentState>,
    pub entity_ids: Vec<String>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
}

/// Fetches invoices for a company scope and category, filtered by date
/// window, payment status, entity and amount.
pub struct InvoiceFetchNode {
    source: Arc<dyn InvoiceSource>,
}

impl InvoiceFetchNode {
    pub fn new(source: Arc<dyn InvoiceSource>) -> Self {
        Self { source }
    }

    fn keep(record: &InvoiceRecord, p: &FetchParams) -> bool {
        // Date window on the selected field. Records without that date pass
        // through, matching how register reports treat undated documents.
        let date = match p.date_field {
            DateField::InvoiceDate => Some(record.invoice_date),
            DateField::DueDate => record.due_date,
        };
        if let Some(date) = date {
            if p.date_from.is_some_and(|from| date < from) {
                return false;
            }
            if p.date_to.is_some_and(|to| date > to) {
                return false;
            }
        }

        if !p.status.is_empty() {
            match record.payment_state {
                Some(state) if p.status.contains(&state) => {}
                _ => return false,
            }
        }

        if !p.entity_ids.is_empty() {
            match &record.entity_id {
                Some(id) if p.entity_ids.contains(id) => {}
                _ => return false,
            }
        }

        if p.amount_min.is_some_and(|min| record.total < min) {
            return false;
        }
        if p.amount_max.is_some_and(|max| record.total > max) {
            return false;
        }

        true
    }
}

#[async_trait]
impl ProcessingNode for InvoiceFetchNode {
    fn category(&self) -> NodeCategory {
        NodeCategory::Fetch
    }

    async fn execute(
        &self,
        _input: NodeInput,
        params: &Value,
        _ctx: &ExecutionContext,
    ) -> Result<Payload, NodeError> {
        let p: FetchParams = parse_params(params)?;

        let query = InvoiceQuery {
            company_id: p.company_id.clone(),
            category: p.category,
        };
        let mut records = self.source.fetch(&query).await?;
        records.retain(|r| Self::keep(r, &p));

        // Stable output order so repeated executions are reproducible.
        records.sort_by(|a, b| a.id.cmp(&b.id));

        debug!(count = records.len(), "fetched invoices");
        Ok(Payload::Records(records))
    }
}
