//! Collaborator contracts for fetch and output nodes.
//!
//! The engine core never talks to a database, rate feed or renderer
//! directly; nodes go through these traits, and deployments decide what
//! sits behind them. The in-memory implementations here back the test
//! suites and the CLI's local runs.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::payload::{InvoiceCategory, InvoiceRecord, Payload};

pub use calc::{FixedRateTable, RateSource};

/// Failure reported by an external collaborator. Treated as transient.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

/// Scope of a fetch request: which company's books, which side of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceQuery {
    pub company_id: Option<String>,
    pub category: Option<InvoiceCategory>,
}

/// The data collaborator behind fetch nodes. Must never mutate stored data;
/// an empty response is valid, not an error.
#[async_trait]
pub trait InvoiceSource: Send + Sync {
    async fn fetch(&self, query: &InvoiceQuery) -> Result<Vec<InvoiceRecord>, ProviderError>;
}

/// Branding descriptor handed to the rendering collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Branding {
    pub company_name: Option<String>,
    pub primary_color: Option<String>,
}

/// The rendering collaborator behind output nodes. Returns an opaque
/// storage locator for the generated artifact.
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, payload: &Payload, branding: &Branding)
        -> Result<String, ProviderError>;
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

/// Fixed record set serving as the data collaborator in tests and local
/// CLI runs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryInvoices {
    records: Vec<InvoiceRecord>,
}

impl InMemoryInvoices {
    pub fn new(records: Vec<InvoiceRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl InvoiceSource for InMemoryInvoices {
    async fn fetch(&self, query: &InvoiceQuery) -> Result<Vec<InvoiceRecord>, ProviderError> {
        let records = self
            .records
            .iter()
            .filter(|r| match &query.company_id {
                Some(company) => r.company_id.as_deref() == Some(company.as_str()),
                None => true,
            })
            .filter(|r| match query.category {
                Some(category) => r.category == category,
                None => true,
            })
            .cloned()
            .collect();
        Ok(records)
    }
}

/// Renderer that keeps rendered payloads in memory and hands back a
/// deterministic locator. Stands in for the spreadsheet/PDF service.
#[derive(Debug, Default)]
pub struct InMemoryRenderer {
    rendered: Mutex<Vec<(String, serde_json::Value)>>,
}

impl InMemoryRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rendered_count(&self) -> usize {
        self.rendered.lock().expect("renderer lock poisoned").len()
    }
}

#[async_trait]
impl ReportRenderer for InMemoryRenderer {
    async fn render(
        &self,
        payload: &Payload,
        branding: &Branding,
    ) -> Result<String, ProviderError> {
        let name = branding.company_name.as_deref().unwrap_or("report");
        let locator = format!("memory://reports/{}-{}.json", name, payload.kind());
        let value = serde_json::to_value(payload).map_err(|e| ProviderError(e.to_string()))?;
        self.rendered
            .lock()
            .map_err(|_| ProviderError("renderer lock poisoned".into()))?
            .push((locator.clone(), value));
        Ok(locator)
    }
}
