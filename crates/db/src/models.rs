//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models; they carry no domain behaviour beyond
//! conversion into the domain types owned by the `nodes` and `engine`
//! crates. Monetary columns are NUMERIC and decode straight into `Decimal`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use calc::Currency;
use nodes::{InvoiceCategory, InvoiceRecord};

use crate::DbError;

// ---------------------------------------------------------------------------
// invoices
// ---------------------------------------------------------------------------

/// A persisted invoice row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub company_id: String,
    pub category: String,
    pub invoice_number: String,
    pub entity_id: Option<String>,
    pub entity_name: Option<String>,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub currency: String,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub paid: Decimal,
    pub created_at: DateTime<Utc>,
}

impl InvoiceRow {
    /// Convert into the domain record handed to fetch nodes.
    ///
    /// # Errors
    /// [`DbError::InvalidRow`] if the category column holds an unknown
    /// value.
    pub fn into_record(self) -> Result<InvoiceRecord, DbError> {
        let category = match self.category.as_str() {
            "sales" => InvoiceCategory::Sales,
            "purchase" => InvoiceCategory::Purchase,
            other => {
                return Err(DbError::InvalidRow(format!(
                    "unknown invoice category '{other}'"
                )))
            }
        };
        Ok(InvoiceRecord {
            id: self.id.to_string(),
            invoice_number: self.invoice_number,
            category,
            company_id: Some(self.company_id),
            entity_id: self.entity_id,
            entity_name: self.entity_name,
            invoice_date: self.invoice_date,
            due_date: self.due_date,
            currency: Currency::new(self.currency),
            subtotal: self.subtotal,
            tax: self.tax,
            total: self.total,
            paid: self.paid,
            outstanding: self.total - self.paid,
            aging_days: None,
            overdue_days: None,
            aging_bucket: None,
            payment_state: None,
        })
    }
}

// ---------------------------------------------------------------------------
// workflow_executions
// ---------------------------------------------------------------------------

/// A persisted workflow execution row. The full record and audit log are
/// stored as JSON documents; the scalar columns exist for querying.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExecutionRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub record: serde_json::Value,
    pub log: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row() -> InvoiceRow {
        InvoiceRow {
            id: Uuid::new_v4(),
            company_id: "acme".into(),
            category: "sales".into(),
            invoice_number: "INV-1".into(),
            entity_id: Some("cust-1".into()),
            entity_name: Some("Customer One".into()),
            invoice_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            due_date: None,
            currency: "inr".into(),
            subtotal: dec!(100),
            tax: dec!(18),
            total: dec!(118),
            paid: dec!(18),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn row_maps_to_domain_record() {
        let record = row().into_record().unwrap();
        assert_eq!(record.category, InvoiceCategory::Sales);
        assert_eq!(record.currency, Currency::new("INR"));
        assert_eq!(record.outstanding, dec!(100));
        assert!(record.aging_bucket.is_none());
    }

    #[test]
    fn unknown_category_is_an_invalid_row() {
        let mut bad = row();
        bad.category = "refund".into();
        assert!(matches!(bad.into_record(), Err(DbError::InvalidRow(_))));
    }
}
