//! Typed payloads threaded between nodes.
//!
//! Node outputs are a closed enum rather than raw JSON; monetary amounts
//! stay [`Decimal`] across every node boundary.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use calc::Currency;

/// What kind of document a record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceCategory {
    /// Customer invoices (accounts receivable).
    Sales,
    /// Vendor invoices (accounts payable).
    Purchase,
}

impl std::fmt::Display for InvoiceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sales => f.write_str("sales"),
            Self::Purchase => f.write_str("purchase"),
        }
    }
}

/// Settlement state derived from paid vs. total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Paid,
    PartiallyPaid,
    Unpaid,
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paid => f.write_str("paid"),
            Self::PartiallyPaid => f.write_str("partially_paid"),
            Self::Unpaid => f.write_str("unpaid"),
        }
    }
}

/// A single invoice as it flows through a workflow.
///
/// The first block mirrors what the data collaborator returns; the trailing
/// optional fields are written by calculation nodes downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: String,
    pub invoice_number: String,
    pub category: InvoiceCategory,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub entity_id: Option<String>,
    /// Vendor or customer name, depending on category.
    #[serde(default)]
    pub entity_name: Option<String>,
    pub invoice_date: NaiveDate,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub currency: Currency,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub paid: Decimal,
    pub outstanding: Decimal,

    // Enrichment written by calculation nodes.
    #[serde(default)]
    pub aging_days: Option<i64>,
    #[serde(default)]
    pub overdue_days: Option<i64>,
    #[serde(default)]
    pub aging_bucket: Option<String>,
    #[serde(default)]
    pub payment_state: Option<PaymentState>,
}

/// A group of records with Decimal subtotals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordGroup {
    pub key: String,
    pub count: usize,
    pub total_amount: Decimal,
    pub total_outstanding: Decimal,
    pub records: Vec<InvoiceRecord>,
}

/// Summary statistics over a record set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub count: usize,
    pub total_amount: Decimal,
    pub total_tax: Decimal,
    pub total_paid: Decimal,
    pub total_outstanding: Decimal,
    pub average_amount: Decimal,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    /// Present when the input was pre-grouped.
    #[serde(default)]
    pub group_count: Option<usize>,
}

/// A single named figure, e.g. a DSO value.
///
/// `value` is `None` when the figure is undefined for the period (DSO with
/// zero credit sales): undefined, not infinite, and not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: Option<Decimal>,
    #[serde(default)]
    pub context: serde_json::Value,
}

/// Opaque locator returned by the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub locator: String,
}

/// The output of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Records(Vec<InvoiceRecord>),
    Groups(Vec<RecordGroup>),
    Summary(ReportSummary),
    Metric(Metric),
    Artifact(ArtifactRef),
    /// Outputs of several upstream nodes, in ascending node-id order.
    Many(Vec<Payload>),
}

impl Payload {
    /// Whether the payload carries no data worth consuming downstream.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Records(v) => v.is_empty(),
            Self::Groups(v) => v.is_empty(),
            Self::Many(v) => v.iter().all(Payload::is_empty),
            Self::Summary(_) | Self::Metric(_) | Self::Artifact(_) => false,
        }
    }

    /// Short tag for logs and locators.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Records(_) => "records",
            Self::Groups(_) => "groups",
            Self::Summary(_) => "summary",
            Self::Metric(_) => "metric",
            Self::Artifact(_) => "artifact",
            Self::Many(_) => "many",
        }
    }

    /// Collect every invoice record reachable in this payload, including
    /// records nested inside groups and merged upstream lists.
    pub fn collect_records(&self, out: &mut Vec<InvoiceRecord>) {
        match self {
            Self::Records(v) => out.extend(v.iter().cloned()),
            Self::Groups(groups) => {
                for g in groups {
                    out.extend(g.records.iter().cloned());
                }
            }
            Self::Many(inner) => {
                for p in inner {
                    p.collect_records(out);
                }
            }
            Self::Summary(_) | Self::Metric(_) | Self::Artifact(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(id: &str) -> InvoiceRecord {
        InvoiceRecord {
            id: id.into(),
            invoice_number: format!("INV-{id}"),
            category: InvoiceCategory::Sales,
            company_id: None,
            entity_id: None,
            entity_name: None,
            invoice_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            due_date: None,
            currency: Currency::new("INR"),
            subtotal: dec!(100),
            tax: dec!(18),
            total: dec!(118),
            paid: dec!(0),
            outstanding: dec!(118),
            aging_days: None,
            overdue_days: None,
            aging_bucket: None,
            payment_state: None,
        }
    }

    #[test]
    fn emptiness() {
        assert!(Payload::Records(vec![]).is_empty());
        assert!(Payload::Many(vec![Payload::Records(vec![])]).is_empty());
        assert!(!Payload::Records(vec![record("1")]).is_empty());
        assert!(!Payload::Metric(Metric {
            name: "dso".into(),
            value: None,
            context: serde_json::Value::Null,
        })
        .is_empty());
    }

    #[test]
    fn collect_records_reaches_nested_groups() {
        let payload = Payload::Many(vec![
            Payload::Records(vec![record("1")]),
            Payload::Groups(vec![RecordGroup {
                key: "0-30".into(),
                count: 1,
                total_amount: dec!(118),
                total_outstanding: dec!(118),
                records: vec![record("2")],
            }]),
        ]);
        let mut out = Vec::new();
        payload.collect_records(&mut out);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn payload_round_trips_through_json_without_losing_precision() {
        let mut rec = record("1");
        rec.total = dec!(0.1);
        rec.paid = dec!(0.2);
        let json = serde_json::to_string(&Payload::Records(vec![rec.clone()])).unwrap();
        let back: Payload = serde_json::from_str(&json).unwrap();
        match back {
            Payload::Records(v) => {
                // 0.1 + 0.2 stays exact in Decimal; floats would drift here.
                assert_eq!(v[0].total + v[0].paid, dec!(0.3));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }
}
