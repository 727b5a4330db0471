//! Predicate and ordering nodes.
//!
//! Both nodes are deterministic: filtering preserves input order, sorting
//! is stable with a final ascending-id tie-break, so repeated executions
//! over identical input are byte-for-byte reproducible.

use std::cmp::Ordering;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::error::NodeError;
use crate::payload::{InvoiceRecord, Payload};
use crate::traits::{parse_params, ExecutionContext, NodeCategory, NodeInput, ProcessingNode};

/// A record field projected for comparison.
#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    Number(Decimal),
    Date(NaiveDate),
    Text(String),
}

impl FieldValue {
    fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Project a named field out of a record.
///
/// `Ok(None)` means the field exists but is unset on this record; an
/// unknown field name is a hard error so typos fail loudly.
fn field_value(record: &InvoiceRecord, field: &str) -> Result<Option<FieldValue>, NodeError> {
    let value = match field {
        "id" => Some(FieldValue::Text(record.id.clone())),
        "invoice_number" => Some(FieldValue::Text(record.invoice_number.clone())),
        "category" => Some(FieldValue::Text(record.category.to_string())),
        "company_id" => record.company_id.clone().map(FieldValue::Text),
        "entity_id" => record.entity_id.clone().map(FieldValue::Text),
        "entity_name" => record.entity_name.clone().map(FieldValue::Text),
        "invoice_date" => Some(FieldValue::Date(record.invoice_date)),
        "due_date" => record.due_date.map(FieldValue::Date),
        "currency" => Some(FieldValue::Text(record.currency.to_string())),
        "subtotal" => Some(FieldValue::Number(record.subtotal)),
        "tax" => Some(FieldValue::Number(record.tax)),
        "total" => Some(FieldValue::Number(record.total)),
        "paid" => Some(FieldValue::Number(record.paid)),
        "outstanding" => Some(FieldValue::Number(record.outstanding)),
        "aging_days" => record.aging_days.map(|d| FieldValue::Number(Decimal::from(d))),
        "overdue_days" => record
            .overdue_days
            .map(|d| FieldValue::Number(Decimal::from(d))),
        "aging_bucket" => record.aging_bucket.clone().map(FieldValue::Text),
        "payment_state" => record.payment_state.map(|s| FieldValue::Text(s.to_string())),
        other => {
            return Err(NodeError::MalformedInput(format!(
                "unknown record field '{other}'"
            )))
        }
    };
    Ok(value)
}

/// Project a field as a display string, for grouping keys.
pub(crate) fn record_field_as_string(
    record: &InvoiceRecord,
    field: &str,
) -> Result<Option<String>, NodeError> {
    Ok(field_value(record, field)?.map(|v| match v {
        FieldValue::Text(s) => s,
        FieldValue::Date(d) => d.to_string(),
        FieldValue::Number(n) => n.to_string(),
    }))
}

/// Parse a JSON condition value into a comparable field value. Numbers go
/// through their exact decimal representation, never through `f64`.
fn json_to_field(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok().map(FieldValue::Number),
        Value::String(s) => {
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return Some(FieldValue::Date(date));
            }
            if let Ok(number) = Decimal::from_str(s) {
                return Some(FieldValue::Number(number));
            }
            Some(FieldValue::Text(s.clone()))
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// FilterNode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Op {
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "in")]
    In,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    pub field: String,
    #[serde(rename = "operator")]
    pub op: Op,
    pub value: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub conditions: Vec<Condition>,
}

/// Keeps records matching every condition. A record with an unset field, or
/// a value that cannot be compared, does not match.
pub struct FilterNode;

impl FilterNode {
    fn matches(record: &InvoiceRecord, conditions: &[Condition]) -> Result<bool, NodeError> {
        for condition in conditions {
            let Some(actual) = field_value(record, &condition.field)? else {
                return Ok(false);
            };

            let satisfied = match condition.op {
                Op::In => match &condition.value {
                    Value::Array(candidates) => candidates
                        .iter()
                        .filter_map(json_to_field)
                        .any(|v| v == actual),
                    _ => {
                        return Err(NodeError::MalformedInput(
                            "'in' condition value must be an array".into(),
                        ))
                    }
                },
                op => {
                    let Some(expected) = json_to_field(&condition.value) else {
                        return Err(NodeError::MalformedInput(format!(
                            "condition value for '{}' is not comparable",
                            condition.field
                        )));
                    };
                    match actual.compare(&expected) {
                        Some(ordering) => match op {
                            Op::Greater => ordering == Ordering::Greater,
                            Op::GreaterOrEqual => ordering != Ordering::Less,
                            Op::Less => ordering == Ordering::Less,
                            Op::LessOrEqual => ordering != Ordering::Greater,
                            Op::Equal => ordering == Ordering::Equal,
                            Op::NotEqual => ordering != Ordering::Equal,
                            Op::In => unreachable!("handled above"),
                        },
                        None => false,
                    }
                }
            };

            if !satisfied {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl ProcessingNode for FilterNode {
    fn category(&self) -> NodeCategory {
        NodeCategory::Filter
    }

    async fn execute(
        &self,
        input: NodeInput,
        params: &Value,
        _ctx: &ExecutionContext,
    ) -> Result<Payload, NodeError> {
        let p: FilterParams = parse_params(params)?;
        let records = input.records();

        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            if Self::matches(&record, &p.conditions)? {
                kept.push(record);
            }
        }
        Ok(Payload::Records(kept))
    }
}

// ---------------------------------------------------------------------------
// SortNode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub order: Order,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SortParams {
    pub sort_by: Vec<SortKey>,
}

impl Default for SortParams {
    fn default() -> Self {
        Self {
            sort_by: vec![SortKey {
                field: "invoice_date".into(),
                order: Order::Asc,
            }],
        }
    }
}

/// Stable multi-key sort. Records with an unset key sort last regardless of
/// direction; ties always break by ascending id.
pub struct SortNode;

impl SortNode {
    fn compare(
        a: &InvoiceRecord,
        b: &InvoiceRecord,
        keys: &[SortKey],
    ) -> Result<Ordering, NodeError> {
        for key in keys {
            let va = field_value(a, &key.field)?;
            let vb = field_value(b, &key.field)?;
            let ordering = match (va, vb) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(x), Some(y)) => {
                    let base = x.compare(&y).unwrap_or(Ordering::Equal);
                    match key.order {
                        Order::Asc => base,
                        Order::Desc => base.reverse(),
                    }
                }
            };
            if ordering != Ordering::Equal {
                return Ok(ordering);
            }
        }
        Ok(a.id.cmp(&b.id))
    }
}

#[async_trait]
impl ProcessingNode for SortNode {
    fn category(&self) -> NodeCategory {
        NodeCategory::Filter
    }

    async fn execute(
        &self,
        input: NodeInput,
        params: &Value,
        _ctx: &ExecutionContext,
    ) -> Result<Payload, NodeError> {
        let p: SortParams = parse_params(params)?;
        let mut records = input.records();

        // Validate key names once up front so sorting itself cannot fail.
        if let Some(record) = records.first() {
            for key in &p.sort_by {
                field_value(record, &key.field)?;
            }
        }

        records.sort_by(|a, b| {
            Self::compare(a, b, &p.sort_by).unwrap_or(Ordering::Equal)
        });
        Ok(Payload::Records(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::InvoiceCategory;
    use calc::Currency;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn record(id: &str, total: Decimal, bucket: Option<&str>) -> InvoiceRecord {
        InvoiceRecord {
            id: id.into(),
            invoice_number: format!("INV-{id}"),
            category: InvoiceCategory::Purchase,
            company_id: None,
            entity_id: None,
            entity_name: None,
            invoice_date: d(2024, 6, 1),
            due_date: None,
            currency: Currency::new("INR"),
            subtotal: total,
            tax: dec!(0),
            total,
            paid: dec!(0),
            outstanding: total,
            aging_days: None,
            overdue_days: None,
            aging_bucket: bucket.map(Into::into),
            payment_state: None,
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            workflow_id: uuid::Uuid::new_v4(),
            execution_id: uuid::Uuid::new_v4(),
        }
    }

    fn input_of(records: Vec<InvoiceRecord>) -> NodeInput {
        NodeInput::from_upstream(vec![("up".into(), Payload::Records(records))])
    }

    #[tokio::test]
    async fn filters_on_amount_threshold() {
        let records = vec![
            record("a", dec!(50), None),
            record("b", dec!(150), None),
            record("c", dec!(250), None),
        ];
        let params = serde_json::json!({
            "conditions": [{ "field": "total", "operator": ">=", "value": 150 }]
        });
        let out = FilterNode
            .execute(input_of(records), &params, &ctx())
            .await
            .unwrap();
        match out {
            Payload::Records(v) => {
                let ids: Vec<&str> = v.iter().map(|r| r.id.as_str()).collect();
                assert_eq!(ids, vec!["b", "c"]);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn in_condition_on_bucket() {
        let records = vec![
            record("a", dec!(1), Some("0-30")),
            record("b", dec!(1), Some("90+")),
            record("c", dec!(1), None),
        ];
        let params = serde_json::json!({
            "conditions": [{ "field": "aging_bucket", "operator": "in", "value": ["90+", "60-90"] }]
        });
        let out = FilterNode
            .execute(input_of(records), &params, &ctx())
            .await
            .unwrap();
        match out {
            Payload::Records(v) => {
                assert_eq!(v.len(), 1);
                assert_eq!(v[0].id, "b");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_field_fails_loudly() {
        let records = vec![record("a", dec!(1), None)];
        let params = serde_json::json!({
            "conditions": [{ "field": "grand_totale", "operator": "==", "value": 1 }]
        });
        let err = FilterNode
            .execute(input_of(records), &params, &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::MalformedInput(_)));
    }

    #[tokio::test]
    async fn sort_is_deterministic_with_id_tie_break() {
        let records = vec![
            record("c", dec!(100), None),
            record("a", dec!(100), None),
            record("b", dec!(200), None),
        ];
        let params = serde_json::json!({
            "sort_by": [{ "field": "total", "order": "desc" }]
        });
        let out = SortNode
            .execute(input_of(records), &params, &ctx())
            .await
            .unwrap();
        match out {
            Payload::Records(v) => {
                let ids: Vec<&str> = v.iter().map(|r| r.id.as_str()).collect();
                assert_eq!(ids, vec!["b", "a", "c"]);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn records_missing_the_sort_key_go_last() {
        let records = vec![
            record("a", dec!(1), None),
            record("b", dec!(1), Some("0-30")),
        ];
        let params = serde_json::json!({
            "sort_by": [{ "field": "aging_bucket", "order": "asc" }]
        });
        let out = SortNode
            .execute(input_of(records), &params, &ctx())
            .await
            .unwrap();
        match out {
            Payload::Records(v) => {
                let ids: Vec<&str> = v.iter().map(|r| r.id.as_str()).collect();
                assert_eq!(ids, vec!["b", "a"]);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }
}
