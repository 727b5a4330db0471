//! Aggregation nodes: group-by with subtotals and summary statistics.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use calc::money::round_money;

use crate::error::NodeError;
use crate::filter::record_field_as_string;
use crate::payload::{Payload, RecordGroup, ReportSummary};
use crate::traits::{parse_params, ExecutionContext, NodeCategory, NodeInput, ProcessingNode};

// ---------------------------------------------------------------------------
// GroupByNode
// ---------------------------------------------------------------------------

fn default_group_field() -> String {
    "aging_bucket".into()
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GroupByParams {
    pub group_by: String,
}

impl Default for GroupByParams {
    fn default() -> Self {
        Self {
            group_by: default_group_field(),
        }
    }
}

/// Groups records by a field with Decimal subtotals per group.
///
/// Groups are ordered by the numeric prefix of the key when present, so
/// aging buckets come out in boundary order (`0-30` before `90+`) for any
/// boundary configuration, then by name. Records keep input order inside
/// each group.
pub struct GroupByNode;

/// Sort key: numeric prefix first (keys without one, like `unknown`, go
/// last), then the label.
fn group_order_key(label: &str) -> (bool, Option<i64>, String) {
    let digits: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
    let prefix: Option<i64> = digits.parse().ok();
    (prefix.is_none(), prefix, label.to_owned())
}

#[async_trait]
impl ProcessingNode for GroupByNode {
    fn category(&self) -> NodeCategory {
        NodeCategory::Aggregation
    }

    async fn execute(
        &self,
        input: NodeInput,
        params: &Value,
        _ctx: &ExecutionContext,
    ) -> Result<Payload, NodeError> {
        let p: GroupByParams = parse_params(params)?;
        let records = input.records();

        let mut groups: Vec<RecordGroup> = Vec::new();
        for record in records {
            let key = record_field_as_string(&record, &p.group_by)?
                .unwrap_or_else(|| "unknown".into());

            let index = groups.iter().position(|g| g.key == key).unwrap_or_else(|| {
                groups.push(RecordGroup {
                    key,
                    count: 0,
                    total_amount: Decimal::ZERO,
                    total_outstanding: Decimal::ZERO,
                    records: Vec::new(),
                });
                groups.len() - 1
            });
            let group = &mut groups[index];
            group.count += 1;
            group.total_amount += record.total;
            group.total_outstanding += record.outstanding;
            group.records.push(record);
        }

        groups.sort_by_key(|g| group_order_key(&g.key));
        Ok(Payload::Groups(groups))
    }
}

// ---------------------------------------------------------------------------
// SummaryNode
// ---------------------------------------------------------------------------

/// Summary statistics over records, or over a grouped payload (in which
/// case the group count is reported as well).
pub struct SummaryNode;

#[async_trait]
impl ProcessingNode for SummaryNode {
    fn category(&self) -> NodeCategory {
        NodeCategory::Aggregation
    }

    async fn execute(
        &self,
        input: NodeInput,
        _params: &Value,
        _ctx: &ExecutionContext,
    ) -> Result<Payload, NodeError> {
        let records = input.records();

        let mut group_count = 0usize;
        for (_, payload) in input.iter() {
            if let Payload::Groups(groups) = payload {
                group_count += groups.len();
            }
        }

        let count = records.len();
        let total_amount: Decimal = records.iter().map(|r| r.total).sum();
        let total_tax: Decimal = records.iter().map(|r| r.tax).sum();
        let total_paid: Decimal = records.iter().map(|r| r.paid).sum();
        let total_outstanding: Decimal = records.iter().map(|r| r.outstanding).sum();
        let average_amount = if count > 0 {
            round_money(total_amount / Decimal::from(count as u64))
        } else {
            Decimal::ZERO
        };

        Ok(Payload::Summary(ReportSummary {
            count,
            total_amount,
            total_tax,
            total_paid,
            total_outstanding,
            average_amount,
            min_amount: records.iter().map(|r| r.total).min(),
            max_amount: records.iter().map(|r| r.total).max(),
            group_count: (group_count > 0).then_some(group_count),
        }))
    }
}
