//! Calculation nodes.
//!
//! Thin adapters over the `calc` crate: they pull records off the upstream
//! payload, run the pure functions, and write the enrichment back onto
//! copies of the records. A calculation error fails the node with the
//! original error preserved; it never unwinds the execution.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use calc::money::round_money;
use calc::{assign_aging_bucket, compute_dso, BucketBoundaries, CalcError, Currency, RateSource};

use crate::error::NodeError;
use crate::payload::{Metric, Payload, PaymentState};
use crate::traits::{parse_params, ExecutionContext, NodeCategory, NodeInput, ProcessingNode};

// ---------------------------------------------------------------------------
// AgingNode
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AgingParams {
    /// Date to age against; defaults to today.
    pub as_of_date: Option<NaiveDate>,
    /// Custom bucket boundaries; defaults to `[0, 30, 60, 90]`.
    pub boundaries: Option<BucketBoundaries>,
}

/// Computes `aging_days`, the aging bucket, and `overdue_days` for every
/// upstream record.
pub struct AgingNode;

#[async_trait]
impl ProcessingNode for AgingNode {
    fn category(&self) -> NodeCategory {
        NodeCategory::Calculation
    }

    async fn execute(
        &self,
        input: NodeInput,
        params: &Value,
        _ctx: &ExecutionContext,
    ) -> Result<Payload, NodeError> {
        let p: AgingParams = parse_params(params)?;
        let as_of = p.as_of_date.unwrap_or_else(|| Utc::now().date_naive());
        let boundaries = p.boundaries.unwrap_or_default();

        let mut records = input.records();
        for record in &mut records {
            let bucket = assign_aging_bucket(record.invoice_date, as_of, &boundaries)?;
            record.aging_days = Some(bucket.age_days);
            record.aging_bucket = Some(bucket.label);
            record.overdue_days = record
                .due_date
                .map(|due| as_of.signed_duration_since(due).num_days().max(0));
        }

        debug!(count = records.len(), %as_of, "assigned aging buckets");
        Ok(Payload::Records(records))
    }
}

// ---------------------------------------------------------------------------
// OutstandingNode
// ---------------------------------------------------------------------------

/// Recomputes `outstanding = total - paid` and the payment state for every
/// upstream record.
pub struct OutstandingNode;

#[async_trait]
impl ProcessingNode for OutstandingNode {
    fn category(&self) -> NodeCategory {
        NodeCategory::Calculation
    }

    async fn execute(
        &self,
        input: NodeInput,
        _params: &Value,
        _ctx: &ExecutionContext,
    ) -> Result<Payload, NodeError> {
        let mut records = input.records();
        for record in &mut records {
            record.outstanding = round_money(record.total - record.paid);
            record.payment_state = Some(if record.paid >= record.total {
                PaymentState::Paid
            } else if record.paid <= Decimal::ZERO {
                PaymentState::Unpaid
            } else {
                PaymentState::PartiallyPaid
            });
        }
        Ok(Payload::Records(records))
    }
}

// ---------------------------------------------------------------------------
// CurrencyConvertNode
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CurrencyConvertParams {
    /// Target currency. Required.
    pub target: Option<Currency>,
    /// Rate date for every record; defaults to each record's invoice date.
    pub as_of_date: Option<NaiveDate>,
}

/// Converts every monetary field of every upstream record into a target
/// currency via the injected rate source.
pub struct CurrencyConvertNode {
    rates: Arc<dyn RateSource>,
}

impl CurrencyConvertNode {
    pub fn new(rates: Arc<dyn RateSource>) -> Self {
        Self { rates }
    }
}

#[async_trait]
impl ProcessingNode for CurrencyConvertNode {
    fn category(&self) -> NodeCategory {
        NodeCategory::Calculation
    }

    async fn execute(
        &self,
        input: NodeInput,
        params: &Value,
        _ctx: &ExecutionContext,
    ) -> Result<Payload, NodeError> {
        let p: CurrencyConvertParams = parse_params(params)?;
        let target = p
            .target
            .ok_or_else(|| NodeError::MissingField("target".into()))?;

        let mut records = input.records();
        for record in &mut records {
            let as_of = p.as_of_date.unwrap_or(record.invoice_date);
            let from = record.currency.clone();
            let convert = |amount: Decimal| -> Result<Decimal, CalcError> {
                calc::convert(amount, &from, &target, as_of, self.rates.as_ref()).map(round_money)
            };
            record.subtotal = convert(record.subtotal)?;
            record.tax = convert(record.tax)?;
            record.total = convert(record.total)?;
            record.paid = convert(record.paid)?;
            record.outstanding = convert(record.outstanding)?;
            record.currency = target.clone();
        }

        debug!(count = records.len(), %target, "converted amounts");
        Ok(Payload::Records(records))
    }
}

// ---------------------------------------------------------------------------
// DsoNode
// ---------------------------------------------------------------------------

fn default_period_days() -> u32 {
    90
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DsoParams {
    pub period_days: u32,
}

impl Default for DsoParams {
    fn default() -> Self {
        Self {
            period_days: default_period_days(),
        }
    }
}

/// Computes Days Sales Outstanding over the upstream record set.
///
/// Receivables are the summed outstanding amounts, credit sales the summed
/// totals. With zero credit sales the metric value is `None`: undefined,
/// not an error, so an empty period still produces a report section.
pub struct DsoNode;

#[async_trait]
impl ProcessingNode for DsoNode {
    fn category(&self) -> NodeCategory {
        NodeCategory::Calculation
    }

    async fn execute(
        &self,
        input: NodeInput,
        params: &Value,
        _ctx: &ExecutionContext,
    ) -> Result<Payload, NodeError> {
        let p: DsoParams = parse_params(params)?;
        let records = input.records();

        let total_receivables: Decimal = records.iter().map(|r| r.outstanding).sum();
        let net_credit_sales: Decimal = records.iter().map(|r| r.total).sum();

        let value = match compute_dso(total_receivables, net_credit_sales, p.period_days) {
            Ok(dso) => Some(dso.round_dp(1)),
            Err(CalcError::DivisionByZero) => None,
            Err(other) => return Err(other.into()),
        };

        Ok(Payload::Metric(Metric {
            name: "dso".into(),
            value,
            context: serde_json::json!({
                "period_days": p.period_days,
                "invoice_count": records.len(),
                "total_receivables": total_receivables,
                "net_credit_sales": net_credit_sales,
            }),
        }))
    }
}
