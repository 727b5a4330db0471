//! Calculation-engine error type.

use chrono::NaiveDate;
use thiserror::Error;

use crate::money::Currency;

/// Errors produced by calculation functions.
///
/// These are always caught at the calculation-node boundary and turned into
/// a failed node result; they never unwind an execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalcError {
    /// The document is dated after the as-of date, so its age would be
    /// negative.
    #[error("document dated {document_date} is after the as-of date {as_of}")]
    InvalidDateRange {
        document_date: NaiveDate,
        as_of: NaiveDate,
    },

    /// Net credit sales of zero make DSO undefined.
    #[error("net credit sales is zero; DSO is undefined")]
    DivisionByZero,

    /// The injected rate source could not supply a rate for the pair.
    #[error("no exchange rate for {from}->{to} as of {as_of}")]
    RateUnavailable {
        from: Currency,
        to: Currency,
        as_of: NaiveDate,
    },

    /// Two amounts in different currencies were combined without conversion.
    #[error("currency mismatch: {0} vs {1}")]
    CurrencyMismatch(Currency, Currency),

    /// An input falls outside the function's validated domain.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
