//! Days Sales Outstanding.
//!
//! `DSO = (total_receivables / net_credit_sales) * period_days`, the
//! average number of days it takes to collect payment after a sale.

use rust_decimal::Decimal;

use crate::error::CalcError;

/// Compute DSO over a reporting period.
///
/// The result is unrounded; callers choose their own display precision.
///
/// # Errors
/// - [`CalcError::DivisionByZero`] when `net_credit_sales` is zero. Callers
///   usually report DSO as undefined rather than infinite.
/// - [`CalcError::InvalidParameter`] for negative receivables or sales.
pub fn compute_dso(
    total_receivables: Decimal,
    net_credit_sales: Decimal,
    period_days: u32,
) -> Result<Decimal, CalcError> {
    if total_receivables < Decimal::ZERO {
        return Err(CalcError::InvalidParameter(
            "total receivables must be non-negative".into(),
        ));
    }
    if net_credit_sales < Decimal::ZERO {
        return Err(CalcError::InvalidParameter(
            "net credit sales must be non-negative".into(),
        ));
    }
    if net_credit_sales.is_zero() {
        return Err(CalcError::DivisionByZero);
    }
    Ok(total_receivables / net_credit_sales * Decimal::from(period_days))
}
