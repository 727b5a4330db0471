//! Tax, interest and amortization formulas.
//!
//! Standard closed-form definitions, total over validated domains. Rates
//! are expressed in percent (`18` means 18%).

use rust_decimal::Decimal;

use crate::error::CalcError;
use crate::money::round_money;

const PERCENT: Decimal = Decimal::ONE_HUNDRED;
const DAYS_PER_YEAR: Decimal = Decimal::from_parts(365, 0, 0, false, 0);

fn require_non_negative(value: Decimal, what: &str) -> Result<(), CalcError> {
    if value < Decimal::ZERO {
        return Err(CalcError::InvalidParameter(format!(
            "{what} must be non-negative"
        )));
    }
    Ok(())
}

/// Tax owed on a base amount at a percentage rate, rounded to cents.
pub fn tax_amount(base: Decimal, rate_percent: Decimal) -> Result<Decimal, CalcError> {
    require_non_negative(base, "tax base")?;
    require_non_negative(rate_percent, "tax rate")?;
    Ok(round_money(base * rate_percent / PERCENT))
}

/// Simple interest accrued over a number of days at an annual rate.
pub fn simple_interest(
    principal: Decimal,
    annual_rate_percent: Decimal,
    days: u32,
) -> Result<Decimal, CalcError> {
    require_non_negative(principal, "principal")?;
    require_non_negative(annual_rate_percent, "interest rate")?;
    let fraction = Decimal::from(days) / DAYS_PER_YEAR;
    Ok(round_money(
        principal * annual_rate_percent / PERCENT * fraction,
    ))
}

/// Level payment for a fully amortizing loan.
///
/// `payment = P * r * (1+r)^n / ((1+r)^n - 1)` where `r` is the per-period
/// rate. A zero rate degenerates to straight-line `P / n`.
///
/// # Errors
/// [`CalcError::InvalidParameter`] for negative inputs or zero periods.
pub fn amortized_payment(
    principal: Decimal,
    period_rate_percent: Decimal,
    periods: u32,
) -> Result<Decimal, CalcError> {
    require_non_negative(principal, "principal")?;
    require_non_negative(period_rate_percent, "period rate")?;
    if periods == 0 {
        return Err(CalcError::InvalidParameter(
            "periods must be at least 1".into(),
        ));
    }
    if period_rate_percent.is_zero() {
        return Ok(round_money(principal / Decimal::from(periods)));
    }
    let rate = period_rate_percent / PERCENT;
    let growth = pow(Decimal::ONE + rate, periods);
    Ok(round_money(
        principal * rate * growth / (growth - Decimal::ONE),
    ))
}

/// Integer power by repeated multiplication. Periods are small (loan terms),
/// so the loop is fine and avoids pulling in the maths feature set.
fn pow(base: Decimal, exp: u32) -> Decimal {
    let mut acc = Decimal::ONE;
    for _ in 0..exp {
        acc *= base;
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn gst_style_tax() {
        assert_eq!(tax_amount(dec!(1000), dec!(18)).unwrap(), dec!(180.00));
        assert_eq!(tax_amount(dec!(999.99), dec!(5)).unwrap(), dec!(50.00));
    }

    #[test]
    fn negative_rate_is_rejected() {
        assert!(matches!(
            tax_amount(dec!(100), dec!(-1)),
            Err(CalcError::InvalidParameter(_))
        ));
        assert!(matches!(
            simple_interest(dec!(100), dec!(-1), 30),
            Err(CalcError::InvalidParameter(_))
        ));
    }

    #[test]
    fn simple_interest_over_a_year() {
        // 10% on 1000 over a full year.
        assert_eq!(
            simple_interest(dec!(1000), dec!(10), 365).unwrap(),
            dec!(100.00)
        );
    }

    #[test]
    fn amortized_payment_matches_known_schedule() {
        // 100k over 12 months at 1% per period => 8884.88.
        let payment = amortized_payment(dec!(100000), dec!(1), 12).unwrap();
        assert_eq!(payment, dec!(8884.88));
    }

    #[test]
    fn zero_rate_amortization_is_straight_line() {
        assert_eq!(
            amortized_payment(dec!(1200), dec!(0), 12).unwrap(),
            dec!(100.00)
        );
    }

    #[test]
    fn zero_periods_is_rejected() {
        assert!(matches!(
            amortized_payment(dec!(1000), dec!(1), 0),
            Err(CalcError::InvalidParameter(_))
        ));
    }
}
