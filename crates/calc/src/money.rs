//! Money and currency value types.
//!
//! Amounts are always [`Decimal`]; the 2-decimal-place, round-half-up
//! convention matches how statements are produced downstream.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::CalcError;

/// ISO-4217 currency code, normalised to upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Currency {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.0
    }
}

impl From<&str> for Currency {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A monetary amount in a specific currency, valued at a specific date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Currency,
    pub as_of: NaiveDate,
}

impl Money {
    pub fn new(amount: Decimal, currency: impl Into<Currency>, as_of: NaiveDate) -> Self {
        Self {
            amount,
            currency: currency.into(),
            as_of,
        }
    }

    /// Add another amount in the same currency.
    ///
    /// # Errors
    /// [`CalcError::CurrencyMismatch`] if the currencies differ.
    pub fn try_add(&self, other: &Money) -> Result<Money, CalcError> {
        if self.currency != other.currency {
            return Err(CalcError::CurrencyMismatch(
                self.currency.clone(),
                other.currency.clone(),
            ));
        }
        Ok(Money {
            amount: self.amount + other.amount,
            currency: self.currency.clone(),
            as_of: self.as_of.max(other.as_of),
        })
    }
}

/// Round a monetary amount to 2 decimal places, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn currency_is_normalised() {
        assert_eq!(Currency::new(" usd "), Currency::new("USD"));
        assert_eq!(Currency::new("inr").as_str(), "INR");
    }

    #[test]
    fn same_currency_addition() {
        let a = Money::new(dec!(10.50), "INR", d(2024, 1, 1));
        let b = Money::new(dec!(4.25), "INR", d(2024, 2, 1));
        let sum = a.try_add(&b).unwrap();
        assert_eq!(sum.amount, dec!(14.75));
        assert_eq!(sum.as_of, d(2024, 2, 1));
    }

    #[test]
    fn mixed_currency_addition_is_rejected() {
        let a = Money::new(dec!(1), "USD", d(2024, 1, 1));
        let b = Money::new(dec!(1), "EUR", d(2024, 1, 1));
        assert!(matches!(
            a.try_add(&b),
            Err(CalcError::CurrencyMismatch(_, _))
        ));
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.01));
        assert_eq!(round_money(dec!(-1.005)), dec!(-1.01));
        assert_eq!(round_money(dec!(2.004)), dec!(2.00));
    }
}
