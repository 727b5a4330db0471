//! Currency conversion against an injected rate source.
//!
//! The engine never fetches rates itself; callers supply a [`RateSource`]
//! (live provider, historical table, or a fixture). A missing rate is a
//! typed error, never a silent 1.0.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::CalcError;
use crate::money::{round_money, Currency, Money};

/// Injected capability supplying an exchange rate for a currency pair on a
/// given date. Implementations must be pure lookups from the engine's point
/// of view; any caching or network work happens behind this trait.
pub trait RateSource: Send + Sync {
    fn rate(&self, from: &Currency, to: &Currency, as_of: NaiveDate) -> Option<Decimal>;
}

/// Convert an amount between currencies.
///
/// Identity when `from == to`; no lookup is performed in that case. The
/// result is the raw product, unrounded.
///
/// # Errors
/// [`CalcError::RateUnavailable`] if the source has no rate for the pair.
pub fn convert(
    amount: Decimal,
    from: &Currency,
    to: &Currency,
    as_of: NaiveDate,
    rates: &dyn RateSource,
) -> Result<Decimal, CalcError> {
    if from == to {
        return Ok(amount);
    }
    let rate = rates
        .rate(from, to, as_of)
        .ok_or_else(|| CalcError::RateUnavailable {
            from: from.clone(),
            to: to.clone(),
            as_of,
        })?;
    Ok(amount * rate)
}

/// Convert a [`Money`] value, rounding the result to 2 decimal places.
pub fn convert_money(
    money: &Money,
    to: &Currency,
    rates: &dyn RateSource,
) -> Result<Money, CalcError> {
    let amount = convert(money.amount, &money.currency, to, money.as_of, rates)?;
    Ok(Money {
        amount: round_money(amount),
        currency: to.clone(),
        as_of: money.as_of,
    })
}

/// In-process rate table keyed by exact `(from, to)` pair.
///
/// Used by tests and the CLI; production deployments put a live provider
/// behind [`RateSource`] instead.
#[derive(Debug, Default, Clone)]
pub struct FixedRateTable {
    rates: HashMap<(Currency, Currency), Decimal>,
}

impl FixedRateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(
        mut self,
        from: impl Into<Currency>,
        to: impl Into<Currency>,
        rate: Decimal,
    ) -> Self {
        self.rates.insert((from.into(), to.into()), rate);
        self
    }
}

impl RateSource for FixedRateTable {
    fn rate(&self, from: &Currency, to: &Currency, _as_of: NaiveDate) -> Option<Decimal> {
        self.rates.get(&(from.clone(), to.clone())).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn identity_conversion_needs_no_rate() {
        let empty = FixedRateTable::new();
        let usd = Currency::new("USD");
        for amount in [dec!(0), dec!(100), dec!(-12.34)] {
            let got = convert(amount, &usd, &usd, d(2024, 12, 31), &empty).unwrap();
            assert_eq!(got, amount);
        }
    }

    #[test]
    fn usd_to_inr_at_83() {
        let rates = FixedRateTable::new().with_rate("USD", "INR", dec!(83.0));
        let got = convert(
            dec!(100),
            &Currency::new("USD"),
            &Currency::new("INR"),
            d(2024, 12, 31),
            &rates,
        )
        .unwrap();
        assert_eq!(got, dec!(8300.0));
    }

    #[test]
    fn missing_rate_is_a_typed_error() {
        let rates = FixedRateTable::new().with_rate("USD", "INR", dec!(83.0));
        let err = convert(
            dec!(100),
            &Currency::new("EUR"),
            &Currency::new("INR"),
            d(2024, 12, 31),
            &rates,
        )
        .unwrap_err();
        assert!(matches!(err, CalcError::RateUnavailable { .. }));
    }

    #[test]
    fn money_conversion_rounds_to_cents() {
        let rates = FixedRateTable::new().with_rate("USD", "INR", dec!(83.1275));
        let money = Money::new(dec!(10), "USD", d(2024, 12, 31));
        let got = convert_money(&money, &Currency::new("INR"), &rates).unwrap();
        assert_eq!(got.amount, dec!(831.28));
        assert_eq!(got.currency, Currency::new("INR"));
    }
}
