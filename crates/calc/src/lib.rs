//! `calc` crate — the financial calculation engine.
//!
//! Pure, stateless functions over validated numeric domains: aging-bucket
//! assignment, DSO, currency conversion, tax and interest. No I/O, no
//! mutation of caller data, safe to call from any number of concurrent
//! node executions.
//!
//! All monetary amounts are [`rust_decimal::Decimal`]; floating point is
//! never used in a money path.

pub mod aging;
pub mod currency;
pub mod dso;
pub mod error;
pub mod money;
pub mod tax;

pub use aging::{assign_aging_bucket, age_in_days, AgingBucket, BucketBoundaries};
pub use currency::{convert, convert_money, FixedRateTable, RateSource};
pub use dso::compute_dso;
pub use error::CalcError;
pub use money::{Currency, Money};
