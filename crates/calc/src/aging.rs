//! Aging-bucket assignment.
//!
//! Buckets are inclusive-lower / exclusive-upper intervals over the age of
//! a document in days, except the final bucket which is open-ended. The
//! default boundaries `[0, 30, 60, 90]` yield `0-30`, `30-60`, `60-90`
//! and `90+`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CalcError;

/// Validated bucket boundaries: a strictly increasing sequence of
/// non-negative day counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<i64>")]
pub struct BucketBoundaries(Vec<i64>);

impl BucketBoundaries {
    /// Build boundaries from a day-count sequence.
    ///
    /// # Errors
    /// [`CalcError::InvalidParameter`] if the sequence is empty, contains a
    /// negative value, or is not strictly increasing.
    pub fn new(bounds: Vec<i64>) -> Result<Self, CalcError> {
        if bounds.is_empty() {
            return Err(CalcError::InvalidParameter(
                "bucket boundaries must not be empty".into(),
            ));
        }
        if bounds[0] < 0 {
            return Err(CalcError::InvalidParameter(
                "bucket boundaries must be non-negative".into(),
            ));
        }
        if bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CalcError::InvalidParameter(
                "bucket boundaries must be strictly increasing".into(),
            ));
        }
        Ok(Self(bounds))
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    /// Number of buckets, including the open-ended final one.
    pub fn bucket_count(&self) -> usize {
        self.0.len()
    }

    /// Human-readable label for each bucket, e.g. `0-30` or `90+`.
    pub fn labels(&self) -> Vec<String> {
        (0..self.0.len()).map(|i| self.label(i)).collect()
    }

    fn label(&self, index: usize) -> String {
        match self.0.get(index + 1) {
            Some(upper) => format!("{}-{}", self.0[index], upper),
            None => format!("{}+", self.0[index]),
        }
    }

    /// Index of the bucket containing `age_days`.
    ///
    /// Ages below the first boundary land in the first bucket; ages at or
    /// past the last boundary land in the open-ended final bucket.
    pub fn bucket_index(&self, age_days: i64) -> usize {
        self.0
            .iter()
            .skip(1)
            .position(|&upper| age_days < upper)
            .unwrap_or(self.0.len() - 1)
    }
}

impl Default for BucketBoundaries {
    fn default() -> Self {
        Self(vec![0, 30, 60, 90])
    }
}

impl TryFrom<Vec<i64>> for BucketBoundaries {
    type Error = CalcError;

    fn try_from(bounds: Vec<i64>) -> Result<Self, Self::Error> {
        Self::new(bounds)
    }
}

impl From<BucketBoundaries> for Vec<i64> {
    fn from(b: BucketBoundaries) -> Self {
        b.0
    }
}

/// The bucket assigned to a single document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingBucket {
    pub index: usize,
    pub label: String,
    pub age_days: i64,
}

/// Age of a document in whole days as of `as_of`.
///
/// # Errors
/// [`CalcError::InvalidDateRange`] if the document is dated after `as_of`.
pub fn age_in_days(invoice_date: NaiveDate, as_of: NaiveDate) -> Result<i64, CalcError> {
    let days = as_of.signed_duration_since(invoice_date).num_days();
    if days < 0 {
        return Err(CalcError::InvalidDateRange {
            document_date: invoice_date,
            as_of,
        });
    }
    Ok(days)
}

/// Assign the aging bucket for a document dated `invoice_date`.
///
/// # Errors
/// [`CalcError::InvalidDateRange`] if the document is dated after `as_of`.
pub fn assign_aging_bucket(
    invoice_date: NaiveDate,
    as_of: NaiveDate,
    boundaries: &BucketBoundaries,
) -> Result<AgingBucket, CalcError> {
    let age_days = age_in_days(invoice_date, as_of)?;
    let index = boundaries.bucket_index(age_days);
    Ok(AgingBucket {
        index,
        label: boundaries.labels()[index].clone(),
        age_days,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn bucket(age: i64) -> AgingBucket {
        let as_of = d(2024, 12, 31);
        let invoice_date = as_of - chrono::Duration::days(age);
        assign_aging_bucket(invoice_date, as_of, &BucketBoundaries::default()).unwrap()
    }

    #[test]
    fn default_boundary_labels() {
        assert_eq!(
            BucketBoundaries::default().labels(),
            vec!["0-30", "30-60", "60-90", "90+"]
        );
    }

    #[test]
    fn ages_map_to_expected_buckets() {
        assert_eq!(bucket(5).label, "0-30");
        assert_eq!(bucket(35).label, "30-60");
        assert_eq!(bucket(65).label, "60-90");
        assert_eq!(bucket(95).label, "90+");
    }

    #[test]
    fn boundary_edges_are_inclusive_lower_exclusive_upper() {
        assert_eq!(bucket(0).label, "0-30");
        assert_eq!(bucket(29).label, "0-30");
        assert_eq!(bucket(30).label, "30-60");
        assert_eq!(bucket(90).label, "90+");
        assert_eq!(bucket(10_000).label, "90+");
    }

    #[test]
    fn assignment_is_idempotent() {
        let first = bucket(42);
        let second = bucket(42);
        assert_eq!(first, second);
    }

    #[test]
    fn future_dated_document_is_rejected() {
        let as_of = d(2024, 12, 31);
        let future = d(2025, 1, 15);
        assert!(matches!(
            assign_aging_bucket(future, as_of, &BucketBoundaries::default()),
            Err(CalcError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn age_below_first_boundary_lands_in_first_bucket() {
        let bounds = BucketBoundaries::new(vec![10, 20]).unwrap();
        assert_eq!(bounds.bucket_index(5), 0);
        assert_eq!(bounds.labels(), vec!["10-20", "20+"]);
    }

    #[test]
    fn invalid_boundaries_are_rejected() {
        assert!(BucketBoundaries::new(vec![]).is_err());
        assert!(BucketBoundaries::new(vec![-1, 30]).is_err());
        assert!(BucketBoundaries::new(vec![0, 30, 30]).is_err());
        assert!(BucketBoundaries::new(vec![0, 60, 30]).is_err());
    }
}
