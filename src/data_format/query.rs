//! The querying user's ratings.

use crate::error::{KnnError, Result};
use crate::types::Rating;
use serde::{Deserialize, Serialize};

/// Ratings of the querying user, one per non-target column, in column order.
///
/// For a matrix with `m` columns the query holds `m - 1` values; position `i`
/// lines up with the `i`-th column once the target column is skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryVector {
    values: Vec<Rating>,
}

impl QueryVector {
    /// Wrap raw values. Every value must be finite.
    pub fn new(values: Vec<Rating>) -> Result<Self> {
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(KnnError::invalid_argument(format!(
                "query rating {} is not a finite number",
                pos + 1
            )));
        }
        Ok(Self { values })
    }

    /// Parse a comma- or whitespace-separated list such as `"4, 3.5, 1"`.
    pub fn parse(text: &str) -> Result<Self> {
        let values = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(|t| {
                t.parse::<Rating>()
                    .map_err(|_| KnnError::invalid_argument(format!("invalid query rating {t:?}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(values)
    }

    /// Number of ratings.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the query is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The ratings.
    pub fn values(&self) -> &[Rating] {
        &self.values
    }

    /// Consume into the raw ratings.
    pub fn into_values(self) -> Vec<Rating> {
        self.values
    }

    /// Ensure the query matches a matrix with `num_cols` columns.
    pub fn check_columns(&self, num_cols: usize) -> Result<()> {
        let expected = num_cols.saturating_sub(1);
        if self.values.len() != expected {
            return Err(KnnError::invalid_argument(format!(
                "query has {} ratings, expected {} (one per non-target column)",
                self.values.len(),
                expected
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_separators() {
        let q = QueryVector::parse("4, 3.5 1\t2").unwrap();
        assert_eq!(q.values(), &[4.0, 3.5, 1.0, 2.0]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(QueryVector::parse("1, two").is_err());
        assert!(QueryVector::new(vec![1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_check_columns() {
        let q = QueryVector::new(vec![1.0, 1.0]).unwrap();
        assert!(q.check_columns(3).is_ok());
        assert!(q.check_columns(4).is_err());
    }
}
