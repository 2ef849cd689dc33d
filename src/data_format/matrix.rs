//! Dense rating matrix.

use crate::error::{KnnError, Result};
use crate::types::{Rating, ViewerId};

/// An n x m matrix of ratings stored row-major in a single buffer.
///
/// Rows are viewers and columns are items. The matrix is immutable once
/// built; workers only ever see copies of contiguous row blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingMatrix {
    data: Vec<Rating>,
    num_rows: usize,
    num_cols: usize,
}

impl RatingMatrix {
    /// Smallest column count that leaves a non-target column to compare on.
    pub const MIN_COLUMNS: usize = 2;

    /// Build a matrix from a flat row-major buffer.
    pub fn from_flat(data: Vec<Rating>, num_cols: usize) -> Result<Self> {
        if num_cols < Self::MIN_COLUMNS {
            return Err(KnnError::invalid_argument(format!(
                "rating matrix needs at least {} columns, got {}",
                Self::MIN_COLUMNS,
                num_cols
            )));
        }
        if data.len() % num_cols != 0 {
            return Err(KnnError::invalid_argument(format!(
                "{} values do not form rows of {} columns",
                data.len(),
                num_cols
            )));
        }

        Ok(Self {
            num_rows: data.len() / num_cols,
            data,
            num_cols,
        })
    }

    /// Build a matrix from a vector of rows. Every row must have the same length.
    pub fn from_rows(rows: Vec<Vec<Rating>>) -> Result<Self> {
        let num_cols = rows.first().map(|r| r.len()).unwrap_or(Self::MIN_COLUMNS);
        let mut data = Vec::with_capacity(rows.len() * num_cols);

        for (i, row) in rows.iter().enumerate() {
            if row.len() != num_cols {
                return Err(KnnError::invalid_argument(format!(
                    "row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    num_cols
                )));
            }
            data.extend_from_slice(row);
        }

        Self::from_flat(data, num_cols)
    }

    /// Number of viewers (n).
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of items per viewer (m).
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Check if the matrix has no rows.
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Row-major backing buffer.
    pub fn raw_data(&self) -> &[Rating] {
        &self.data
    }

    /// Get a row by viewer id.
    pub fn row(&self, viewer: ViewerId) -> Option<&[Rating]> {
        if viewer >= self.num_rows {
            return None;
        }
        let offset = viewer * self.num_cols;
        Some(&self.data[offset..offset + self.num_cols])
    }

    /// Iterate over all rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[Rating]> + '_ {
        self.data.chunks_exact(self.num_cols)
    }

    /// Flat row-major slice covering rows `[start, start + count)`.
    pub fn row_block(&self, start: ViewerId, count: usize) -> Result<&[Rating]> {
        let end = start
            .checked_add(count)
            .filter(|&end| end <= self.num_rows)
            .ok_or_else(|| {
                KnnError::out_of_range(format!(
                    "row block [{}, {}+{}) exceeds {} rows",
                    start, start, count, self.num_rows
                ))
            })?;
        Ok(&self.data[start * self.num_cols..end * self.num_cols])
    }

    /// Get one rating.
    pub fn rating(&self, viewer: ViewerId, col: usize) -> Option<Rating> {
        if col >= self.num_cols {
            return None;
        }
        self.row(viewer).map(|row| row[col])
    }

    /// Ensure `col` names a column of this matrix.
    pub fn check_column(&self, col: usize) -> Result<()> {
        if col >= self.num_cols {
            return Err(KnnError::invalid_argument(format!(
                "target column {} out of range for {} columns",
                col, self.num_cols
            )));
        }
        Ok(())
    }

    /// Iterate over one column.
    pub fn column(&self, col: usize) -> impl Iterator<Item = Rating> + '_ {
        self.rows().map(move |row| row[col])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RatingMatrix {
        RatingMatrix::from_rows(vec![
            vec![1.0, 1.0, 5.0],
            vec![1.0, 2.0, 3.0],
            vec![5.0, 5.0, 1.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_from_rows() {
        let m = sample();
        assert_eq!(m.num_rows(), 3);
        assert_eq!(m.num_cols(), 3);
        assert_eq!(m.row(1).unwrap(), &[1.0, 2.0, 3.0]);
        assert!(m.row(3).is_none());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = RatingMatrix::from_rows(vec![vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert!(err.message().contains("row 1"));
    }

    #[test]
    fn test_single_column_rejected() {
        assert!(RatingMatrix::from_flat(vec![1.0, 2.0], 1).is_err());
    }

    #[test]
    fn test_row_block() {
        let m = sample();
        assert_eq!(m.row_block(1, 2).unwrap().len(), 6);
        assert_eq!(m.row_block(3, 0).unwrap().len(), 0);
        assert!(m.row_block(2, 2).is_err());
    }

    #[test]
    fn test_column() {
        let m = sample();
        let target: Vec<_> = m.column(2).collect();
        assert_eq!(target, vec![5.0, 3.0, 1.0]);
        assert_eq!(m.rating(2, 0), Some(5.0));
        assert!(m.check_column(3).is_err());
    }
}
