//! Per-partition scoring.

use crate::data_format::QueryVector;
use crate::distance_measures::l1_excluding;
use crate::error::{KnnError, Result};
use crate::types::{Rating, ScoredRow, ViewerId};
use log::trace;
use rayon::prelude::*;

/// Row count at which scoring switches to rayon.
/// Below this, the sequential loop is faster than the fork/join overhead.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4096;

/// Scores blocks of rows against a query.
///
/// The engine is a pure function of its inputs, so every rank can run its
/// own copy on its own rows with no coordination.
#[derive(Debug, Clone, Copy)]
pub struct DistanceEngine {
    num_cols: usize,
    target_col: usize,
    parallel_threshold: usize,
}

impl DistanceEngine {
    /// Create an engine for rows of `num_cols` columns predicting `target_col`.
    pub fn new(num_cols: usize, target_col: usize) -> Result<Self> {
        if num_cols < 2 {
            return Err(KnnError::invalid_argument(format!(
                "rows need at least 2 columns, got {num_cols}"
            )));
        }
        if target_col >= num_cols {
            return Err(KnnError::invalid_argument(format!(
                "target column {} out of range for {} columns",
                target_col, num_cols
            )));
        }
        Ok(Self {
            num_cols,
            target_col,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        })
    }

    /// Set the row count at which scoring runs in parallel.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold.max(1);
        self
    }

    /// Number of columns per row.
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// The column being predicted.
    pub fn target_col(&self) -> usize {
        self.target_col
    }

    /// Row count at which scoring runs in parallel.
    pub fn parallel_threshold(&self) -> usize {
        self.parallel_threshold
    }

    /// Distance of a single row.
    #[inline]
    pub fn distance(&self, query: &[Rating], row: &[Rating]) -> f64 {
        l1_excluding(query, row, self.target_col)
    }

    /// Score a row-major block whose first row has global index `start`.
    ///
    /// Returns one [`ScoredRow`] per row, in row order.
    pub fn score(
        &self,
        rows: &[Rating],
        start: ViewerId,
        query: &QueryVector,
    ) -> Result<Vec<ScoredRow>> {
        query.check_columns(self.num_cols)?;
        if rows.len() % self.num_cols != 0 {
            return Err(KnnError::invalid_argument(format!(
                "row block of {} values is not a multiple of {} columns",
                rows.len(),
                self.num_cols
            )));
        }

        let q = query.values();
        let num_rows = rows.len() / self.num_cols;
        let score_row =
            |(i, row): (usize, &[Rating])| ScoredRow::new(start + i, self.distance(q, row));

        let scored: Vec<ScoredRow> = if num_rows >= self.parallel_threshold {
            rows.par_chunks_exact(self.num_cols)
                .enumerate()
                .map(score_row)
                .collect()
        } else {
            rows.chunks_exact(self.num_cols)
                .enumerate()
                .map(score_row)
                .collect()
        };

        trace!("scored rows [{}, {})", start, start + num_rows);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_rows() -> Vec<f64> {
        vec![1.0, 1.0, 5.0, 1.0, 2.0, 3.0, 5.0, 5.0, 1.0]
    }

    #[test]
    fn test_score_scenario() {
        let engine = DistanceEngine::new(3, 2).unwrap();
        let query = QueryVector::new(vec![1.0, 1.0]).unwrap();
        let scored = engine.score(&scenario_rows(), 0, &query).unwrap();

        let distances: Vec<f64> = scored.iter().map(|s| s.distance).collect();
        assert_eq!(distances, vec![0.0, 1.0, 8.0]);
        let ids: Vec<usize> = scored.iter().map(|s| s.viewer_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_score_uses_global_ids() {
        let engine = DistanceEngine::new(3, 2).unwrap();
        let query = QueryVector::new(vec![1.0, 1.0]).unwrap();
        let scored = engine.score(&scenario_rows()[3..], 7, &query).unwrap();
        assert_eq!(scored[0].viewer_id, 7);
        assert_eq!(scored[1].viewer_id, 8);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let rows: Vec<f64> = (0..3000).map(|i| ((i * 7) % 10) as f64 * 0.5).collect();
        let query = QueryVector::new(vec![2.5, 1.0]).unwrap();
        let seq = DistanceEngine::new(3, 1).unwrap();
        let par = seq.with_parallel_threshold(1);

        assert_eq!(seq.score(&rows, 0, &query).unwrap(), par.score(&rows, 0, &query).unwrap());
    }

    #[test]
    fn test_parallel_threshold_floor() {
        let engine = DistanceEngine::new(3, 2).unwrap();
        assert_eq!(engine.parallel_threshold(), DEFAULT_PARALLEL_THRESHOLD);
        assert_eq!(engine.with_parallel_threshold(0).parallel_threshold(), 1);
        assert_eq!(engine.with_parallel_threshold(usize::MAX).parallel_threshold(), usize::MAX);
    }

    #[test]
    fn test_empty_block() {
        let engine = DistanceEngine::new(3, 2).unwrap();
        let query = QueryVector::new(vec![1.0, 1.0]).unwrap();
        assert!(engine.score(&[], 4, &query).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_bad_shapes() {
        let engine = DistanceEngine::new(3, 2).unwrap();
        let short = QueryVector::new(vec![1.0]).unwrap();
        assert!(engine.score(&scenario_rows(), 0, &short).is_err());

        let query = QueryVector::new(vec![1.0, 1.0]).unwrap();
        assert!(engine.score(&[1.0, 2.0], 0, &query).is_err());
        assert!(DistanceEngine::new(3, 3).is_err());
    }
}
