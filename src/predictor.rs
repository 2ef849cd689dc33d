//! Rating prediction from the nearest neighbors.
//!
//! The k-NN prediction is the mean target rating of the k closest viewers.
//! [`RatingDistribution`] and [`RatingPosterior`] are separate diagnostics
//! computed over the whole dataset; neither depends on k.

use crate::data_format::{QueryVector, RatingMatrix};
use crate::error::{KnnError, Result};
use crate::ranking::NeighborList;
use crate::types::Rating;
use serde::{Deserialize, Serialize};

/// The predicted rating for the target column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Number of neighbors averaged.
    pub k: usize,

    /// Mean target rating over those neighbors.
    pub value: Rating,
}

/// Predict the target rating as the mean over the `k` nearest neighbors.
///
/// `k` must satisfy `1 <= k <= n`; it is never clamped.
pub fn predict(
    neighbors: &NeighborList,
    k: usize,
    matrix: &RatingMatrix,
    target_col: usize,
) -> Result<Prediction> {
    matrix.check_column(target_col)?;
    let top = neighbors.top(k)?;

    let mut sum = 0.0;
    for neighbor in top {
        sum += matrix.rating(neighbor.viewer_id, target_col).ok_or_else(|| {
            KnnError::out_of_range(format!(
                "neighbor {} is not a row of the {}-row matrix",
                neighbor.viewer_id,
                matrix.num_rows()
            ))
        })?;
    }

    Ok(Prediction {
        k,
        value: sum / k as f64,
    })
}

/// Discrete rating levels `min, min + step, ..., min + (levels - 1) * step`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingScale {
    /// Lowest level.
    pub min: Rating,

    /// Distance between adjacent levels.
    pub step: Rating,

    /// Number of levels.
    pub levels: usize,
}

impl Default for RatingScale {
    /// Half-star ratings from 0.5 to 5.0.
    fn default() -> Self {
        Self {
            min: 0.5,
            step: 0.5,
            levels: 10,
        }
    }
}

impl RatingScale {
    /// Create a new scale.
    pub fn new(min: Rating, step: Rating, levels: usize) -> Result<Self> {
        if levels == 0 || !(step > 0.0) || !min.is_finite() || !step.is_finite() {
            return Err(KnnError::invalid_argument(format!(
                "invalid rating scale: min {min}, step {step}, {levels} levels"
            )));
        }
        Ok(Self { min, step, levels })
    }

    /// Value of level `i`.
    pub fn level(&self, i: usize) -> Rating {
        self.min + i as f64 * self.step
    }

    /// All level values in ascending order.
    pub fn values(&self) -> impl Iterator<Item = Rating> + '_ {
        (0..self.levels).map(move |i| self.level(i))
    }

    /// Index of the level exactly equal to `rating`, if any.
    pub fn index_of(&self, rating: Rating) -> Option<usize> {
        (0..self.levels).find(|&i| self.level(i) == rating)
    }
}

/// The level with the highest non-zero probability. The lowest level wins ties.
fn most_likely(pairs: impl Iterator<Item = (Rating, f64)>) -> Option<(Rating, f64)> {
    pairs
        .filter(|&(_, p)| p > 0.0)
        .fold(None, |best: Option<(Rating, f64)>, (level, p)| match best {
            Some((_, bp)) if bp >= p => best,
            _ => Some((level, p)),
        })
}

fn require_rows(matrix: &RatingMatrix) -> Result<()> {
    if matrix.is_empty() {
        return Err(KnnError::invalid_argument(
            "cannot compute a rating distribution over an empty dataset",
        ));
    }
    Ok(())
}

/// Empirical probability of each rating level in the target column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingDistribution {
    /// The levels the probabilities refer to.
    pub scale: RatingScale,

    /// `probabilities[i]` is the fraction of viewers whose target rating equals level `i`.
    pub probabilities: Vec<f64>,
}

impl RatingDistribution {
    /// Count exact matches of each level in `target_col` over every viewer.
    ///
    /// Ratings that fall between levels are counted nowhere, so the
    /// probabilities may sum to less than one.
    pub fn compute(matrix: &RatingMatrix, target_col: usize, scale: RatingScale) -> Result<Self> {
        matrix.check_column(target_col)?;
        require_rows(matrix)?;

        let mut counts = vec![0usize; scale.levels];
        for rating in matrix.column(target_col) {
            if let Some(i) = scale.index_of(rating) {
                counts[i] += 1;
            }
        }

        let n = matrix.num_rows() as f64;
        Ok(Self {
            scale,
            probabilities: counts.into_iter().map(|c| c as f64 / n).collect(),
        })
    }

    /// Iterate over `(level, probability)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Rating, f64)> + '_ {
        self.scale.values().zip(self.probabilities.iter().copied())
    }

    /// The most probable level. The lowest level wins ties.
    ///
    /// `None` when no target rating falls on a level.
    pub fn mode(&self) -> Option<(Rating, f64)> {
        most_likely(self.iter())
    }
}

/// Naive Bayes posterior over the rating levels given the user's ratings.
///
/// For each level `L` with `c_L` viewers rating the target exactly `L`:
///
/// ```text
/// score(L) = c_L / n * prod_j (matches_j(L) + 1) / (c_L + levels)
/// ```
///
/// where `matches_j(L)` counts those viewers whose rating in non-target
/// column `j` equals the query's rating exactly. Every column is treated as
/// independent given the target level. The add-one terms keep a single
/// unmatched column from zeroing a level out. A level nobody rated gets no
/// mass at all. Scores are normalized to sum to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingPosterior {
    /// The levels the probabilities refer to.
    pub scale: RatingScale,

    /// `probabilities[i]` is the posterior probability of level `i`.
    pub probabilities: Vec<f64>,
}

impl RatingPosterior {
    /// Compute the posterior of `target_col` given `query` over every viewer.
    pub fn compute(
        matrix: &RatingMatrix,
        target_col: usize,
        query: &QueryVector,
        scale: RatingScale,
    ) -> Result<Self> {
        matrix.check_column(target_col)?;
        query.check_columns(matrix.num_cols())?;
        require_rows(matrix)?;

        let q = query.values();
        let mut counts = vec![0usize; scale.levels];
        let mut matches = vec![vec![0usize; q.len()]; scale.levels];
        for row in matrix.rows() {
            let Some(level) = scale.index_of(row[target_col]) else {
                continue;
            };
            counts[level] += 1;
            let others = row
                .iter()
                .enumerate()
                .filter(|&(c, _)| c != target_col)
                .map(|(_, &v)| v);
            for (j, (value, wanted)) in others.zip(q).enumerate() {
                if value == *wanted {
                    matches[level][j] += 1;
                }
            }
        }

        let n = matrix.num_rows() as f64;
        let smoothing = scale.levels as f64;
        let scores: Vec<f64> = counts
            .iter()
            .zip(&matches)
            .map(|(&count, hits)| {
                if count == 0 {
                    return 0.0;
                }
                let denom = count as f64 + smoothing;
                hits.iter()
                    .fold(count as f64 / n, |acc, &h| acc * (h as f64 + 1.0) / denom)
            })
            .collect();

        let total: f64 = scores.iter().sum();
        let probabilities = if total > 0.0 {
            scores.into_iter().map(|s| s / total).collect()
        } else {
            scores
        };
        Ok(Self {
            scale,
            probabilities,
        })
    }

    /// Iterate over `(level, probability)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Rating, f64)> + '_ {
        self.scale.values().zip(self.probabilities.iter().copied())
    }

    /// The most probable level given the query. The lowest level wins ties.
    pub fn mode(&self) -> Option<(Rating, f64)> {
        most_likely(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScoredRow;
    use approx::assert_relative_eq;

    fn matrix() -> RatingMatrix {
        RatingMatrix::from_rows(vec![
            vec![1.0, 1.0, 5.0],
            vec![1.0, 2.0, 3.0],
            vec![5.0, 5.0, 1.0],
        ])
        .unwrap()
    }

    fn neighbors() -> NeighborList {
        NeighborList::from_candidates(vec![
            ScoredRow::new(0, 0.0),
            ScoredRow::new(1, 1.0),
            ScoredRow::new(2, 8.0),
        ])
    }

    #[test]
    fn test_predict_k2() {
        let p = predict(&neighbors(), 2, &matrix(), 2).unwrap();
        assert_relative_eq!(p.value, 4.0);
        assert_eq!(p.k, 2);
    }

    #[test]
    fn test_predict_k1_and_kn() {
        assert_relative_eq!(predict(&neighbors(), 1, &matrix(), 2).unwrap().value, 5.0);
        assert_relative_eq!(predict(&neighbors(), 3, &matrix(), 2).unwrap().value, 3.0);
    }

    #[test]
    fn test_predict_rejects_k_out_of_range() {
        assert!(predict(&neighbors(), 0, &matrix(), 2).is_err());
        assert!(predict(&neighbors(), 4, &matrix(), 2).is_err());
        assert!(predict(&neighbors(), 2, &matrix(), 3).is_err());
    }

    #[test]
    fn test_distribution() {
        let m = RatingMatrix::from_rows(vec![
            vec![0.0, 0.5],
            vec![0.0, 5.0],
            vec![0.0, 5.0],
            vec![0.0, 2.25],
        ])
        .unwrap();
        let dist = RatingDistribution::compute(&m, 1, RatingScale::default()).unwrap();

        assert_eq!(dist.probabilities.len(), 10);
        assert_relative_eq!(dist.probabilities[0], 0.25);
        assert_relative_eq!(dist.probabilities[9], 0.5);
        // 2.25 is not a level
        assert_relative_eq!(dist.probabilities.iter().sum::<f64>(), 0.75);
        assert_eq!(dist.mode(), Some((5.0, 0.5)));
    }

    #[test]
    fn test_mode_prefers_lowest_on_tie() {
        let m = RatingMatrix::from_rows(vec![vec![0.0, 1.0], vec![0.0, 2.0]]).unwrap();
        let dist = RatingDistribution::compute(&m, 1, RatingScale::default()).unwrap();
        assert_eq!(dist.mode(), Some((1.0, 0.5)));
    }

    #[test]
    fn test_scale_validation() {
        assert!(RatingScale::new(1.0, 0.0, 5).is_err());
        assert!(RatingScale::new(1.0, 1.0, 0).is_err());
        let s = RatingScale::new(1.0, 1.0, 5).unwrap();
        assert_eq!(s.values().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_posterior_uses_query() {
        // The prior is a tie between 1.0 and 5.0; the query breaks it.
        let m = RatingMatrix::from_rows(vec![
            vec![1.0, 5.0],
            vec![1.0, 5.0],
            vec![2.0, 1.0],
            vec![1.0, 1.0],
        ])
        .unwrap();
        let query = QueryVector::new(vec![1.0]).unwrap();
        let scale = RatingScale::default();

        let prior = RatingDistribution::compute(&m, 1, scale).unwrap();
        assert_eq!(prior.mode(), Some((1.0, 0.5)));

        let post = RatingPosterior::compute(&m, 1, &query, scale).unwrap();
        // 5.0: 0.5 * 3/12, 1.0: 0.5 * 2/12
        assert_relative_eq!(post.probabilities[9], 0.6, epsilon = 1e-12);
        assert_relative_eq!(post.probabilities[1], 0.4, epsilon = 1e-12);
        assert_eq!(post.probabilities[4], 0.0);
        let (level, p) = post.mode().unwrap();
        assert_eq!(level, 5.0);
        assert_relative_eq!(p, 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_posterior_unmatched_query_keeps_mass() {
        let post = RatingPosterior::compute(
            &matrix(),
            2,
            &QueryVector::new(vec![4.5, 4.5]).unwrap(),
            RatingScale::default(),
        )
        .unwrap();
        assert_relative_eq!(post.probabilities.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(post.probabilities[1] > 0.0);
    }

    #[test]
    fn test_posterior_checks_query_and_rows() {
        let short = QueryVector::new(vec![1.0]).unwrap();
        assert!(RatingPosterior::compute(&matrix(), 2, &short, RatingScale::default()).is_err());

        let empty = RatingMatrix::from_flat(vec![], 2).unwrap();
        let query = QueryVector::new(vec![1.0]).unwrap();
        assert!(RatingPosterior::compute(&empty, 1, &query, RatingScale::default()).is_err());
    }

    #[test]
    fn test_off_level_ratings_have_no_mode() {
        let m = RatingMatrix::from_rows(vec![vec![1.0, 2.25], vec![2.0, 0.1]]).unwrap();
        let dist = RatingDistribution::compute(&m, 1, RatingScale::default()).unwrap();
        assert_eq!(dist.mode(), None);
        let query = QueryVector::new(vec![1.0]).unwrap();
        let post = RatingPosterior::compute(&m, 1, &query, RatingScale::default()).unwrap();
        assert_eq!(post.mode(), None);
    }
}
