//! Core type definitions for distknn.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Global, 0-based index of a viewer (a row of the rating matrix).
pub type ViewerId = usize;

/// A single rating value.
pub type Rating = f64;

/// Rank of a process in the topology. Rank 0 is the coordinator.
pub type Rank = usize;

/// A viewer together with its dissimilarity to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    /// Global row index.
    pub viewer_id: ViewerId,

    /// L1 distance over the non-target columns. Always >= 0.
    pub distance: f64,
}

impl ScoredRow {
    /// Create a new scored row.
    pub fn new(viewer_id: ViewerId, distance: f64) -> Self {
        Self {
            viewer_id,
            distance,
        }
    }

    /// Sort key: ascending distance, ties broken by ascending viewer id.
    #[inline]
    pub fn rank_key(&self) -> (OrderedFloat<f64>, ViewerId) {
        (OrderedFloat(self.distance), self.viewer_id)
    }
}
