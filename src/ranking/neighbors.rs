//! Globally ranked neighbor list.

use crate::error::{KnnError, Result};
use crate::types::ScoredRow;

/// Every candidate viewer, sorted ascending by distance with ties broken by
/// ascending viewer id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NeighborList {
    ranked: Vec<ScoredRow>,
}

impl NeighborList {
    /// Rank a merged candidate set.
    pub fn from_candidates(mut candidates: Vec<ScoredRow>) -> Self {
        candidates.sort_by_key(ScoredRow::rank_key);
        Self { ranked: candidates }
    }

    /// Number of ranked viewers.
    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// The closest viewer.
    pub fn nearest(&self) -> Option<&ScoredRow> {
        self.ranked.first()
    }

    /// The full ranking.
    pub fn as_slice(&self) -> &[ScoredRow] {
        &self.ranked
    }

    /// Iterate in rank order.
    pub fn iter(&self) -> std::slice::Iter<'_, ScoredRow> {
        self.ranked.iter()
    }

    /// The `k` nearest viewers. `k` must satisfy `1 <= k <= len()`.
    pub fn top(&self, k: usize) -> Result<&[ScoredRow]> {
        if k == 0 || k > self.ranked.len() {
            return Err(KnnError::out_of_range(format!(
                "k = {} must be between 1 and {}",
                k,
                self.ranked.len()
            )));
        }
        Ok(&self.ranked[..k])
    }
}

impl<'a> IntoIterator for &'a NeighborList {
    type Item = &'a ScoredRow;
    type IntoIter = std::slice::Iter<'a, ScoredRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranked.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_sorted_ascending() {
        let list = NeighborList::from_candidates(vec![
            ScoredRow::new(0, 8.0),
            ScoredRow::new(1, 0.0),
            ScoredRow::new(2, 1.0),
        ]);
        let ids: Vec<_> = list.iter().map(|r| r.viewer_id).collect();
        assert_eq!(ids, vec![1, 2, 0]);
        assert_eq!(list.nearest().unwrap().viewer_id, 1);
    }

    #[test]
    fn test_ties_by_viewer_id() {
        let list = NeighborList::from_candidates(vec![
            ScoredRow::new(5, 2.0),
            ScoredRow::new(3, 2.0),
            ScoredRow::new(9, 1.0),
            ScoredRow::new(0, 2.0),
        ]);
        let ids: Vec<_> = list.iter().map(|r| r.viewer_id).collect();
        assert_eq!(ids, vec![9, 0, 3, 5]);
    }

    #[test]
    fn test_top_bounds() {
        let list =
            NeighborList::from_candidates(vec![ScoredRow::new(0, 1.0), ScoredRow::new(1, 0.0)]);
        assert_eq!(list.top(1).unwrap().len(), 1);
        assert_eq!(list.top(2).unwrap().len(), 2);
        assert_eq!(list.top(0).unwrap_err().code(), ErrorCode::OutOfRange);
        assert_eq!(list.top(3).unwrap_err().code(), ErrorCode::OutOfRange);
    }
}
