//! Validation and concatenation of per-partition scores.

use crate::error::{KnnError, Result};
use crate::partitioning::Partition;
use crate::types::ScoredRow;
use log::debug;

/// Scores produced for one partition, tagged with the partition they cover.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionScores {
    /// The partition the scores claim to cover.
    pub partition: Partition,

    /// One entry per row of the partition.
    pub rows: Vec<ScoredRow>,
}

impl PartitionScores {
    /// Create a new tagged score set.
    pub fn new(partition: Partition, rows: Vec<ScoredRow>) -> Self {
        Self { partition, rows }
    }

    /// Check that the scores cover exactly the rows of the partition.
    ///
    /// Errors are attributed to the partition's rank.
    pub fn validate(&self) -> Result<()> {
        let p = &self.partition;
        if self.rows.len() != p.count {
            return Err(KnnError::data_loss(format!(
                "expected {} scored rows for [{}, {}), got {}",
                p.count,
                p.start,
                p.end(),
                self.rows.len()
            ))
            .at_rank(p.rank));
        }

        for row in &self.rows {
            if !p.contains(row.viewer_id) {
                return Err(KnnError::data_loss(format!(
                    "viewer {} lies outside partition [{}, {})",
                    row.viewer_id,
                    p.start,
                    p.end()
                ))
                .at_rank(p.rank));
            }
            if !row.distance.is_finite() || row.distance < 0.0 {
                return Err(KnnError::data_loss(format!(
                    "viewer {} has invalid distance {}",
                    row.viewer_id, row.distance
                ))
                .at_rank(p.rank));
            }
        }
        Ok(())
    }
}

/// Merge every partition's scores into one candidate set of `num_rows` entries.
///
/// Each viewer id in `0..num_rows` must appear exactly once across all parts.
pub fn merge_partitions(parts: Vec<PartitionScores>, num_rows: usize) -> Result<Vec<ScoredRow>> {
    for part in &parts {
        part.validate()?;
    }

    let total: usize = parts.iter().map(|p| p.rows.len()).sum();
    if total != num_rows {
        return Err(KnnError::data_loss(format!(
            "merged {} scored rows, expected {}",
            total, num_rows
        )));
    }

    let mut seen = vec![false; num_rows];
    let mut candidates = Vec::with_capacity(num_rows);
    for part in parts {
        for row in part.rows {
            let slot = seen.get_mut(row.viewer_id).ok_or_else(|| {
                KnnError::data_loss(format!("viewer {} out of range", row.viewer_id))
            })?;
            if *slot {
                return Err(KnnError::data_loss(format!(
                    "viewer {} scored twice",
                    row.viewer_id
                ))
                .at_rank(part.partition.rank));
            }
            *slot = true;
            candidates.push(row);
        }
    }

    // total == num_rows and no duplicates, so every slot is set.
    debug_assert!(seen.iter().all(|&s| s));
    debug!("merged {} candidates", candidates.len());
    Ok(candidates)
}
