//! Contiguous row partitioning across workers.
//!
//! Rows are split into blocks of `ceil(n / workers)`; the last worker absorbs
//! whatever remains. Blocks are clamped to `n`, so small datasets leave the
//! highest ranks with empty partitions.

use crate::error::{KnnError, Result};
use crate::types::{Rank, ViewerId};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A half-open row range `[start, start + count)` owned by one rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition {
    /// Rank that owns the rows.
    pub rank: Rank,

    /// First global row index.
    pub start: ViewerId,

    /// Number of rows.
    pub count: usize,
}

impl Partition {
    /// Create a partition.
    pub fn new(rank: Rank, start: ViewerId, count: usize) -> Self {
        Self { rank, start, count }
    }

    /// One past the last row.
    pub fn end(&self) -> ViewerId {
        self.start + self.count
    }

    /// Check if the partition holds no rows.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The rows as a range.
    pub fn range(&self) -> Range<ViewerId> {
        self.start..self.end()
    }

    /// Check if a global row index falls inside this partition.
    pub fn contains(&self, viewer: ViewerId) -> bool {
        self.range().contains(&viewer)
    }
}

/// Compute the partition of `num_rows` rows owned by `rank` out of `worker_count`.
pub fn partition(num_rows: usize, worker_count: usize, rank: Rank) -> Result<Partition> {
    if worker_count == 0 {
        return Err(KnnError::failed_precondition("worker count must be at least 1"));
    }
    if rank >= worker_count {
        return Err(KnnError::failed_precondition(format!(
            "rank {} out of range for {} workers",
            rank, worker_count
        )));
    }

    let base = num_rows.div_ceil(worker_count);
    let start = (rank * base).min(num_rows);
    let count = if rank == worker_count - 1 {
        num_rows - start
    } else {
        base.min(num_rows - start)
    };

    Ok(Partition::new(rank, start, count))
}

/// Compute the partitions of every rank, in rank order.
pub fn partition_all(num_rows: usize, worker_count: usize) -> Result<Vec<Partition>> {
    (0..worker_count.max(1))
        .map(|rank| partition(num_rows, worker_count, rank))
        .collect()
}
