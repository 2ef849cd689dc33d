//! Cross-worker merge and global ranking.
//!
//! Workers return every local score; the coordinator checks that the union is
//! complete and then sorts once globally. Local pre-filtering is never applied.

mod merge;
mod neighbors;

pub use merge::{merge_partitions, PartitionScores};
pub use neighbors::NeighborList;
