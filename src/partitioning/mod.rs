//! Partitioning of the rating matrix across workers.

mod partitioner;

pub use partitioner::{partition, partition_all, Partition};
