//! # distknn - distributed k-nearest-neighbor rating prediction
//!
//! Predicts how a user would rate a target item from the ratings other
//! viewers gave it. The rating matrix is split into contiguous row blocks,
//! one per rank; every rank scores its rows against the user's ratings with
//! L1 distance, and rank 0 merges the tagged results into one global ranking
//! and averages the target rating over the k closest viewers.
//!
//! ## Quick Start
//!
//! ```rust
//! use distknn::prelude::*;
//!
//! let matrix = RatingMatrix::from_rows(vec![
//!     vec![1.0, 1.0, 5.0],
//!     vec![1.0, 2.0, 3.0],
//!     vec![5.0, 5.0, 1.0],
//! ]).unwrap();
//! let query = QueryVector::new(vec![1.0, 1.0]).unwrap();
//!
//! // Three ranks: the coordinator plus two worker threads.
//! let config = RunConfig::new().with_target_col(2).with_k(2).with_workers(3);
//! let report = run_prediction(&matrix, &query, &config).unwrap();
//!
//! assert_eq!(report.prediction.value, 4.0);
//! for neighbor in report.nearest() {
//!     println!("viewer {} at distance {:.1}", neighbor.viewer_id + 1, neighbor.distance);
//! }
//! ```
//!
//! ## Driving a cluster directly
//!
//! ```rust
//! use distknn::prelude::*;
//!
//! let matrix = RatingMatrix::from_rows(vec![vec![2.0, 4.0], vec![3.0, 1.0]]).unwrap();
//! let query = QueryVector::new(vec![3.0]).unwrap();
//!
//! let mut cluster = ThreadCluster::spawn(2).unwrap();
//! let coordinator = Coordinator::new(&matrix, 1).unwrap();
//! let (neighbors, _partitions) = coordinator.rank_neighbors(&mut cluster, &query).unwrap();
//! cluster.join().unwrap();
//!
//! assert_eq!(neighbors.nearest().unwrap().viewer_id, 1);
//! ```
//!
//! ## Module Overview
//!
//! - [`data_format`]: rating matrix, query vector, text loader
//! - [`partitioning`]: contiguous row ranges per rank
//! - [`distance_measures`]: L1 scoring of row blocks
//! - [`transport`]: protocol messages, framing, links
//! - [`worker`]: the worker loop
//! - [`cluster`]: thread and process topologies
//! - [`coordinator`]: distribution, gather, merge, prediction
//! - [`ranking`]: merge validation and global ordering
//! - [`predictor`]: k-NN mean, rating distribution and naive Bayes posterior
//! - [`report`]: text output

pub mod cluster;
pub mod coordinator;
pub mod data_format;
pub mod distance_measures;
pub mod partitioning;
pub mod predictor;
pub mod ranking;
pub mod report;
pub mod transport;
pub mod worker;

mod config;
mod error;
mod types;

pub use config::{check_k, RunConfig, TransportKind};
pub use error::{ErrorCode, KnnError, Result};
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cluster::{launch, Cluster, ProcessCluster, ThreadCluster};
    pub use crate::config::{RunConfig, TransportKind};
    pub use crate::coordinator::{run_prediction, Coordinator, RunReport};
    pub use crate::data_format::{load_matrix, parse_matrix, QueryVector, RatingMatrix};
    pub use crate::distance_measures::DistanceEngine;
    pub use crate::error::{ErrorCode, KnnError, Result};
    pub use crate::partitioning::{partition, partition_all, Partition};
    pub use crate::predictor::{
        predict, Prediction, RatingDistribution, RatingPosterior, RatingScale,
    };
    pub use crate::ranking::NeighborList;
    pub use crate::report::{write_distribution, write_posterior, write_report};
    pub use crate::types::*;
    pub use crate::worker::run_worker;
}
