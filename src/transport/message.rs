//! Protocol messages.

use crate::partitioning::Partition;
use crate::types::{Rating, ScoredRow};
use serde::{Deserialize, Serialize};

/// A message between the coordinator (rank 0) and one worker.
///
/// The exchange with each worker is always
/// `Assign -> Query -> Scored -> Shutdown`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Coordinator to worker: the rows the worker owns.
    Assign {
        partition: Partition,
        num_cols: usize,
        target_col: usize,
        /// Row count at which the worker scores in parallel.
        parallel_threshold: usize,
        /// Row-major, `partition.count * num_cols` values.
        rows: Vec<Rating>,
    },

    /// Coordinator to every worker: the querying user's ratings.
    Query { values: Vec<Rating> },

    /// Worker to coordinator: one score per assigned row, tagged with the
    /// partition they cover.
    Scored {
        partition: Partition,
        rows: Vec<ScoredRow>,
    },

    /// Coordinator to worker: the run is over.
    Shutdown,
}

impl Message {
    /// Short name of the message kind, for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Assign { .. } => "assign",
            Message::Query { .. } => "query",
            Message::Scored { .. } => "scored",
            Message::Shutdown => "shutdown",
        }
    }
}
