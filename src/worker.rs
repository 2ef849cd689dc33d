//! The worker side of the protocol.
//!
//! A worker owns nothing until the coordinator assigns it a block of rows.
//! It then waits for the query, scores its rows, replies with the tagged
//! scores and waits to be shut down.

use crate::data_format::QueryVector;
use crate::distance_measures::DistanceEngine;
use crate::error::{ErrorCode, KnnError, Result};
use crate::partitioning::Partition;
use crate::transport::{Link, Message};
use crate::types::{Rank, Rating};
use log::{debug, info};

/// The rows a worker was given and the engine configured to score them.
#[derive(Debug, Clone)]
pub struct Assignment {
    /// Rows owned by this worker.
    pub partition: Partition,

    /// Scoring engine built from the coordinator's settings.
    pub engine: DistanceEngine,

    /// Row-major values of the partition.
    pub rows: Vec<Rating>,
}

impl Assignment {
    /// Accept an `Assign` message addressed to `rank`.
    pub fn accept(msg: Message, rank: Rank) -> Result<Self> {
        match msg {
            Message::Assign {
                partition,
                num_cols,
                target_col,
                parallel_threshold,
                rows,
            } => {
                if partition.rank != rank {
                    return Err(KnnError::failed_precondition(format!(
                        "rank {} was assigned the partition of rank {}",
                        rank, partition.rank
                    )));
                }
                if rows.len() != partition.count * num_cols {
                    return Err(KnnError::data_loss(format!(
                        "assignment carries {} values, expected {} rows of {} columns",
                        rows.len(),
                        partition.count,
                        num_cols
                    )));
                }
                let engine = DistanceEngine::new(num_cols, target_col)?
                    .with_parallel_threshold(parallel_threshold);
                Ok(Self {
                    partition,
                    engine,
                    rows,
                })
            }
            other => Err(unexpected(rank, "assign", &other)),
        }
    }

    /// Score the assigned rows against `query`.
    pub fn score(&self, query: &QueryVector) -> Result<Message> {
        Ok(Message::Scored {
            partition: self.partition,
            rows: self.engine.score(&self.rows, self.partition.start, query)?,
        })
    }
}

/// Serve one prediction run for `rank` over `link`.
///
/// Returns once the coordinator sends `Shutdown` or hangs up after the
/// scores were delivered. A coordinator that hangs up earlier is an error.
pub fn run_worker<L: Link + ?Sized>(link: &mut L, rank: Rank) -> Result<()> {
    let assignment = match link.recv()? {
        Message::Shutdown => {
            debug!("rank {} shut down before assignment", rank);
            return Ok(());
        }
        msg => Assignment::accept(msg, rank)?,
    };
    let partition = assignment.partition;
    debug!(
        "rank {} assigned rows [{}, {})",
        rank,
        partition.start,
        partition.end()
    );

    let query = match link.recv()? {
        Message::Query { values } => QueryVector::new(values)?,
        Message::Shutdown => return Ok(()),
        other => return Err(unexpected(rank, "query", &other)),
    };

    link.send(assignment.score(&query)?)?;
    info!("rank {} scored {} rows", rank, partition.count);

    match link.recv() {
        Ok(Message::Shutdown) => Ok(()),
        Ok(other) => Err(unexpected(rank, "shutdown", &other)),
        Err(e) if e.code() == ErrorCode::Unavailable => Ok(()),
        Err(e) => Err(e),
    }
}

fn unexpected(rank: Rank, expected: &str, got: &Message) -> KnnError {
    KnnError::failed_precondition(format!(
        "rank {} expected a {} message, got {}",
        rank,
        expected,
        got.kind()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelLink;
    use std::thread;

    fn assign(rank: Rank, start: usize, count: usize, rows: Vec<f64>) -> Message {
        Message::Assign {
            partition: Partition::new(rank, start, count),
            num_cols: 3,
            target_col: 2,
            parallel_threshold: 4096,
            rows,
        }
    }

    #[test]
    fn test_worker_round_trip() {
        let (mut coord, mut worker) = ChannelLink::pair(0, 1);
        let handle = thread::spawn(move || run_worker(&mut worker, 1));

        coord.send(assign(1, 2, 1, vec![5.0, 5.0, 1.0])).unwrap();
        coord.send(Message::Query { values: vec![1.0, 1.0] }).unwrap();

        match coord.recv().unwrap() {
            Message::Scored { partition, rows } => {
                assert_eq!(partition, Partition::new(1, 2, 1));
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].viewer_id, 2);
                assert_eq!(rows[0].distance, 8.0);
            }
            other => panic!("unexpected {:?}", other),
        }

        coord.send(Message::Shutdown).unwrap();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_assignment_applies_parallel_threshold() {
        let msg = Message::Assign {
            partition: Partition::new(2, 0, 2),
            num_cols: 2,
            target_col: 0,
            parallel_threshold: usize::MAX,
            rows: vec![1.0, 2.0, 3.0, 4.0],
        };
        let assignment = Assignment::accept(msg, 2).unwrap();
        assert_eq!(assignment.engine.parallel_threshold(), usize::MAX);
        assert_eq!(assignment.engine.target_col(), 0);

        let scored = assignment.score(&QueryVector::new(vec![3.0]).unwrap()).unwrap();
        match scored {
            Message::Scored { rows, .. } => {
                let distances: Vec<_> = rows.iter().map(|r| r.distance).collect();
                assert_eq!(distances, vec![1.0, 1.0]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_worker_rejects_wrong_rank() {
        let (mut coord, mut worker) = ChannelLink::pair(0, 2);
        coord.send(assign(1, 0, 0, vec![])).unwrap();
        let err = run_worker(&mut worker, 2).unwrap_err();
        assert_eq!(err.code(), ErrorCode::FailedPrecondition);
    }

    #[test]
    fn test_assignment_rejects_short_rows() {
        let err = Assignment::accept(assign(1, 0, 2, vec![1.0, 2.0, 3.0]), 1).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DataLoss);
    }

    #[test]
    fn test_worker_rejects_out_of_order() {
        let (mut coord, mut worker) = ChannelLink::pair(0, 1);
        coord.send(Message::Query { values: vec![1.0] }).unwrap();
        assert!(run_worker(&mut worker, 1).is_err());
    }

    #[test]
    fn test_worker_fails_when_coordinator_vanishes() {
        let (coord, mut worker) = ChannelLink::pair(0, 1);
        drop(coord);
        let err = run_worker(&mut worker, 1).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unavailable);
    }

    #[test]
    fn test_empty_partition_is_noop() {
        let (mut coord, mut worker) = ChannelLink::pair(0, 3);
        let handle = thread::spawn(move || run_worker(&mut worker, 3));
        coord
            .send(Message::Assign {
                partition: Partition::new(3, 5, 0),
                num_cols: 4,
                target_col: 3,
                parallel_threshold: 4096,
                rows: vec![],
            })
            .unwrap();
        coord.send(Message::Query { values: vec![1.0, 2.0, 3.0] }).unwrap();
        match coord.recv().unwrap() {
            Message::Scored { rows, .. } => assert!(rows.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
        drop(coord);
        handle.join().unwrap().unwrap();
    }
}
