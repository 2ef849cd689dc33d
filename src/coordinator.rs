//! The coordinator side of the protocol.
//!
//! Rank 0 owns the rating matrix. It ships each worker its rows, broadcasts
//! the query, scores its own rows, and gathers one tagged reply per worker.
//! Replies are matched to the rank whose link they arrived on and checked
//! against that rank's partition before anything is merged, so a missing,
//! short or mislabelled reply aborts the run instead of skewing the ranking.

use crate::cluster::{launch, Cluster};
use crate::config::{check_k, RunConfig};
use crate::data_format::{QueryVector, RatingMatrix};
use crate::distance_measures::DistanceEngine;
use crate::error::{KnnError, Result};
use crate::partitioning::{partition_all, Partition};
use crate::predictor::{predict, Prediction};
use crate::ranking::{merge_partitions, NeighborList, PartitionScores};
use crate::transport::Message;
use crate::types::ScoredRow;
use log::{debug, info, warn};

/// Outcome of one prediction run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Every viewer, ranked by distance to the query.
    pub neighbors: NeighborList,

    /// Mean target rating over the k nearest viewers.
    pub prediction: Prediction,

    /// The column that was predicted.
    pub target_col: usize,

    /// The partition each rank scored.
    pub partitions: Vec<Partition>,
}

impl RunReport {
    /// The k nearest viewers the prediction was made from.
    ///
    /// Empty when `prediction.k` does not fit the neighbor list.
    pub fn nearest(&self) -> &[ScoredRow] {
        self.neighbors.top(self.prediction.k).unwrap_or(&[])
    }
}

/// Drives one run over a fixed cluster.
pub struct Coordinator<'a> {
    matrix: &'a RatingMatrix,
    engine: DistanceEngine,
}

impl<'a> Coordinator<'a> {
    /// Create a coordinator predicting `target_col` of `matrix`.
    pub fn new(matrix: &'a RatingMatrix, target_col: usize) -> Result<Self> {
        matrix.check_column(target_col)?;
        Ok(Self {
            matrix,
            engine: DistanceEngine::new(matrix.num_cols(), target_col)?,
        })
    }

    /// Set the row count at which every rank, workers included, scores in parallel.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.engine = self.engine.with_parallel_threshold(threshold);
        self
    }

    /// The column being predicted.
    pub fn target_col(&self) -> usize {
        self.engine.target_col()
    }

    /// Rank every viewer by distance to `query`, using every rank of `cluster`.
    pub fn rank_neighbors<C: Cluster + ?Sized>(
        &self,
        cluster: &mut C,
        query: &QueryVector,
    ) -> Result<(NeighborList, Vec<Partition>)> {
        query.check_columns(self.matrix.num_cols())?;

        let num_rows = self.matrix.num_rows();
        let partitions = partition_all(num_rows, cluster.size())?;
        for p in partitions.iter().filter(|p| p.is_empty()) {
            warn!(
                "rank {} has an empty partition ({} rows over {} ranks)",
                p.rank,
                num_rows,
                partitions.len()
            );
        }

        self.distribute(cluster, &partitions, query)?;

        let local = partitions[0];
        let local_rows = self.matrix.row_block(local.start, local.count)?;
        let mut parts = Vec::with_capacity(partitions.len());
        parts.push(PartitionScores::new(
            local,
            self.engine.score(local_rows, local.start, query)?,
        ));
        debug!("rank 0 scored rows [{}, {})", local.start, local.end());

        for &expected in &partitions[1..] {
            parts.push(gather(cluster, expected)?);
        }

        for rank in 1..partitions.len() {
            if let Err(e) = cluster.link(rank)?.send(Message::Shutdown) {
                debug!("rank {} left before shutdown: {}", rank, e);
            }
        }

        let candidates = merge_partitions(parts, num_rows)?;
        let neighbors = NeighborList::from_candidates(candidates);
        info!("ranked {} viewers across {} ranks", neighbors.len(), partitions.len());
        Ok((neighbors, partitions))
    }

    /// Rank every viewer and predict the target rating from the `k` nearest.
    pub fn run<C: Cluster + ?Sized>(
        &self,
        cluster: &mut C,
        query: &QueryVector,
        k: usize,
    ) -> Result<RunReport> {
        check_k(k, self.matrix.num_rows())?;

        let (neighbors, partitions) = self.rank_neighbors(cluster, query)?;
        let prediction = predict(&neighbors, k, self.matrix, self.target_col())?;
        info!("predicted {:.3} from the {} nearest viewers", prediction.value, k);

        Ok(RunReport {
            neighbors,
            prediction,
            target_col: self.target_col(),
            partitions,
        })
    }

    fn distribute<C: Cluster + ?Sized>(
        &self,
        cluster: &mut C,
        partitions: &[Partition],
        query: &QueryVector,
    ) -> Result<()> {
        for &p in &partitions[1..] {
            let rows = self.matrix.row_block(p.start, p.count)?.to_vec();
            cluster.link(p.rank)?.send(Message::Assign {
                partition: p,
                num_cols: self.matrix.num_cols(),
                target_col: self.target_col(),
                parallel_threshold: self.engine.parallel_threshold(),
                rows,
            })?;
        }

        for &p in &partitions[1..] {
            cluster.link(p.rank)?.send(Message::Query {
                values: query.values().to_vec(),
            })?;
        }
        Ok(())
    }
}

/// Receive the reply of `expected.rank` and check it covers `expected`.
fn gather<C: Cluster + ?Sized>(cluster: &mut C, expected: Partition) -> Result<PartitionScores> {
    let rank = expected.rank;
    match cluster.link(rank)?.recv()? {
        Message::Scored { partition, rows } => {
            if partition != expected {
                return Err(KnnError::data_loss(format!(
                    "reply tagged rank {} rows [{}, {}), expected rank {} rows [{}, {})",
                    partition.rank,
                    partition.start,
                    partition.end(),
                    expected.rank,
                    expected.start,
                    expected.end()
                ))
                .at_rank(rank));
            }
            let scores = PartitionScores::new(expected, rows);
            scores.validate()?;
            Ok(scores)
        }
        other => Err(KnnError::data_loss(format!(
            "expected scored rows, got a {} message",
            other.kind()
        ))
        .at_rank(rank)),
    }
}

/// Run a full prediction: launch the topology from `config`, rank, predict,
/// and shut the workers down.
///
/// `config.k` must be set. On failure the workers are still torn down and the
/// original error is returned.
pub fn run_prediction(
    matrix: &RatingMatrix,
    query: &QueryVector,
    config: &RunConfig,
) -> Result<RunReport> {
    config.validate(matrix.num_rows())?;
    let k = config
        .k
        .ok_or_else(|| KnnError::invalid_argument("the number of neighbors k is not set"))?;
    let target_col = config.resolve_target_col(matrix.num_cols())?;
    query.check_columns(matrix.num_cols())?;

    let coordinator =
        Coordinator::new(matrix, target_col)?.with_parallel_threshold(config.parallel_threshold);
    let mut cluster = launch(config)?;

    match coordinator.run(cluster.as_mut(), query, k) {
        Ok(report) => {
            cluster.join()?;
            Ok(report)
        }
        Err(err) => {
            if let Err(join_err) = cluster.join() {
                debug!("worker teardown after failed run: {}", join_err);
            }
            Err(err)
        }
    }
}
