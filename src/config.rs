//! Configuration types for a prediction run.
//!
//! A [`RunConfig`] can be built in code, loaded from JSON, or assembled by
//! the command line. Values that depend on the dataset (the target column
//! default, the upper bound on k) are resolved against the loaded matrix.

use crate::distance_measures::DEFAULT_PARALLEL_THRESHOLD;
use crate::error::{KnnError, Result};
use crate::predictor::RatingScale;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How worker ranks are hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// One thread per worker, channels between them.
    #[default]
    Thread,
    /// One child process per worker, frames over its stdin/stdout.
    Process,
}

/// Main configuration for a prediction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Column being predicted. `None` selects the last column.
    pub target_col: Option<usize>,

    /// Number of neighbors to average. `None` means ask the user.
    pub k: Option<usize>,

    /// Total ranks, including the coordinator.
    pub workers: usize,

    /// How workers are hosted.
    pub transport: TransportKind,

    /// Program launched for process workers. `None` uses the running executable.
    pub worker_program: Option<PathBuf>,

    /// Row count at which a rank scores its partition in parallel.
    pub parallel_threshold: usize,

    /// Levels for the rating distribution report.
    pub scale: RatingScale,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target_col: None,
            k: None,
            workers: 1,
            transport: TransportKind::Thread,
            worker_program: None,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            scale: RatingScale::default(),
        }
    }
}

impl RunConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            KnnError::invalid_argument(format!("cannot read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            KnnError::invalid_argument(format!("invalid config {}: {}", path.display(), e))
        })
    }

    /// Set the target column.
    pub fn with_target_col(mut self, col: usize) -> Self {
        self.target_col = Some(col);
        self
    }

    /// Set the number of neighbors.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    /// Set the number of ranks.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set how workers are hosted.
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Set the program launched for process workers.
    pub fn with_worker_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.worker_program = Some(program.into());
        self
    }

    /// Set the parallel scoring threshold.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Set the rating scale.
    pub fn with_scale(mut self, scale: RatingScale) -> Self {
        self.scale = scale;
        self
    }

    /// Resolve the target column for a matrix with `num_cols` columns.
    pub fn resolve_target_col(&self, num_cols: usize) -> Result<usize> {
        let col = self.target_col.unwrap_or(num_cols.saturating_sub(1));
        if col >= num_cols {
            return Err(KnnError::invalid_argument(format!(
                "target column {} out of range for {} columns",
                col, num_cols
            )));
        }
        Ok(col)
    }

    /// Check the topology and, when set, k against a dataset of `num_rows` rows.
    pub fn validate(&self, num_rows: usize) -> Result<()> {
        if self.workers == 0 {
            return Err(KnnError::invalid_argument("worker count must be at least 1"));
        }
        if let Some(k) = self.k {
            check_k(k, num_rows)?;
        }
        Ok(())
    }
}

/// Check `1 <= k <= num_rows`.
pub fn check_k(k: usize, num_rows: usize) -> Result<()> {
    if k == 0 || k > num_rows {
        return Err(KnnError::out_of_range(format!(
            "k = {} must be between 1 and {} (the number of viewers)",
            k, num_rows
        )));
    }
    Ok(())
}
