//! Launching and tearing down the worker topology.
//!
//! The topology is fixed at launch: rank 0 is the calling thread (the
//! coordinator) and ranks `1..size` are workers, each reachable through its
//! own [`Link`].

use crate::config::{RunConfig, TransportKind};
use crate::error::{KnnError, Result};
use crate::transport::{ChannelLink, Link, StreamLink};
use crate::types::Rank;
use crate::worker::run_worker;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

/// A running set of worker ranks.
pub trait Cluster {
    /// Total number of ranks, including the coordinator.
    fn size(&self) -> usize;

    /// The link to worker `rank` (`1 <= rank < size`).
    fn link(&mut self, rank: Rank) -> Result<&mut dyn Link>;

    /// Close every link and wait for the workers to exit.
    ///
    /// Reports the first worker that failed.
    fn join(&mut self) -> Result<()>;
}

fn missing_link(rank: Rank, size: usize) -> KnnError {
    KnnError::failed_precondition(format!(
        "no worker link for rank {} (cluster size {})",
        rank, size
    ))
}

/// Workers hosted on threads of the current process.
pub struct ThreadCluster {
    size: usize,
    links: Vec<ChannelLink>,
    handles: Vec<(Rank, JoinHandle<Result<()>>)>,
}

impl ThreadCluster {
    /// Spawn `size - 1` worker threads running the standard worker loop.
    pub fn spawn(size: usize) -> Result<Self> {
        Self::spawn_with(size, |mut link, rank| run_worker(&mut link, rank))
    }

    /// Spawn `size - 1` worker threads, each running `worker` with its link and rank.
    pub fn spawn_with<F>(size: usize, worker: F) -> Result<Self>
    where
        F: Fn(ChannelLink, Rank) -> Result<()> + Send + Clone + 'static,
    {
        if size == 0 {
            return Err(KnnError::invalid_argument("cluster size must be at least 1"));
        }

        let mut links = Vec::with_capacity(size - 1);
        let mut handles = Vec::with_capacity(size - 1);
        for rank in 1..size {
            let (coordinator_side, worker_side) = ChannelLink::pair(0, rank);
            let worker = worker.clone();
            let handle = thread::Builder::new()
                .name(format!("distknn-worker-{rank}"))
                .spawn(move || worker(worker_side, rank))
                .map_err(|e| {
                    KnnError::internal(format!("cannot spawn worker thread: {e}")).at_rank(rank)
                })?;
            links.push(coordinator_side);
            handles.push((rank, handle));
        }

        debug!("started {} worker threads", size - 1);
        Ok(Self {
            size,
            links,
            handles,
        })
    }
}

impl Cluster for ThreadCluster {
    fn size(&self) -> usize {
        self.size
    }

    fn link(&mut self, rank: Rank) -> Result<&mut dyn Link> {
        let size = self.size;
        match rank.checked_sub(1).and_then(|i| self.links.get_mut(i)) {
            Some(link) => Ok(link as &mut dyn Link),
            None => Err(missing_link(rank, size)),
        }
    }

    fn join(&mut self) -> Result<()> {
        self.links.clear();

        let mut first_error = None;
        for (rank, handle) in self.handles.drain(..) {
            let outcome = match handle.join() {
                Ok(result) => {
                    result.map_err(|e| KnnError::new(e.code(), e.message()).at_rank(rank))
                }
                Err(_) => Err(KnnError::internal("worker thread panicked").at_rank(rank)),
            };
            if let Err(e) = outcome {
                warn!("worker {} failed: {}", rank, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

type ProcessLink = StreamLink<ChildStdout, ChildStdin>;

/// Workers hosted in child processes of `program`.
///
/// Each child is started as `program worker --rank R` and speaks framed
/// messages on its stdin/stdout. Its stderr is inherited for logging.
pub struct ProcessCluster {
    size: usize,
    program: PathBuf,
    links: Vec<ProcessLink>,
    children: Vec<(Rank, Child)>,
}

impl ProcessCluster {
    /// Launch `size - 1` worker processes.
    pub fn spawn(size: usize, program: impl AsRef<Path>) -> Result<Self> {
        if size == 0 {
            return Err(KnnError::invalid_argument("cluster size must be at least 1"));
        }

        let program = program.as_ref().to_path_buf();
        let mut cluster = Self {
            size,
            program,
            links: Vec::with_capacity(size - 1),
            children: Vec::with_capacity(size - 1),
        };

        for rank in 1..size {
            let mut child = Command::new(&cluster.program)
                .arg("worker")
                .arg("--rank")
                .arg(rank.to_string())
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .spawn()
                .map_err(|e| {
                    KnnError::unavailable(format!(
                        "cannot launch {}: {}",
                        cluster.program.display(),
                        e
                    ))
                    .at_rank(rank)
                })?;

            let stdin = child.stdin.take();
            let stdout = child.stdout.take();
            cluster.children.push((rank, child));
            match (stdout, stdin) {
                (Some(stdout), Some(stdin)) => {
                    cluster.links.push(StreamLink::new(rank, stdout, stdin))
                }
                _ => {
                    return Err(
                        KnnError::internal("worker process has no stdio pipes").at_rank(rank)
                    )
                }
            }
        }

        info!(
            "launched {} worker processes of {}",
            size - 1,
            cluster.program.display()
        );
        Ok(cluster)
    }
}

impl Cluster for ProcessCluster {
    fn size(&self) -> usize {
        self.size
    }

    fn link(&mut self, rank: Rank) -> Result<&mut dyn Link> {
        let size = self.size;
        match rank.checked_sub(1).and_then(|i| self.links.get_mut(i)) {
            Some(link) => Ok(link as &mut dyn Link),
            None => Err(missing_link(rank, size)),
        }
    }

    fn join(&mut self) -> Result<()> {
        // Closing stdin lets any worker still waiting for input exit.
        self.links.clear();

        let mut first_error = None;
        for (rank, mut child) in self.children.drain(..) {
            let outcome = match child.wait() {
                Ok(status) if status.success() => Ok(()),
                Ok(status) => Err(KnnError::unavailable(format!(
                    "worker process exited with {status}"
                ))
                .at_rank(rank)),
                Err(e) => Err(KnnError::internal(format!(
                    "cannot wait for worker process: {e}"
                ))
                .at_rank(rank)),
            };
            if let Err(e) = outcome {
                warn!("worker {} failed: {}", rank, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for ProcessCluster {
    fn drop(&mut self) {
        self.links.clear();
        for (rank, child) in self.children.iter_mut() {
            if let Err(e) = child.kill() {
                debug!("worker {} already gone: {}", rank, e);
            }
            let _ = child.wait();
        }
    }
}

/// Launch the topology described by `config`.
pub fn launch(config: &RunConfig) -> Result<Box<dyn Cluster>> {
    match config.transport {
        TransportKind::Thread => Ok(Box::new(ThreadCluster::spawn(config.workers)?)),
        TransportKind::Process => {
            let program = match &config.worker_program {
                Some(program) => program.clone(),
                None => std::env::current_exe().map_err(|e| {
                    KnnError::internal(format!("cannot locate the running executable: {e}"))
                })?,
            };
            Ok(Box::new(ProcessCluster::spawn(config.workers, program)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::transport::Message;

    #[test]
    fn test_single_rank_has_no_links() {
        let mut cluster = ThreadCluster::spawn(1).unwrap();
        assert_eq!(cluster.size(), 1);
        assert!(cluster.link(0).is_err());
        assert!(cluster.link(1).is_err());
        cluster.join().unwrap();
    }

    #[test]
    fn test_join_reports_failing_rank() {
        let mut cluster = ThreadCluster::spawn_with(3, |_link, rank| {
            if rank == 2 {
                Err(KnnError::internal("boom"))
            } else {
                Ok(())
            }
        })
        .unwrap();
        let err = cluster.join().unwrap_err();
        assert_eq!(err.rank(), Some(2));
        assert_eq!(err.code(), ErrorCode::Internal);
    }

    #[test]
    fn test_join_unblocks_idle_workers() {
        // Workers wait for an assignment that never comes; join must still return.
        let mut cluster = ThreadCluster::spawn(4).unwrap();
        assert_eq!(cluster.link(3).unwrap().peer(), 3);
        let err = cluster.join().unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unavailable);
    }

    #[test]
    fn test_links_reach_their_rank() {
        let mut cluster = ThreadCluster::spawn_with(3, |mut link, rank| {
            link.send(Message::Query {
                values: vec![rank as f64],
            })
        })
        .unwrap();
        for rank in 1..3 {
            let msg = cluster.link(rank).unwrap().recv().unwrap();
            assert_eq!(msg, Message::Query { values: vec![rank as f64] });
        }
        cluster.join().unwrap();
    }

    #[test]
    fn test_missing_program() {
        let result = ProcessCluster::spawn(2, "/nonexistent/distknn-worker");
        let err = result.err().unwrap();
        assert_eq!(err.code(), ErrorCode::Unavailable);
        assert_eq!(err.rank(), Some(1));
    }
}
