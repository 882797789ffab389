//! The persistence worker: the single consumer of the job queue.

use crate::{
    Metrics, RetentionCoordinator, RetentionError, RetryPolicy,
    config::IngestMode,
    node::RetentionControl,
    queue::{Job, JobReceiver},
};
use companion_storage::{BlockStorage, StorageError};
use companion_types::Block;
use std::{sync::Arc, time::Instant};
use thiserror::Error;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Errors raised while processing one [`Job`].
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The block could not be written to storage.
    #[error("failed to persist block at height {height}: {source}")]
    Persist {
        /// Height of the block.
        height: i64,
        /// Underlying storage error.
        #[source]
        source: StorageError,
    },

    /// The blocking write task panicked or was cancelled.
    #[error("write task for height {height} did not complete: {source}")]
    WriteTask {
        /// Height of the block.
        height: i64,
        /// Join error of the task.
        #[source]
        source: JoinError,
    },

    /// The block was written but the retain height could not be advanced.
    #[error("failed to advance retain height to {height}: {source}")]
    Retention {
        /// Height of the persisted block.
        height: i64,
        /// Underlying retention error.
        #[source]
        source: RetentionError,
    },
}

/// Persists fetched blocks one at a time and advances the node's retain height after every
/// successful write.
#[derive(Debug)]
pub struct PersistenceWorker<St, R> {
    storage: Arc<St>,
    retention: Arc<RetentionCoordinator<R>>,
    mode: IngestMode,
    retry: RetryPolicy,
}

impl<St, R> PersistenceWorker<St, R>
where
    St: BlockStorage + 'static,
    R: RetentionControl + 'static,
{
    /// Creates a new [`PersistenceWorker`].
    pub const fn new(
        storage: Arc<St>,
        retention: Arc<RetentionCoordinator<R>>,
        mode: IngestMode,
        retry: RetryPolicy,
    ) -> Self {
        Self { storage, retention, mode, retry }
    }

    /// Persists the job's block and advances the retain height to its height.
    ///
    /// The job is marked done whether or not the write succeeded.
    pub async fn process(&self, job: &mut Job) -> Result<(), WorkerError> {
        let height = job.height();
        let block = Arc::new(job.block().clone());
        let started = Instant::now();
        let result = self
            .retry
            .run("persist block", || self.write(block.clone()), |err: &WorkerError| {
                matches!(
                    err,
                    WorkerError::Persist { source, .. }
                        if !matches!(source, StorageError::BlockAlreadyExists(_))
                )
            })
            .await;
        Metrics::record_persist(started, &result);
        job.mark_done();
        result?;

        debug!(target: "companion::worker", height, mode = ?self.mode, "Persisted block");
        self.retention
            .advance(height)
            .await
            .map_err(|source| WorkerError::Retention { height, source })?;
        Ok(())
    }

    /// Runs the write on the blocking pool; the store holds its writer lock for the whole insert.
    async fn write(&self, block: Arc<Block>) -> Result<(), WorkerError> {
        let height = block.height();
        let storage = self.storage.clone();
        let mode = self.mode;
        tokio::task::spawn_blocking(move || match mode {
            IngestMode::Full => storage.insert_block(&block),
            IngestMode::Header => storage.insert_header(&block.header),
        })
        .await
        .map_err(|source| WorkerError::WriteTask { height, source })?
        .map_err(|source| WorkerError::Persist { height, source })
    }

    /// Consumes jobs until the queue closes or `cancel` fires.
    ///
    /// A failed job is logged and the loop moves on to the next one. Jobs still queued when
    /// `cancel` fires are dropped.
    pub async fn run(self, mut jobs: JobReceiver, cancel: CancellationToken) {
        info!(target: "companion::worker", mode = ?self.mode, "Persistence worker started");
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!(target: "companion::worker", "Persistence worker cancelled");
                    return;
                }
                job = jobs.recv() => {
                    let Some(mut job) = job else {
                        warn!(target: "companion::worker", "Job queue closed, stopping worker");
                        return;
                    };
                    if let Err(err) = self.process(&mut job).await {
                        error!(target: "companion::worker", %err, "Failed to process job");
                    }
                }
            }
        }
    }
}
