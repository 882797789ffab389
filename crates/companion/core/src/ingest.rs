//! Top level ingestion service.

use crate::{
    Backfill, BackfillReport, Fetcher, FetcherError, Lifecycle, LifecycleError, PersistenceWorker,
    RetentionCoordinator, ServiceState,
    config::IngestConfig,
    node::{BlockSource, RetentionControl},
    queue::job_queue,
};
use companion_storage::{BlockStorage, StorageError};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Errors returned by the [`IngestService`].
#[derive(Debug, Error)]
pub enum IngestError {
    /// Invalid start or stop.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The fetcher failed to start or stop.
    #[error(transparent)]
    Fetcher(#[from] FetcherError),

    /// The store is unreachable.
    #[error("storage unavailable: {0}")]
    Storage(#[from] StorageError),
}

/// Wires the node, the store and the retention coordinator into a running pipeline.
#[derive(Debug)]
pub struct IngestService<S, St, R> {
    lifecycle: Lifecycle,
    storage: Arc<St>,
    fetcher: Fetcher<S, St, R>,
}

impl<S, St, R> IngestService<S, St, R>
where
    S: BlockSource + 'static,
    St: BlockStorage + 'static,
    R: RetentionControl + 'static,
{
    /// Creates a new idle [`IngestService`].
    pub fn new(source: Arc<S>, storage: Arc<St>, control: Arc<R>, config: &IngestConfig) -> Self {
        let retry = config.retry.policy();
        let worker = persistence_worker(storage.clone(), control, config);
        Self {
            lifecycle: Lifecycle::new("ingest"),
            storage,
            fetcher: Fetcher::new(source, worker, job_queue(), retry),
        }
    }

    /// Checks the store and starts the fetcher.
    pub async fn start(&mut self) -> Result<(), IngestError> {
        let mut next = self.lifecycle;
        next.start()?;

        self.storage.ping()?;
        match self.storage.latest_height()? {
            Some(height) => info!(target: "companion::ingest", height, "Resuming after stored height"),
            None => info!(target: "companion::ingest", "Store is empty"),
        }
        self.fetcher.start().await?;

        self.lifecycle = next;
        info!(target: "companion::ingest", "Ingest service running");
        Ok(())
    }

    /// Stops the fetcher. Queued jobs are not drained.
    pub fn stop(&mut self) -> Result<(), IngestError> {
        self.lifecycle.stop()?;
        self.fetcher.stop()?;
        info!(target: "companion::ingest", "Ingest service stopped");
        Ok(())
    }

    /// Returns the service state.
    pub const fn state(&self) -> ServiceState {
        self.lifecycle.state()
    }

    /// Returns `true` while the service is running.
    pub const fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// Waits for the pipeline tasks to exit.
    pub async fn join(&mut self) {
        self.fetcher.join().await;
    }
}

/// Runs a one-off [`Backfill`] of `from..=from + count` with the ingest configuration.
pub async fn run_backfill<S, St, R>(
    source: Arc<S>,
    storage: Arc<St>,
    control: Arc<R>,
    config: &IngestConfig,
    (from, count): (i64, i64),
    cancel: CancellationToken,
) -> BackfillReport
where
    S: BlockSource + 'static,
    St: BlockStorage + 'static,
    R: RetentionControl + 'static,
{
    let worker = persistence_worker(storage, control, config);
    Backfill::new(source, worker, config.retry.policy()).run(from, count, cancel).await
}

fn persistence_worker<St, R>(
    storage: Arc<St>,
    control: Arc<R>,
    config: &IngestConfig,
) -> PersistenceWorker<St, R>
where
    St: BlockStorage + 'static,
    R: RetentionControl + 'static,
{
    let retention = Arc::new(RetentionCoordinator::new(
        control,
        config.advance_block_results_retain_height,
    ));
    PersistenceWorker::new(storage, retention, config.mode, config.retry.policy())
}
