//! Bridges the node's height subscription to full block retrieval.

use crate::{
    Lifecycle, LifecycleError, Metrics, PersistenceWorker, RetryPolicy,
    node::{BlockSource, HeightStream, NodeClientError, RetentionControl},
    queue::{Job, JobReceiver, JobSender},
};
use companion_storage::BlockStorage;
use companion_types::Block;
use futures::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Errors returned by the [`Fetcher`].
#[derive(Debug, Error)]
pub enum FetcherError {
    /// Invalid start or stop.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The height subscription could not be opened.
    #[error("failed to subscribe to new heights: {0}")]
    Subscribe(#[from] NodeClientError),
}

/// Reads the height subscription and hands every fetched block to the persistence worker.
///
/// Owns both pipeline tasks: the stream reader and the single persistence worker. The job queue
/// between them is created by the caller and passed in at construction.
#[derive(Debug)]
pub struct Fetcher<S, St, R> {
    source: Arc<S>,
    retry: RetryPolicy,
    lifecycle: Lifecycle,
    cancel: CancellationToken,
    pending: Option<(JobSender, JobReceiver, PersistenceWorker<St, R>)>,
    tasks: Vec<JoinHandle<()>>,
}

impl<S, St, R> Fetcher<S, St, R>
where
    S: BlockSource + 'static,
    St: BlockStorage + 'static,
    R: RetentionControl + 'static,
{
    /// Creates a new idle [`Fetcher`].
    pub fn new(
        source: Arc<S>,
        worker: PersistenceWorker<St, R>,
        (jobs_tx, jobs_rx): (JobSender, JobReceiver),
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            retry,
            lifecycle: Lifecycle::new("fetcher"),
            cancel: CancellationToken::new(),
            pending: Some((jobs_tx, jobs_rx, worker)),
            tasks: Vec::with_capacity(2),
        }
    }

    /// Opens the height subscription and spawns the stream reader and the persistence worker.
    pub async fn start(&mut self) -> Result<(), FetcherError> {
        let mut next = self.lifecycle;
        next.start()?;

        let heights = self.source.subscribe_new_heights().await?;
        let Some((jobs_tx, jobs_rx, worker)) = self.pending.take() else {
            return Err(LifecycleError::AlreadyStarted(self.lifecycle.name()).into());
        };

        self.tasks.push(tokio::spawn(worker.run(jobs_rx, self.cancel.clone())));
        self.tasks.push(tokio::spawn(read_heights(
            self.source.clone(),
            heights,
            jobs_tx,
            self.retry,
            self.cancel.clone(),
        )));

        self.lifecycle = next;
        info!(target: "companion::fetcher", "Fetcher started");
        Ok(())
    }

    /// Releases the subscription and stops both tasks without draining queued jobs.
    pub fn stop(&mut self) -> Result<(), FetcherError> {
        self.lifecycle.stop()?;
        self.cancel.cancel();
        info!(target: "companion::fetcher", "Fetcher stopped");
        Ok(())
    }

    /// Returns `true` while the fetcher is running.
    pub const fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// Waits for both pipeline tasks to exit.
    ///
    /// Returns once the subscription closed and the worker finished the queued jobs, or after
    /// [`Fetcher::stop`].
    pub async fn join(&mut self) {
        for task in self.tasks.drain(..) {
            if let Err(err) = task.await {
                error!(target: "companion::fetcher", %err, "Pipeline task panicked");
            }
        }
    }
}

/// Fetches the block at `height`, applying `retry`.
pub(crate) async fn fetch_block<S>(
    source: &S,
    height: i64,
    retry: RetryPolicy,
) -> Result<Block, NodeClientError>
where
    S: BlockSource + ?Sized,
{
    let result = retry.run("fetch block", move || source.block_by_height(height), |_| true).await;
    Metrics::record_fetch(&result);
    result
}

async fn read_heights<S>(
    source: Arc<S>,
    mut heights: HeightStream,
    jobs: JobSender,
    retry: RetryPolicy,
    cancel: CancellationToken,
) where
    S: BlockSource,
{
    info!(target: "companion::fetcher", "Height stream ready");
    loop {
        let next = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!(target: "companion::fetcher", "Height stream released");
                return;
            }
            next = heights.next() => next,
        };

        let height = match next {
            Some(Ok(height)) => height,
            Some(Err(err)) => {
                error!(target: "companion::fetcher", %err, "Error in height notification");
                continue;
            }
            None => {
                // No reconnect: the pipeline stops with the subscription.
                warn!(target: "companion::fetcher", "Height stream closed");
                return;
            }
        };
        Metrics::record_height_received();
        info!(target: "companion::fetcher", height, "New height");

        let block = match fetch_block(source.as_ref(), height, retry).await {
            Ok(block) => block,
            Err(err) => {
                error!(target: "companion::fetcher", height, %err, "Failed to fetch block, dropping height");
                continue;
            }
        };

        tokio::select! {
            biased;

            _ = cancel.cancelled() => return,
            sent = jobs.send(Job::new(block)) => {
                if sent.is_err() {
                    warn!(target: "companion::fetcher", height, "Job queue closed");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        RetentionCoordinator,
        config::IngestMode,
        node::{MockBlockSource, MockRetentionControl},
        queue::job_queue,
        worker::tests::{RecordingStorage, block},
    };
    use companion_types::RetainHeights;
    use std::{sync::Mutex, time::Duration};

    fn worker(
        storage: Arc<RecordingStorage>,
    ) -> PersistenceWorker<RecordingStorage, MockRetentionControl> {
        let mut control = MockRetentionControl::new();
        control.expect_block_retain_height().returning(|| Ok(RetainHeights::new(0, 0)));
        control.expect_set_block_retain_height().returning(|_| Ok(()));
        let retention = Arc::new(RetentionCoordinator::new(Arc::new(control), false));
        PersistenceWorker::new(storage, retention, IngestMode::Full, RetryPolicy::Drop)
    }

    fn source_with_heights(
        heights: Vec<Result<i64, NodeClientError>>,
        failing: Vec<i64>,
    ) -> MockBlockSource {
        let stream = Mutex::new(Some(heights));
        let mut source = MockBlockSource::new();
        source.expect_subscribe_new_heights().returning(move || {
            let items = stream.lock().unwrap().take().unwrap_or_default();
            Ok(futures::stream::iter(items).boxed())
        });
        source.expect_block_by_height().returning(move |height| {
            if failing.contains(&height) {
                return Err(NodeClientError::Timeout {
                    method: "getByHeight",
                    timeout: Duration::from_secs(1),
                });
            }
            Ok(block(height))
        });
        source
    }

    /// Block source whose fetch latency decreases with height.
    #[derive(Debug)]
    struct SlowSource {
        heights: Vec<i64>,
    }

    #[async_trait::async_trait]
    impl BlockSource for SlowSource {
        async fn subscribe_new_heights(&self) -> Result<HeightStream, NodeClientError> {
            Ok(futures::stream::iter(self.heights.clone().into_iter().map(Ok)).boxed())
        }

        async fn block_by_height(&self, height: i64) -> Result<Block, NodeClientError> {
            let first = self.heights.first().copied().unwrap_or_default();
            let delay = 30u64.saturating_sub(10 * (height - first) as u64);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(block(height))
        }
    }

    #[tokio::test]
    async fn test_blocks_persisted_in_notification_order() {
        let heights = vec![100, 101, 102];
        let storage = Arc::new(RecordingStorage::default());
        let mut fetcher = Fetcher::new(
            Arc::new(SlowSource { heights: heights.clone() }),
            worker(storage.clone()),
            job_queue(),
            RetryPolicy::Drop,
        );

        fetcher.start().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), fetcher.join()).await.unwrap();

        assert_eq!(*storage.inserted.lock().unwrap(), heights);
    }

    #[tokio::test]
    async fn test_failed_fetch_and_bad_notification_are_skipped() {
        let source = source_with_heights(
            vec![
                Ok(1),
                Err(NodeClientError::Notification("garbled".to_string())),
                Ok(2),
                Ok(3),
            ],
            vec![2],
        );
        let storage = Arc::new(RecordingStorage::default());
        let mut fetcher =
            Fetcher::new(Arc::new(source), worker(storage.clone()), job_queue(), RetryPolicy::Drop);

        fetcher.start().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), fetcher.join()).await.unwrap();

        assert_eq!(*storage.inserted.lock().unwrap(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_retry_policy_recovers_failed_fetch() {
        let attempts = Arc::new(Mutex::new(0));
        let counter = attempts.clone();
        let mut source = MockBlockSource::new();
        source.expect_block_by_height().returning(move |height| {
            let mut attempts = counter.lock().unwrap();
            *attempts += 1;
            if *attempts < 3 {
                return Err(NodeClientError::Notification("transient".to_string()));
            }
            Ok(block(height))
        });
        let retry = RetryPolicy::Exponential {
            max_retries: 3,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };

        let fetched = fetch_block(&source, 8, retry).await.unwrap();
        assert_eq!(fetched.height(), 8);
        assert_eq!(*attempts.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_start_and_stop_transitions() {
        let source = source_with_heights(vec![], vec![]);
        let mut fetcher = Fetcher::new(
            Arc::new(source),
            worker(Arc::new(RecordingStorage::default())),
            job_queue(),
            RetryPolicy::Drop,
        );

        assert!(matches!(
            fetcher.stop(),
            Err(FetcherError::Lifecycle(LifecycleError::NotStarted("fetcher")))
        ));
        fetcher.start().await.unwrap();
        assert!(fetcher.is_running());
        assert!(matches!(
            fetcher.start().await,
            Err(FetcherError::Lifecycle(LifecycleError::AlreadyStarted("fetcher")))
        ));

        fetcher.stop().unwrap();
        assert!(!fetcher.is_running());
        assert!(matches!(
            fetcher.stop(),
            Err(FetcherError::Lifecycle(LifecycleError::AlreadyStopped("fetcher")))
        ));
        tokio::time::timeout(Duration::from_secs(5), fetcher.join()).await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribe_failure_leaves_fetcher_idle() {
        let mut source = MockBlockSource::new();
        source.expect_subscribe_new_heights().times(1).returning(|| {
            Err(NodeClientError::InvalidAddress("tcp://nowhere".to_string()))
        });
        let mut fetcher = Fetcher::new(
            Arc::new(source),
            worker(Arc::new(RecordingStorage::default())),
            job_queue(),
            RetryPolicy::Drop,
        );

        assert!(matches!(fetcher.start().await, Err(FetcherError::Subscribe(_))));
        assert!(!fetcher.is_running());
    }
}
