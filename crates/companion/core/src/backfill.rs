//! Bounded catch-up over a range of heights.

use crate::{
    PersistenceWorker, RetryPolicy, WorkerError,
    fetcher::fetch_block,
    node::{BlockSource, RetentionControl},
    queue::Job,
};
use companion_storage::BlockStorage;
use derive_more::Constructor;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Outcome of a [`Backfill`] run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Constructor)]
pub struct BackfillReport {
    /// Heights persisted, including those whose retain height could not be advanced.
    pub persisted: u64,
    /// Heights that could not be fetched or persisted.
    pub failed: u64,
}

/// Fetches and persists a fixed range of heights, one at a time.
///
/// Each height runs through the same worker path as live ingestion. Failures are logged and the
/// height is skipped.
#[derive(Debug)]
pub struct Backfill<S, St, R> {
    source: Arc<S>,
    worker: PersistenceWorker<St, R>,
    retry: RetryPolicy,
}

impl<S, St, R> Backfill<S, St, R>
where
    S: BlockSource + 'static,
    St: BlockStorage + 'static,
    R: RetentionControl + 'static,
{
    /// Creates a new [`Backfill`].
    pub const fn new(source: Arc<S>, worker: PersistenceWorker<St, R>, retry: RetryPolicy) -> Self {
        Self { source, worker, retry }
    }

    /// Backfills heights `from..=from + count`, stopping early if `cancel` fires.
    pub async fn run(&self, from: i64, count: i64, cancel: CancellationToken) -> BackfillReport {
        let mut report = BackfillReport::default();
        let to = from.saturating_add(count);
        info!(target: "companion::backfill", from, to, "Starting backfill");

        for height in from..=to {
            if cancel.is_cancelled() {
                info!(target: "companion::backfill", height, "Backfill cancelled");
                break;
            }

            let block = match fetch_block(self.source.as_ref(), height, self.retry).await {
                Ok(block) => block,
                Err(err) => {
                    error!(target: "companion::backfill", height, %err, "Failed to fetch block");
                    report.failed += 1;
                    continue;
                }
            };

            match self.worker.process(&mut Job::new(block)).await {
                Ok(()) => report.persisted += 1,
                Err(WorkerError::Retention { source, .. }) => {
                    report.persisted += 1;
                    warn!(
                        target: "companion::backfill",
                        height,
                        err = %source,
                        "Block persisted, retain height not advanced"
                    );
                }
                Err(err) => {
                    error!(target: "companion::backfill", height, %err, "Failed to backfill height");
                    report.failed += 1;
                }
            }
        }

        info!(
            target: "companion::backfill",
            persisted = report.persisted,
            failed = report.failed,
            "Backfill finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        RetentionCoordinator,
        config::IngestMode,
        node::{MockBlockSource, MockRetentionControl, NodeClientError},
        worker::tests::{RecordingStorage, block},
    };
    use companion_types::RetainHeights;
    use std::sync::Mutex;

    fn backfill(
        source: MockBlockSource,
        storage: Arc<RecordingStorage>,
        set_calls: Arc<Mutex<Vec<u64>>>,
    ) -> Backfill<MockBlockSource, RecordingStorage, MockRetentionControl> {
        let mut control = MockRetentionControl::new();
        control.expect_block_retain_height().returning(|| Ok(RetainHeights::new(0, 0)));
        control.expect_set_block_retain_height().returning(move |height| {
            set_calls.lock().unwrap().push(height);
            Ok(())
        });
        let retention = Arc::new(RetentionCoordinator::new(Arc::new(control), false));
        let worker = PersistenceWorker::new(storage, retention, IngestMode::Full, RetryPolicy::Drop);
        Backfill::new(Arc::new(source), worker, RetryPolicy::Drop)
    }

    #[tokio::test]
    async fn test_backfill_range_is_inclusive() {
        let mut source = MockBlockSource::new();
        source.expect_block_by_height().returning(|height| Ok(block(height)));
        let storage = Arc::new(RecordingStorage::default());
        let set_calls = Arc::new(Mutex::new(Vec::new()));

        let report = backfill(source, storage.clone(), set_calls.clone())
            .run(5, 3, CancellationToken::new())
            .await;

        assert_eq!(report, BackfillReport::new(4, 0));
        assert_eq!(*storage.inserted.lock().unwrap(), vec![5, 6, 7, 8]);
        assert_eq!(*set_calls.lock().unwrap(), vec![5, 6, 7, 8]);
    }

    #[tokio::test]
    async fn test_backfill_skips_failures() {
        let mut source = MockBlockSource::new();
        source.expect_block_by_height().returning(|height| {
            if height == 2 {
                return Err(NodeClientError::Notification("unavailable".to_string()));
            }
            Ok(block(height))
        });
        let storage = Arc::new(RecordingStorage { failing: vec![3], ..Default::default() });

        let report = backfill(source, storage.clone(), Arc::default())
            .run(1, 3, CancellationToken::new())
            .await;

        assert_eq!(report, BackfillReport::new(2, 2));
        assert_eq!(*storage.inserted.lock().unwrap(), vec![1, 4]);
    }

    #[tokio::test]
    async fn test_retention_failure_still_counts_as_persisted() {
        let mut source = MockBlockSource::new();
        source.expect_block_by_height().returning(|height| Ok(block(height)));
        let mut control = MockRetentionControl::new();
        control.expect_block_retain_height().returning(|| Ok(RetainHeights::new(0, 0)));
        control.expect_set_block_retain_height().returning(|height| {
            if height == 6 {
                return Err(NodeClientError::Notification("privileged service down".to_string()));
            }
            Ok(())
        });
        let storage = Arc::new(RecordingStorage::default());
        let retention = Arc::new(RetentionCoordinator::new(Arc::new(control), false));
        let worker =
            PersistenceWorker::new(storage.clone(), retention, IngestMode::Full, RetryPolicy::Drop);

        let report = Backfill::new(Arc::new(source), worker, RetryPolicy::Drop)
            .run(5, 2, CancellationToken::new())
            .await;

        assert_eq!(report, BackfillReport::new(3, 0));
        assert_eq!(*storage.inserted.lock().unwrap(), vec![5, 6, 7]);
    }

    #[tokio::test]
    async fn test_backfill_stops_when_cancelled() {
        let mut source = MockBlockSource::new();
        source.expect_block_by_height().never();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = backfill(source, Arc::default(), Arc::default()).run(1, 10, cancel).await;
        assert_eq!(report, BackfillReport::default());
    }
}
