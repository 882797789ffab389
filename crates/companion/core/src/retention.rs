//! Cooperative management of the followed node's pruning boundaries.

use crate::{
    Metrics,
    node::{NodeClientError, RetentionControl},
};
use companion_types::RetainHeights;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use thiserror::Error;
use tracing::{debug, info};

/// Errors returned by the [`RetentionCoordinator`].
#[derive(Debug, Error)]
pub enum RetentionError {
    /// A call to the node's control plane failed.
    #[error("retention control call failed: {0}")]
    Node(#[from] NodeClientError),

    /// A negative block height cannot be used as a retain height.
    #[error("height {0} cannot be used as a retain height")]
    InvalidHeight(i64),
}

/// Reads and conditionally advances the pruning service retain heights of the followed node.
///
/// After the block at height `H` was persisted the block retain height is moved to `H` if the
/// node reports a lower value. A height that failed to persist is not tracked, so the boundary
/// can move past it when a later height succeeds. The coordinator never issues a set that is
/// lower than or equal to a value it already set.
#[derive(Debug)]
pub struct RetentionCoordinator<R> {
    control: Arc<R>,
    advance_block_results: bool,
    last_set: AtomicU64,
}

impl<R> RetentionCoordinator<R>
where
    R: RetentionControl,
{
    /// Creates a new [`RetentionCoordinator`].
    ///
    /// With `advance_block_results` set, the block results retain height is moved together with
    /// the block retain height.
    pub const fn new(control: Arc<R>, advance_block_results: bool) -> Self {
        Self { control, advance_block_results, last_set: AtomicU64::new(0) }
    }

    /// Gets the current retain heights of the node.
    pub async fn retain_heights(&self) -> Result<RetainHeights, RetentionError> {
        let heights = self.control.block_retain_height().await?;
        debug!(
            target: "companion::retention",
            app = heights.app,
            pruning_service = heights.pruning_service,
            "Fetched retain heights"
        );
        Ok(heights)
    }

    /// Gets the block results retain height of the node.
    pub async fn block_results_retain_height(&self) -> Result<u64, RetentionError> {
        Ok(self.control.block_results_retain_height().await?)
    }

    /// Sets the block retain height of the node.
    pub async fn set_block_retain_height(&self, height: u64) -> Result<(), RetentionError> {
        self.control.set_block_retain_height(height).await?;
        self.last_set.fetch_max(height, Ordering::SeqCst);
        Metrics::record_retain_height(height);
        info!(target: "companion::retention", height, "Set block retain height");
        Ok(())
    }

    /// Sets the block results retain height of the node.
    pub async fn set_block_results_retain_height(&self, height: u64) -> Result<(), RetentionError> {
        self.control.set_block_results_retain_height(height).await?;
        info!(target: "companion::retention", height, "Set block results retain height");
        Ok(())
    }

    /// Returns the highest block retain height set by this coordinator.
    pub fn last_set(&self) -> u64 {
        self.last_set.load(Ordering::SeqCst)
    }

    /// Moves the retain heights to `height` after the block at `height` was persisted.
    ///
    /// Returns the new retain height, or `None` if the node already retains from a height at
    /// least as high.
    pub async fn advance(&self, height: i64) -> Result<Option<u64>, RetentionError> {
        let height = u64::try_from(height).map_err(|_| RetentionError::InvalidHeight(height))?;

        let current = self.retain_heights().await?;
        if current.pruning_service >= height || self.last_set() >= height {
            debug!(
                target: "companion::retention",
                height,
                pruning_service = current.pruning_service,
                last_set = self.last_set(),
                "Retain height already at or above persisted height"
            );
            return Ok(None);
        }

        self.set_block_retain_height(height).await?;
        if self.advance_block_results {
            self.set_block_results_retain_height(height).await?;
        }
        Ok(Some(height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::MockRetentionControl;
    use mockall::{Sequence, predicate::eq};
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_advance_when_behind() {
        let mut control = MockRetentionControl::new();
        control.expect_block_retain_height().returning(|| Ok(RetainHeights::new(0, 5)));
        control.expect_set_block_retain_height().with(eq(10)).times(1).returning(|_| Ok(()));
        control.expect_set_block_results_retain_height().never();

        let coordinator = RetentionCoordinator::new(Arc::new(control), false);
        assert_eq!(coordinator.advance(10).await.unwrap(), Some(10));
        assert_eq!(coordinator.last_set(), 10);
    }

    #[tokio::test]
    async fn test_no_advance_when_node_is_ahead() {
        let mut control = MockRetentionControl::new();
        control.expect_block_retain_height().returning(|| Ok(RetainHeights::new(0, 12)));
        control.expect_set_block_retain_height().never();

        let coordinator = RetentionCoordinator::new(Arc::new(control), false);
        assert_eq!(coordinator.advance(10).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_advance_block_results_alongside() {
        let mut control = MockRetentionControl::new();
        let mut seq = Sequence::new();
        control.expect_block_retain_height().returning(|| Ok(RetainHeights::new(0, 0)));
        control
            .expect_set_block_retain_height()
            .with(eq(3))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        control
            .expect_set_block_results_retain_height()
            .with(eq(3))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let coordinator = RetentionCoordinator::new(Arc::new(control), true);
        assert_eq!(coordinator.advance(3).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_set_is_monotonic_even_if_node_lags() {
        // The node keeps reporting a stale retain height; only increasing sets may be issued.
        let set_calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = set_calls.clone();
        let mut control = MockRetentionControl::new();
        control.expect_block_retain_height().returning(|| Ok(RetainHeights::new(0, 0)));
        control.expect_set_block_retain_height().returning(move |height| {
            recorded.lock().unwrap().push(height);
            Ok(())
        });

        let coordinator = RetentionCoordinator::new(Arc::new(control), false);
        for height in [4, 2, 4, 7, 6, 9] {
            coordinator.advance(height).await.unwrap();
        }

        let calls = set_calls.lock().unwrap().clone();
        assert_eq!(calls, vec![4, 7, 9]);
        assert!(calls.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn test_negative_height_rejected() {
        let coordinator = RetentionCoordinator::new(Arc::new(MockRetentionControl::new()), false);
        assert!(matches!(coordinator.advance(-1).await, Err(RetentionError::InvalidHeight(-1))));
    }

    #[tokio::test]
    async fn test_control_failure_propagates() {
        let mut control = MockRetentionControl::new();
        control.expect_block_retain_height().returning(|| {
            Err(NodeClientError::Timeout {
                method: "getBlockRetainHeight",
                timeout: std::time::Duration::from_secs(1),
            })
        });

        let coordinator = RetentionCoordinator::new(Arc::new(control), false);
        assert!(matches!(coordinator.advance(1).await, Err(RetentionError::Node(_))));
    }
}
