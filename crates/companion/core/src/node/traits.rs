//! Capabilities of the followed node.

use super::NodeClientError;
use async_trait::async_trait;
use companion_types::{Block, RetainHeights};
use futures::stream::BoxStream;
use std::fmt::Debug;

/// Stream of newly committed heights.
///
/// The stream ends when the subscription is closed by the node.
pub type HeightStream = BoxStream<'static, Result<i64, NodeClientError>>;

/// Data plane of the followed node.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlockSource: Debug + Send + Sync {
    /// Opens a subscription to the height of every newly committed block.
    async fn subscribe_new_heights(&self) -> Result<HeightStream, NodeClientError>;

    /// Fetches the full block at `height`.
    async fn block_by_height(&self, height: i64) -> Result<Block, NodeClientError>;
}

/// Privileged control plane of the followed node, used to move its pruning boundaries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RetentionControl: Debug + Send + Sync {
    /// Gets the application and pruning service block retain heights.
    async fn block_retain_height(&self) -> Result<RetainHeights, NodeClientError>;

    /// Sets the pruning service block retain height.
    async fn set_block_retain_height(&self, height: u64) -> Result<(), NodeClientError>;

    /// Gets the pruning service block results retain height.
    async fn block_results_retain_height(&self) -> Result<u64, NodeClientError>;

    /// Sets the pruning service block results retain height.
    async fn set_block_results_retain_height(&self, height: u64) -> Result<(), NodeClientError>;
}
