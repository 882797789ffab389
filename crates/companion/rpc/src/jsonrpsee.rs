//! Using the proc_macro to generate the client and server code.
//! Default namespace separator is `_`.

use companion_types::{Block, Header, RetainHeights};
use jsonrpsee::{
    core::{RpcResult, SubscriptionResult},
    proc_macros::rpc,
};

/// Block data plane exposed by the followed node.
#[rpc(client, server, namespace = "block")]
pub trait NodeBlockApi {
    /// Subscribe to the height of every newly committed block.
    #[subscription(
        name = "subscribeLatestHeight",
        item = i64,
        unsubscribe = "unsubscribeLatestHeight"
    )]
    async fn subscribe_latest_height(&self) -> SubscriptionResult;

    /// Get the full block at the given height.
    #[method(name = "getByHeight")]
    async fn get_by_height(&self, height: i64) -> RpcResult<Block>;
}

/// Privileged retention control plane exposed by the followed node.
#[rpc(client, server, namespace = "pruning")]
pub trait NodePruningApi {
    /// Get the application and pruning service block retain heights.
    #[method(name = "getBlockRetainHeight")]
    async fn get_block_retain_height(&self) -> RpcResult<RetainHeights>;

    /// Set the pruning service block retain height.
    #[method(name = "setBlockRetainHeight")]
    async fn set_block_retain_height(&self, height: u64) -> RpcResult<()>;

    /// Get the pruning service block results retain height.
    #[method(name = "getBlockResultsRetainHeight")]
    async fn get_block_results_retain_height(&self) -> RpcResult<u64>;

    /// Set the pruning service block results retain height.
    #[method(name = "setBlockResultsRetainHeight")]
    async fn set_block_results_retain_height(&self, height: u64) -> RpcResult<()>;
}

/// Read side served by the companion over persisted data.
#[rpc(client, server, namespace = "companion")]
pub trait CompanionApi {
    /// Get the persisted block at the given height.
    #[method(name = "block")]
    async fn block(&self, height: i64) -> RpcResult<Block>;

    /// Get the persisted header at the given height.
    #[method(name = "header")]
    async fn header(&self, height: i64) -> RpcResult<Header>;
}
