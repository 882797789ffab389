//! [`NodeClient`] implementation for talking to the followed node.

use super::{BlockSource, HeightStream, NodeClientError, RetentionControl};
use crate::config::NodeConfig;
use async_trait::async_trait;
use companion_rpc::{NodeBlockApiClient, NodePruningApiClient};
use companion_types::{Block, RetainHeights};
use futures::{StreamExt, TryFutureExt};
use jsonrpsee::{
    core::ClientError,
    http_client::{HttpClient, HttpClientBuilder},
    ws_client::{WsClient, WsClientBuilder},
};
use std::{future::Future, time::Duration};
use tracing::{debug, error, info};
use url::Url;

/// JSON-RPC client of the followed node.
///
/// Block data is read over a WebSocket connection, which also carries the height subscription.
/// Retain heights are read and written over plain HTTP on the privileged address. Neither
/// connection is authenticated or encrypted.
#[derive(Debug)]
pub struct NodeClient {
    data: WsClient,
    privileged: HttpClient,
    timeout: Duration,
}

impl NodeClient {
    /// Connects to the followed node.
    pub async fn connect(config: &NodeConfig) -> Result<Self, NodeClientError> {
        let timeout = config.request_timeout();

        let ws_url = endpoint_url(&config.address, "ws")?;
        info!(target: "companion::node", url = %ws_url, "Connecting to node data plane");
        let data = WsClientBuilder::default()
            .request_timeout(timeout)
            .connection_timeout(timeout)
            .build(ws_url.as_str())
            .await
            .inspect_err(|err| {
                error!(target: "companion::node", %err, "Failed to connect to node data plane");
            })?;

        let http_url = endpoint_url(&config.privileged_address, "http")?;
        info!(target: "companion::node", url = %http_url, "Using node privileged plane");
        let privileged =
            HttpClientBuilder::default().request_timeout(timeout).build(http_url.as_str())?;

        Ok(Self { data, privileged, timeout })
    }

    async fn timed<T>(
        &self,
        method: &'static str,
        call: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, NodeClientError> {
        let timeout = self.timeout;
        let result = tokio::time::timeout(timeout, call.map_err(NodeClientError::from))
            .await
            .map_err(|_| NodeClientError::Timeout { method, timeout })?;
        if let Err(err) = &result {
            error!(target: "companion::node", method, %err, "Node call failed");
        }
        result
    }
}

/// Turns a configured `scheme://host:port` address into a client url.
///
/// `tcp://` addresses are rewritten to `default_scheme`; other schemes are kept as given.
fn endpoint_url(address: &str, default_scheme: &str) -> Result<Url, NodeClientError> {
    let (scheme, rest) = address
        .split_once("://")
        .ok_or_else(|| NodeClientError::InvalidAddress(address.to_string()))?;
    let scheme = if scheme == "tcp" { default_scheme } else { scheme };
    Url::parse(&format!("{scheme}://{rest}"))
        .map_err(|_| NodeClientError::InvalidAddress(address.to_string()))
}

#[async_trait]
impl BlockSource for NodeClient {
    async fn subscribe_new_heights(&self) -> Result<HeightStream, NodeClientError> {
        let subscription =
            self.timed("subscribeLatestHeight", self.data.subscribe_latest_height()).await?;
        info!(target: "companion::node", "Height subscription started");
        Ok(subscription
            .map(|item| item.map_err(|err| NodeClientError::Notification(err.to_string())))
            .boxed())
    }

    async fn block_by_height(&self, height: i64) -> Result<Block, NodeClientError> {
        let block = self.timed("getByHeight", self.data.get_by_height(height)).await?;
        debug!(target: "companion::node", height, "Fetched block");
        Ok(block)
    }
}

#[async_trait]
impl RetentionControl for NodeClient {
    async fn block_retain_height(&self) -> Result<RetainHeights, NodeClientError> {
        self.timed("getBlockRetainHeight", self.privileged.get_block_retain_height()).await
    }

    async fn set_block_retain_height(&self, height: u64) -> Result<(), NodeClientError> {
        self.timed("setBlockRetainHeight", self.privileged.set_block_retain_height(height)).await
    }

    async fn block_results_retain_height(&self) -> Result<u64, NodeClientError> {
        self.timed("getBlockResultsRetainHeight", self.privileged.get_block_results_retain_height())
            .await
    }

    async fn set_block_results_retain_height(&self, height: u64) -> Result<(), NodeClientError> {
        self.timed(
            "setBlockResultsRetainHeight",
            self.privileged.set_block_results_retain_height(height),
        )
        .await
    }
}
