//! Query RPC server actor.

use crate::{
    HeightQueryLayer, QueryRpc,
    actors::{CancellableContext, CompanionActor},
};
use async_trait::async_trait;
use companion_rpc::CompanionApiServer;
use companion_storage::BlockStorage;
use jsonrpsee::{
    RpcModule,
    core::RegisterMethodError,
    server::{Server, ServerHandle},
};
use std::{net::SocketAddr, sync::Arc};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{error, info};

/// Number of times the server is relaunched after stopping unexpectedly.
pub const DEFAULT_RESTARTS: u32 = 3;

/// An error returned by the [`QueryRpcActor`].
#[derive(Debug, thiserror::Error)]
pub enum QueryRpcActorError {
    /// Failed to register the query methods.
    #[error("Failed to register the query methods")]
    Register(#[from] RegisterMethodError),
    /// Failed to launch the RPC server.
    #[error(transparent)]
    LaunchFailed(#[from] std::io::Error),
    /// The server stopped unexpectedly.
    #[error("RPC server stopped unexpectedly")]
    ServerStopped,
    /// Failed to stop the server.
    #[error("Failed to stop the RPC server")]
    StopFailed,
}

/// Configuration of the [`QueryRpcActor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryRpcConfig {
    /// Listen address.
    pub socket: SocketAddr,
    /// Relaunches allowed after the server stops unexpectedly.
    pub restarts: u32,
}

impl QueryRpcConfig {
    /// Creates a config listening on `socket` with [`DEFAULT_RESTARTS`].
    pub const fn new(socket: SocketAddr) -> Self {
        Self { socket, restarts: DEFAULT_RESTARTS }
    }
}

/// Serves the query endpoints and the `companion` JSON-RPC namespace on one listener.
#[derive(Debug)]
pub struct QueryRpcActor<St> {
    config: QueryRpcConfig,
    storage: Arc<St>,
}

impl<St> QueryRpcActor<St> {
    /// Constructs a new [`QueryRpcActor`].
    pub const fn new(config: QueryRpcConfig, storage: Arc<St>) -> Self {
        Self { config, storage }
    }
}

/// The communication context used by the RPC actor.
#[derive(Debug)]
pub struct QueryRpcContext {
    /// The cancellation token, shared between all tasks.
    pub cancellation: CancellationToken,
}

impl CancellableContext for QueryRpcContext {
    fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }
}

/// Launches the jsonrpsee [`Server`] with the height query middleware in front of it.
pub(crate) async fn launch<St>(
    socket: SocketAddr,
    module: RpcModule<()>,
    query: QueryRpc<St>,
) -> Result<(SocketAddr, ServerHandle), std::io::Error>
where
    St: BlockStorage + 'static,
{
    let middleware = tower::ServiceBuilder::new().layer(HeightQueryLayer::new(query));
    let server = Server::builder().set_http_middleware(middleware).build(socket).await?;
    let addr = server.local_addr()?;
    info!(target: "companion::rpc", %addr, "RPC server bound to address");
    Ok((addr, server.start(module)))
}

#[async_trait]
impl<St> CompanionActor for QueryRpcActor<St>
where
    St: BlockStorage + 'static,
{
    type Error = QueryRpcActorError;
    type StartData = QueryRpcContext;

    async fn start(self, QueryRpcContext { cancellation }: Self::StartData) -> Result<(), Self::Error> {
        let query = QueryRpc::new(self.storage);
        let mut module = RpcModule::new(());
        module.merge(query.clone().into_rpc())?;

        let (_, mut handle) = launch(self.config.socket, module.clone(), query.clone()).await?;

        for _ in 0..self.config.restarts {
            tokio::select! {
                _ = handle.clone().stopped() => {
                    match launch(self.config.socket, module.clone(), query.clone()).await {
                        Ok((_, h)) => handle = h,
                        Err(err) => {
                            error!(target: "companion::rpc", ?err, "Failed to relaunch rpc server");
                            cancellation.cancel();
                            return Err(QueryRpcActorError::ServerStopped);
                        }
                    }
                }
                _ = cancellation.cancelled() => {
                    handle.stop().map_err(|_| QueryRpcActorError::StopFailed)?;
                    return Ok(());
                }
            }
        }

        tokio::select! {
            _ = handle.clone().stopped() => {
                error!(target: "companion::rpc", restarts = self.config.restarts, "RPC server stopped too often");
                cancellation.cancel();
                Err(QueryRpcActorError::ServerStopped)
            }
            _ = cancellation.cancelled() => {
                handle.stop().map_err(|_| QueryRpcActorError::StopFailed)?;
                Ok(())
            }
        }
    }
}
