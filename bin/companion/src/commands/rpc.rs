//! `rpc` subcommands.

use super::{load_config, open_storage, run_until_shutdown};
use anyhow::Result;
use clap::Subcommand;
use companion_service::{QueryRpcActor, QueryRpcConfig, QueryRpcContext};
use std::{net::SocketAddr, path::Path};
use tokio_util::sync::CancellationToken;

/// Query service commands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub(crate) enum RpcCommand {
    /// Serve persisted blocks over HTTP and JSON-RPC.
    Start {
        /// Overrides `rpc.listen_address` from the configuration file.
        #[arg(long = "rpc.listen", env = "COMPANION_RPC_LISTEN")]
        listen: Option<SocketAddr>,
    },
}

impl RpcCommand {
    pub(crate) async fn run(self, config_path: &Path) -> Result<()> {
        let config = load_config(config_path)?;
        let storage = open_storage(&config)?;
        let cancellation = CancellationToken::new();

        match self {
            Self::Start { listen } => {
                let socket = listen.unwrap_or(config.rpc.listen_address);
                let actor = QueryRpcActor::new(QueryRpcConfig::new(socket), storage);
                let context = QueryRpcContext { cancellation: cancellation.clone() };
                run_until_shutdown("rpc", actor, context, cancellation).await
            }
        }
    }
}
