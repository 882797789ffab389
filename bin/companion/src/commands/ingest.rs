//! `ingest` subcommands.

use super::{load_config, open_storage, run_until_shutdown};
use anyhow::{Context, Result};
use clap::Subcommand;
use companion_core::{NodeClient, run_backfill};
use companion_service::{IngestActor, IngestContext};
use std::{path::Path, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Ingest service commands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub(crate) enum IngestCommand {
    /// Follow the node and persist every new block.
    Start,
    /// Fetch and persist heights `from..=from + count`, then exit.
    Backfill {
        /// First height to fetch.
        #[arg(long)]
        from: i64,
        /// Number of heights after `from` to fetch.
        #[arg(long)]
        count: i64,
    },
}

impl IngestCommand {
    pub(crate) async fn run(self, config_path: &Path) -> Result<()> {
        let config = load_config(config_path)?;
        let storage = open_storage(&config)?;
        let node = Arc::new(
            NodeClient::connect(&config.node).await.context("failed to connect to the node")?,
        );
        let cancellation = CancellationToken::new();

        match self {
            Self::Start => {
                let actor = IngestActor::new(node.clone(), storage, node, config.ingest);
                let context = IngestContext { cancellation: cancellation.clone() };
                run_until_shutdown("ingest", actor, context, cancellation).await
            }
            Self::Backfill { from, count } => {
                let backfill = run_backfill(
                    node.clone(),
                    storage,
                    node,
                    &config.ingest,
                    (from, count),
                    cancellation.clone(),
                );
                tokio::pin!(backfill);
                let report = tokio::select! {
                    report = &mut backfill => report,
                    _ = tokio::signal::ctrl_c() => {
                        info!(target: "companion", "Received ctrl-c, stopping backfill");
                        cancellation.cancel();
                        backfill.await
                    }
                };
                info!(
                    target: "companion",
                    persisted = report.persisted,
                    failed = report.failed,
                    "Backfill done"
                );
                Ok(())
            }
        }
    }
}
