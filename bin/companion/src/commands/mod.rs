//! Subcommands of the companion CLI.

mod ingest;
pub(crate) use ingest::IngestCommand;

mod rpc;
pub(crate) use rpc::RpcCommand;

use anyhow::Context;
use companion_core::Config;
use companion_service::CompanionActor;
use companion_storage::{BlockStorageReader, SqliteStorage};
use std::{path::Path, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Loads and validates the configuration file. An invalid configuration is fatal.
fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::load(path).with_context(|| format!("invalid configuration file {}", path.display()))
}

/// Opens the database named by the configuration.
fn open_storage(config: &Config) -> anyhow::Result<Arc<SqliteStorage>> {
    let storage = SqliteStorage::new(&config.storage.path, config.storage.atomic_block_writes)
        .with_context(|| format!("failed to open database {}", config.storage.path.display()))?;
    storage.ping().context("database not reachable")?;
    Ok(Arc::new(storage))
}

/// Runs `actor` until it exits on its own or the process receives ctrl-c.
async fn run_until_shutdown<A>(
    name: &'static str,
    actor: A,
    context: A::StartData,
    cancellation: CancellationToken,
) -> anyhow::Result<()>
where
    A: CompanionActor,
    A::StartData: 'static,
    A::Error: Send + 'static,
{
    let task = tokio::spawn(actor.start(context));
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!(target: "companion", service = name, "Received ctrl-c, shutting down");
            cancellation.cancel();
        }
        _ = cancellation.cancelled() => {}
    }

    task.await
        .with_context(|| format!("{name} task failed"))?
        .map_err(|err| anyhow::anyhow!("{name} stopped with error: {err:?}"))?;
    info!(target: "companion", service = name, "Stopped");
    Ok(())
}
