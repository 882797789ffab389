//! Ingestion actor.

use crate::actors::{CancellableContext, CompanionActor};
use async_trait::async_trait;
use companion_core::{
    BlockSource, IngestError, IngestService, RetentionControl, config::IngestConfig,
};
use companion_storage::BlockStorage;
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{error, info, warn};

/// An error returned by the [`IngestActor`].
#[derive(Debug, thiserror::Error)]
pub enum IngestActorError {
    /// The ingest service failed to start or stop.
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

/// The communication context used by the ingest actor.
#[derive(Debug)]
pub struct IngestContext {
    /// The cancellation token, shared between all tasks.
    pub cancellation: CancellationToken,
}

impl CancellableContext for IngestContext {
    fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }
}

/// Runs the [`IngestService`] until the height stream closes or the context is cancelled.
#[derive(Debug)]
pub struct IngestActor<S, St, R> {
    source: Arc<S>,
    storage: Arc<St>,
    control: Arc<R>,
    config: IngestConfig,
}

impl<S, St, R> IngestActor<S, St, R> {
    /// Constructs a new [`IngestActor`].
    pub const fn new(
        source: Arc<S>,
        storage: Arc<St>,
        control: Arc<R>,
        config: IngestConfig,
    ) -> Self {
        Self { source, storage, control, config }
    }
}

#[async_trait]
impl<S, St, R> CompanionActor for IngestActor<S, St, R>
where
    S: BlockSource + 'static,
    St: BlockStorage + 'static,
    R: RetentionControl + 'static,
{
    type Error = IngestActorError;
    type StartData = IngestContext;

    async fn start(self, IngestContext { cancellation }: Self::StartData) -> Result<(), Self::Error> {
        let mut service = IngestService::new(self.source, self.storage, self.control, &self.config);
        if let Err(err) = service.start().await {
            error!(target: "companion::ingest", %err, "Failed to start ingest service");
            cancellation.cancel();
            return Err(err.into());
        }

        tokio::select! {
            _ = service.join() => {
                // The stream closed; the companion does not resubscribe.
                warn!(target: "companion::ingest", "Ingestion pipeline exited");
                service.stop()?;
                cancellation.cancel();
            }
            _ = cancellation.cancelled() => {
                info!(target: "companion::ingest", "Received shutdown signal");
                service.stop()?;
            }
        }
        Ok(())
    }
}
