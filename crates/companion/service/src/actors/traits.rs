//! [CompanionActor] trait.

use async_trait::async_trait;
use tokio_util::sync::WaitForCancellationFuture;

/// The communication context used by an actor.
pub trait CancellableContext: Send {
    /// Returns a future that resolves when the actor is cancelled.
    fn cancelled(&self) -> WaitForCancellationFuture<'_>;
}

/// A long running service of the companion.
///
/// An actor is built from configuration that is known up front and then started with its
/// [`CompanionActor::StartData`], which carries everything it shares with the other actors.
#[async_trait]
pub trait CompanionActor: Send + 'static {
    /// The error type for the actor.
    type Error: std::fmt::Debug;
    /// The type necessary to pass to the start function.
    type StartData: CancellableContext + Sized;

    /// Starts the actor. Returns when the actor stops or its context is cancelled.
    async fn start(self, start_context: Self::StartData) -> Result<(), Self::Error>;
}
