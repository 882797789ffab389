//! [CompanionActor] services for the companion.
//!
//! [CompanionActor]: super::CompanionActor

mod traits;
pub use traits::{CancellableContext, CompanionActor};

mod ingest;
pub use ingest::{IngestActor, IngestActorError, IngestContext};

mod rpc;
pub use rpc::{DEFAULT_RESTARTS, QueryRpcActor, QueryRpcActorError, QueryRpcConfig, QueryRpcContext};
