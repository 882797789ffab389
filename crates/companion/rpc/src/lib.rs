//! JSON-RPC API definitions.
//!
//! - [`NodeBlockApiServer`]: data plane of the followed node.
//! - [`NodePruningApiServer`]: privileged retention control plane of the followed node.
//! - [`CompanionApiServer`]: read side served by the companion.

mod jsonrpsee;
pub use jsonrpsee::{
    CompanionApiClient, CompanionApiServer, NodeBlockApiClient, NodeBlockApiServer,
    NodePruningApiClient, NodePruningApiServer,
};

mod response;
pub use response::{JSONRPC_VERSION, RESPONSE_ID, RpcEnvelope, RpcEnvelopeError};
