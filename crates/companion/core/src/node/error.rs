use std::time::Duration;
use thiserror::Error;

/// Errors returned by calls to the followed node.
#[derive(Debug, Error)]
pub enum NodeClientError {
    /// The JSON-RPC call failed.
    #[error("client error: {0}")]
    Client(#[from] jsonrpsee::core::ClientError),

    /// The call did not complete within the configured timeout.
    #[error("{method} timed out after {timeout:?}")]
    Timeout {
        /// Name of the remote method.
        method: &'static str,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// A configured node address could not be turned into a client url.
    #[error("invalid node address {0}")]
    InvalidAddress(String),

    /// A height notification could not be decoded.
    #[error("invalid height notification: {0}")]
    Notification(String),
}
