//! Envelope of the plain HTTP query endpoints.

/// Protocol version carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Identifier used for responses to plain HTTP requests, which carry no request id.
pub const RESPONSE_ID: &str = "id";

/// A JSON-RPC shaped response body: `{jsonrpc, id, result, error}`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RpcEnvelope<T> {
    /// Always [`JSONRPC_VERSION`].
    pub jsonrpc: String,
    /// Response id.
    pub id: String,
    /// Result on success.
    pub result: Option<T>,
    /// Error on failure.
    pub error: Option<RpcEnvelopeError>,
}

impl<T> RpcEnvelope<T> {
    /// Wraps a successful result.
    pub fn success(result: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: RESPONSE_ID.to_string(),
            result: Some(result),
            error: None,
        }
    }
}

/// Error member of an [`RpcEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RpcEnvelopeError {
    /// Error code.
    pub code: i32,
    /// Short description.
    pub message: String,
    /// Additional detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let json = serde_json::to_value(RpcEnvelope::success(7u64)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "jsonrpc": "2.0", "id": "id", "result": 7, "error": null })
        );
    }
}
