//! Read side over the persisted blocks.

use async_trait::async_trait;
use companion_rpc::CompanionApiServer;
use companion_storage::{BlockStorage, StorageError};
use companion_types::{Block, Header};
use http::StatusCode;
use jsonrpsee::{
    core::RpcResult,
    types::{ErrorCode, ErrorObject, ErrorObjectOwned},
};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

/// JSON-RPC error code returned when nothing is stored at the requested height.
pub const NOT_FOUND_CODE: i32 = -32001;

/// Errors raised while answering a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The request has no `height` parameter.
    #[error("missing height parameter")]
    MissingHeight,

    /// The `height` parameter is not a valid height.
    #[error("invalid height parameter {0:?}")]
    InvalidHeight(String),

    /// Only `GET` is served on the query paths.
    #[error("method {0} not allowed")]
    MethodNotAllowed(String),

    /// Nothing is stored at the requested height.
    #[error("no {kind} stored at height {height}")]
    NotFound {
        /// What was requested.
        kind: QueryKind,
        /// Requested height.
        height: i64,
    },

    /// The store failed.
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),

    /// The response could not be encoded.
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),

    /// The blocking read task failed.
    #[error("query task failed: {0}")]
    Task(String),
}

impl QueryError {
    /// HTTP status of this error on the plain query endpoints.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingHeight | Self::InvalidHeight(_) | Self::MethodNotAllowed(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Storage(_) | Self::Encode(_) | Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QueryError> for ErrorObjectOwned {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::MissingHeight | QueryError::InvalidHeight(_) => {
                ErrorObject::owned(ErrorCode::InvalidParams.code(), err.to_string(), None::<()>)
            }
            QueryError::MethodNotAllowed(_) => ErrorObject::from(ErrorCode::MethodNotFound),
            QueryError::NotFound { .. } => {
                ErrorObject::owned(NOT_FOUND_CODE, err.to_string(), None::<()>)
            }
            QueryError::Storage(_) | QueryError::Encode(_) | QueryError::Task(_) => {
                ErrorObject::from(ErrorCode::InternalError)
            }
        }
    }
}

/// What a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum QueryKind {
    /// The full reassembled block.
    #[display("block")]
    Block,
    /// The header stored by the header-only ingestion mode.
    #[display("header")]
    Header,
}

/// Read-only access to the store for both the plain HTTP endpoints and the JSON-RPC methods.
#[derive(Debug)]
pub struct QueryRpc<St> {
    storage: Arc<St>,
}

impl<St> Clone for QueryRpc<St> {
    fn clone(&self) -> Self {
        Self { storage: self.storage.clone() }
    }
}

impl<St> QueryRpc<St>
where
    St: BlockStorage + 'static,
{
    /// Creates a new [`QueryRpc`].
    pub const fn new(storage: Arc<St>) -> Self {
        Self { storage }
    }

    /// Reads the block at `height`.
    pub async fn block_at(&self, height: i64) -> Result<Block, QueryError> {
        self.read(QueryKind::Block, height, move |storage| storage.get_block(height)).await
    }

    /// Reads the header at `height`.
    pub async fn header_at(&self, height: i64) -> Result<Header, QueryError> {
        self.read(QueryKind::Header, height, move |storage| storage.get_header(height)).await
    }

    async fn read<T, F>(&self, kind: QueryKind, height: i64, f: F) -> Result<T, QueryError>
    where
        T: Send + 'static,
        F: FnOnce(&St) -> Result<T, StorageError> + Send + 'static,
    {
        let storage = self.storage.clone();
        let result = tokio::task::spawn_blocking(move || f(storage.as_ref()))
            .await
            .map_err(|err| QueryError::Task(err.to_string()))?;
        result.map_err(|err| {
            if err.is_not_found() {
                QueryError::NotFound { kind, height }
            } else {
                error!(target: "companion::query", %kind, height, %err, "Failed to read store");
                QueryError::Storage(err)
            }
        })
    }
}

#[async_trait]
impl<St> CompanionApiServer for QueryRpc<St>
where
    St: BlockStorage + 'static,
{
    async fn block(&self, height: i64) -> RpcResult<Block> {
        Ok(self.block_at(height).await?)
    }

    async fn header(&self, height: i64) -> RpcResult<Header> {
        Ok(self.header_at(height).await?)
    }
}
