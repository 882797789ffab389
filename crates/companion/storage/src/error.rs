use thiserror::Error;

/// Errors that may occur while interacting with the companion storage.
///
/// This enum is used across all implementations of the storage traits.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A statement failed. `op` names the operation that issued it.
    #[error("{op}: {source}")]
    Query {
        /// Short, stable tag of the failed operation.
        op: &'static str,
        /// Underlying database error.
        #[source]
        source: rusqlite::Error,
    },

    /// No pooled read connection could be obtained.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// The expected entry was not found in the database.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// A block or header at this height is already stored.
    #[error("block already exists at height {0}")]
    BlockAlreadyExists(i64),

    /// A header blob could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The writer connection mutex was poisoned by a panicking writer.
    #[error("writer connection lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    /// Returns `true` if the error means the requested entry does not exist.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::EntryNotFound(_))
    }
}

/// Tags a [`rusqlite`] result with the operation that produced it.
pub(crate) trait QueryContext<T> {
    /// Wraps the error, if any, into [`StorageError::Query`].
    fn context(self, op: &'static str) -> Result<T, StorageError>;
}

impl<T> QueryContext<T> for Result<T, rusqlite::Error> {
    fn context(self, op: &'static str) -> Result<T, StorageError> {
        self.map_err(|source| StorageError::Query { op, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_context_keeps_operation_tag() {
        let result: Result<(), rusqlite::Error> = Err(rusqlite::Error::QueryReturnedNoRows);
        let err = result.context("select block").unwrap_err();

        assert!(matches!(err, StorageError::Query { op: "select block", .. }));
        assert!(err.to_string().starts_with("select block: "));
    }
}
