use crate::StorageError;
use companion_types::{Block, Header};

/// Provides read access to persisted blocks and headers.
///
/// Implementations are expected to be safe to call concurrently with a writer.
pub trait BlockStorageReader {
    /// Reassembles the full [`Block`] stored at `height`.
    ///
    /// # Returns
    /// * `Ok(Block)` with empty collections for any missing substructure.
    /// * `Err(StorageError::EntryNotFound)` if no block is stored at `height`.
    fn get_block(&self, height: i64) -> Result<Block, StorageError>;

    /// Gets the [`Header`] stored by the header-only ingestion path at `height`.
    fn get_header(&self, height: i64) -> Result<Header, StorageError>;

    /// Returns the highest stored block height, or `None` for an empty store.
    fn latest_height(&self) -> Result<Option<i64>, StorageError>;

    /// Checks that the store is reachable.
    fn ping(&self) -> Result<(), StorageError>;
}

/// Persists blocks and headers.
pub trait BlockStorageWriter {
    /// Decomposes and stores a full [`Block`].
    ///
    /// # Returns
    /// * `Ok(())` if every sub-insert succeeded.
    /// * `Err(StorageError::BlockAlreadyExists)` if the height is already stored. No row is
    ///   written in this case.
    /// * `Err(StorageError)` for any other failure. Unless the store was opened with atomic
    ///   block writes, rows written before the failure are kept.
    fn insert_block(&self, block: &Block) -> Result<(), StorageError>;

    /// Stores a serialized [`Header`] keyed by its height.
    fn insert_header(&self, header: &Header) -> Result<(), StorageError>;
}

/// Combines [`BlockStorageReader`] and [`BlockStorageWriter`].
pub trait BlockStorage: BlockStorageReader + BlockStorageWriter + Send + Sync {}

impl<T> BlockStorage for T where T: BlockStorageReader + BlockStorageWriter + Send + Sync {}
