//! Relational storage for the companion.
//!
//! Blocks are decomposed into a handful of SQLite tables on insert and reassembled on read:
//! - block scalars (block id, header, last commit) keyed by height
//! - transactions and commit signatures as ordered child rows
//! - duplicate vote and light client attack evidence, the latter linked to a shared
//!   validator table through a join table
//!
//! A narrower header-only path stores the serialized [`Header`](companion_types::Header) keyed by
//! height.

mod error;
pub use error::StorageError;

mod schema;

mod providers;

mod sqlite;
pub use sqlite::SqliteStorage;

mod traits;
pub use traits::{BlockStorage, BlockStorageReader, BlockStorageWriter};
