//! Main database access structure.

use crate::{
    StorageError,
    error::QueryContext,
    providers::{BlockProvider, HeaderProvider},
    schema::{configure_connection, init_schema},
    traits::{BlockStorageReader, BlockStorageWriter},
};
use companion_types::{Block, Header};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use std::{
    path::Path,
    sync::{Mutex, MutexGuard},
};
use tracing::{debug, info};

/// Maximum number of pooled read connections for an on-disk database.
const READ_POOL_SIZE: u32 = 4;

/// SQLite backed block storage.
///
/// Reads go through a small connection pool while all writes are serialized on one dedicated
/// writer connection. WAL mode lets readers proceed while a block is being written, which also
/// means a concurrent reader can observe a partially written block unless `atomic_writes` is set.
#[derive(Debug)]
pub struct SqliteStorage {
    read_pool: Pool<SqliteConnectionManager>,
    writer: Mutex<Connection>,
    atomic_writes: bool,
}

impl SqliteStorage {
    /// Creates or opens a database at the given path.
    ///
    /// With `atomic_writes` set every [`BlockStorageWriter::insert_block`] runs in a single
    /// transaction; otherwise rows written before a failure are kept.
    pub fn new(path: &Path, atomic_writes: bool) -> Result<Self, StorageError> {
        let writer = Connection::open(path).context("open database")?;
        configure_connection(&writer).context("configure connection")?;
        init_schema(&writer).context("init schema")?;

        let manager = SqliteConnectionManager::file(path)
            .with_flags(OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX)
            .with_init(|conn| configure_connection(conn));
        let read_pool = Pool::builder().max_size(READ_POOL_SIZE).build(manager)?;

        info!(target: "companion::storage", path = %path.display(), atomic_writes, "Opened database");
        Ok(Self { read_pool, writer: Mutex::new(writer), atomic_writes })
    }

    /// Creates an in-memory database.
    ///
    /// In-memory SQLite databases are per-connection, so a named shared-cache URI is used for
    /// the writer and pooled readers to see the same data.
    pub fn in_memory(atomic_writes: bool) -> Result<Self, StorageError> {
        let uri = format!("file:companion_{}?mode=memory&cache=shared", unique_id());
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let writer = Connection::open_with_flags(&uri, flags).context("open database")?;
        configure_connection(&writer).context("configure connection")?;
        init_schema(&writer).context("init schema")?;

        let manager = SqliteConnectionManager::file(&uri)
            .with_flags(flags)
            .with_init(|conn| configure_connection(conn));
        let read_pool = Pool::builder().max_size(2).build(manager)?;

        Ok(Self { read_pool, writer: Mutex::new(writer), atomic_writes })
    }

    fn read_conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        Ok(self.read_pool.get()?)
    }

    fn writer(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.writer.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl BlockStorageReader for SqliteStorage {
    fn get_block(&self, height: i64) -> Result<Block, StorageError> {
        let conn = self.read_conn()?;
        BlockProvider::new(&conn).get_block(height)
    }

    fn get_header(&self, height: i64) -> Result<Header, StorageError> {
        let conn = self.read_conn()?;
        HeaderProvider::new(&conn).get_header(height)
    }

    fn latest_height(&self) -> Result<Option<i64>, StorageError> {
        let conn = self.read_conn()?;
        BlockProvider::new(&conn).latest_height()
    }

    fn ping(&self) -> Result<(), StorageError> {
        let conn = self.read_conn()?;
        conn.query_row("SELECT 1", [], |_| Ok(())).context("ping")
    }
}

impl BlockStorageWriter for SqliteStorage {
    fn insert_block(&self, block: &Block) -> Result<(), StorageError> {
        let mut conn = self.writer()?;
        if !self.atomic_writes {
            BlockProvider::new(&conn).insert_block(block)?;
        } else {
            let tx = conn.transaction().context("begin transaction")?;
            BlockProvider::new(&tx).insert_block(block)?;
            tx.commit().context("commit transaction")?;
        }
        debug!(target: "companion::storage", height = block.height(), "Stored block");
        Ok(())
    }

    fn insert_header(&self, header: &Header) -> Result<(), StorageError> {
        let conn = self.writer()?;
        HeaderProvider::new(&conn).insert_header(header)?;
        debug!(target: "companion::storage", height = header.height, "Stored header");
        Ok(())
    }
}

/// Generate a unique id for in-memory shared-cache databases.
fn unique_id() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bytes;
    use companion_types::{Commit, Evidence};
    use rstest::rstest;
    use tempfile::TempDir;

    fn block(height: i64) -> Block {
        Block {
            header: Header { chain_id: "test-chain".to_string(), height, ..Default::default() },
            txs: vec![Bytes::from_static(b"tx")],
            last_commit: Commit { height: height - 1, ..Default::default() },
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_open_db() {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let db_path = tmp_dir.path().join("companion.db");

        let storage = SqliteStorage::new(&db_path, false).expect("open database");
        storage.ping().expect("ping");
        storage.insert_block(&block(1)).expect("insert block");
        drop(storage);

        let reopened = SqliteStorage::new(&db_path, false).expect("reopen database");
        assert_eq!(reopened.latest_height().expect("latest height"), Some(1));
    }

    #[rstest]
    #[case::plain(false)]
    #[case::atomic(true)]
    fn test_readers_see_writes(#[case] atomic_writes: bool) {
        let storage = SqliteStorage::in_memory(atomic_writes).expect("open database");
        storage.insert_block(&block(2)).expect("insert block");
        assert_eq!(storage.get_block(2).expect("get block"), block(2));
    }

    #[rstest]
    #[case::plain(false, true)]
    #[case::atomic(true, false)]
    fn test_failed_insert_keeps_partial_rows_unless_atomic(
        #[case] atomic_writes: bool,
        #[case] block_row_kept: bool,
    ) {
        let storage = SqliteStorage::in_memory(atomic_writes).expect("open database");
        // Two signatures for the same commit height force a primary key violation once the
        // block row has been written.
        let mut first = block(5);
        first.last_commit.signatures = vec![Default::default()];
        storage.insert_block(&first).expect("insert block");

        let mut second = block(6);
        second.last_commit = first.last_commit.clone();
        let err = storage.insert_block(&second).unwrap_err();
        assert!(matches!(err, StorageError::Query { op: "insert commit signature", .. }));

        let kept = storage.get_block(6).is_ok();
        assert_eq!(kept, block_row_kept);
    }

    #[test]
    fn test_header_path_is_independent_of_blocks() {
        let storage = SqliteStorage::in_memory(false).expect("open database");
        let header = Header { height: 9, ..Default::default() };
        storage.insert_header(&header).expect("insert header");

        assert_eq!(storage.get_header(9).expect("get header"), header);
        assert!(storage.get_block(9).unwrap_err().is_not_found());
    }

    #[test]
    fn test_unsupported_evidence_does_not_fail_block() {
        let storage = SqliteStorage::in_memory(false).expect("open database");
        let mut with_evidence = block(4);
        with_evidence.evidence = vec![Evidence::Unsupported];

        storage.insert_block(&with_evidence).expect("insert block");
        assert!(storage.get_block(4).expect("get block").evidence.is_empty());
    }
}
