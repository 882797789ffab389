//! Provider for the header-only ingestion path.

use crate::{StorageError, error::QueryContext};
use companion_types::Header;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

/// Stores [`Header`]s as serialized blobs keyed by height.
#[derive(Debug)]
pub(crate) struct HeaderProvider<'c> {
    conn: &'c Connection,
}

impl<'c> HeaderProvider<'c> {
    pub(crate) const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub(crate) fn insert_header(&self, header: &Header) -> Result<(), StorageError> {
        let blob = serde_json::to_vec(header)?;
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO block_header (height, header) VALUES (?1, ?2)",
                params![header.height, blob],
            )
            .context("insert header")?;
        if inserted == 0 {
            warn!(target: "companion::storage", height = header.height, "Header already stored");
            return Err(StorageError::BlockAlreadyExists(header.height));
        }
        Ok(())
    }

    pub(crate) fn get_header(&self, height: i64) -> Result<Header, StorageError> {
        let blob: Option<Vec<u8>> = self
            .conn
            .query_row("SELECT header FROM block_header WHERE height = ?1", [height], |row| {
                row.get(0)
            })
            .optional()
            .context("select header")?;
        let blob = blob.ok_or_else(|| {
            warn!(target: "companion::storage", height, "No header found");
            StorageError::EntryNotFound(format!("header at height {height}"))
        })?;
        Ok(serde_json::from_slice(&blob)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::init_schema;
    use alloy_primitives::Bytes;
    use companion_types::{Timestamp, Version};

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        init_schema(&conn).expect("init schema");
        conn
    }

    #[test]
    fn test_header_roundtrip() {
        let conn = setup_db();
        let provider = HeaderProvider::new(&conn);
        let header = Header {
            version: Version { block: 11, app: 1 },
            chain_id: "test-chain".to_string(),
            height: 12,
            time: Timestamp::new(1_700_000_000, 5),
            app_hash: Bytes::from_static(&[0xfe; 32]),
            ..Default::default()
        };

        provider.insert_header(&header).expect("insert header");
        assert_eq!(provider.get_header(12).expect("get header"), header);
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let conn = setup_db();
        let provider = HeaderProvider::new(&conn);
        let header = Header { height: 3, ..Default::default() };

        provider.insert_header(&header).expect("insert header");
        let err = provider.insert_header(&header).unwrap_err();
        assert!(matches!(err, StorageError::BlockAlreadyExists(3)));
    }

    #[test]
    fn test_missing_header() {
        let conn = setup_db();
        let err = HeaderProvider::new(&conn).get_header(3).unwrap_err();
        assert!(err.is_not_found());
    }
}
