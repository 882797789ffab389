//! Providers for block persistence.
//!
//! Each provider wraps a borrowed [`Connection`](rusqlite::Connection), which is either the plain
//! writer connection or an open transaction, and implements one part of the block aggregate:
//! - block scalars, transactions and commit signatures (via [`BlockProvider`])
//! - duplicate vote and light client attack evidence (via [`EvidenceProvider`])
//! - serialized headers (via [`HeaderProvider`])

mod block_provider;
pub(crate) use block_provider::BlockProvider;

mod evidence_provider;
pub(crate) use evidence_provider::EvidenceProvider;

mod header_provider;
pub(crate) use header_provider::HeaderProvider;

use alloy_primitives::Bytes;
use companion_types::{BlockId, PartSetHeader, Timestamp};
use rusqlite::{Row, types::Type};

fn bytes_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Bytes> {
    row.get::<_, Vec<u8>>(idx).map(Bytes::from)
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Timestamp> {
    row.get::<_, i64>(idx).map(Timestamp::from_unix_nanos)
}

/// Reads a [`BlockId`] stored as `(hash, parts_hash, parts_total)` starting at `idx`.
fn block_id_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<BlockId> {
    Ok(BlockId {
        hash: bytes_at(row, idx)?,
        part_set_header: PartSetHeader { hash: bytes_at(row, idx + 1)?, total: row.get(idx + 2)? },
    })
}

/// Reads an integer column into one of the `repr` enums of [`companion_types`].
fn discriminant_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: TryFrom<i64, Error = companion_types::UnknownDiscriminant>,
{
    let value: i64 = row.get(idx)?;
    T::try_from(value)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(err)))
}
