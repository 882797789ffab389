//! Provider for block scalars, transactions and commit signatures.

use super::{EvidenceProvider, block_id_at, bytes_at, discriminant_at, timestamp_at};
use crate::{StorageError, error::QueryContext};
use alloy_primitives::Bytes;
use companion_types::{Block, Commit, CommitSig, Header, Version};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{error, warn};

/// Reads and writes the [`Block`] aggregate on a borrowed connection.
#[derive(Debug)]
pub(crate) struct BlockProvider<'c> {
    conn: &'c Connection,
}

impl<'c> BlockProvider<'c> {
    pub(crate) const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Returns `true` if a block row exists at `height`.
    pub(crate) fn contains(&self, height: i64) -> Result<bool, StorageError> {
        self.conn
            .query_row("SELECT EXISTS(SELECT 1 FROM block WHERE height = ?1)", [height], |row| {
                row.get(0)
            })
            .context("check block exists")
    }

    pub(crate) fn insert_block(&self, block: &Block) -> Result<(), StorageError> {
        let height = block.height();
        if self.contains(height)? {
            warn!(target: "companion::storage", height, "Block already stored");
            return Err(StorageError::BlockAlreadyExists(height));
        }

        self.insert_block_row(block).inspect_err(|err| {
            error!(target: "companion::storage", height, %err, "Failed to insert block row");
        })?;

        for (ordinal, tx) in block.txs.iter().enumerate() {
            self.conn
                .execute(
                    "INSERT INTO block_transaction (height, ordinal, tx) VALUES (?1, ?2, ?3)",
                    params![height, ordinal as i64, &tx[..]],
                )
                .context("insert transaction")?;
        }

        // Signatures belong to the commit of the previous height.
        let commit_height = block.last_commit.height;
        for (ordinal, sig) in block.last_commit.signatures.iter().enumerate() {
            self.conn
                .execute(
                    "INSERT INTO block_commit_signature
                     (height, ordinal, block_id_flag, validator_address, timestamp, signature)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        commit_height,
                        ordinal as i64,
                        i64::from(sig.block_id_flag as u8),
                        &sig.validator_address[..],
                        sig.timestamp.unix_nanos(),
                        &sig.signature[..],
                    ],
                )
                .context("insert commit signature")?;
        }

        EvidenceProvider::new(self.conn).insert_evidence(height, &block.evidence)
    }

    fn insert_block_row(&self, block: &Block) -> Result<(), StorageError> {
        let header = &block.header;
        let commit = &block.last_commit;
        self.conn
            .execute(
                "INSERT INTO block
                 (height, block_id_hash, block_id_parts_hash, block_id_parts_total,
                  version_block, version_app, chain_id, time,
                  last_block_id_hash, last_block_id_parts_hash, last_block_id_parts_total,
                  last_commit_hash, data_hash, validators_hash, next_validators_hash,
                  consensus_hash, app_hash, last_results_hash, evidence_hash, proposer_address,
                  last_commit_height, last_commit_round, last_commit_block_id_hash,
                  last_commit_block_id_parts_hash, last_commit_block_id_parts_total)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                         ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
                params![
                    header.height,
                    &block.block_id.hash[..],
                    &block.block_id.part_set_header.hash[..],
                    block.block_id.part_set_header.total,
                    header.version.block as i64,
                    header.version.app as i64,
                    header.chain_id,
                    header.time.unix_nanos(),
                    &header.last_block_id.hash[..],
                    &header.last_block_id.part_set_header.hash[..],
                    header.last_block_id.part_set_header.total,
                    &header.last_commit_hash[..],
                    &header.data_hash[..],
                    &header.validators_hash[..],
                    &header.next_validators_hash[..],
                    &header.consensus_hash[..],
                    &header.app_hash[..],
                    &header.last_results_hash[..],
                    &header.evidence_hash[..],
                    &header.proposer_address[..],
                    commit.height,
                    commit.round,
                    &commit.block_id.hash[..],
                    &commit.block_id.part_set_header.hash[..],
                    commit.block_id.part_set_header.total,
                ],
            )
            .context("insert block")?;
        Ok(())
    }

    pub(crate) fn get_block(&self, height: i64) -> Result<Block, StorageError> {
        let block = self
            .conn
            .query_row(
                "SELECT height, block_id_hash, block_id_parts_hash, block_id_parts_total,
                        version_block, version_app, chain_id, time,
                        last_block_id_hash, last_block_id_parts_hash, last_block_id_parts_total,
                        last_commit_hash, data_hash, validators_hash, next_validators_hash,
                        consensus_hash, app_hash, last_results_hash, evidence_hash,
                        proposer_address, last_commit_height, last_commit_round,
                        last_commit_block_id_hash, last_commit_block_id_parts_hash,
                        last_commit_block_id_parts_total
                 FROM block WHERE height = ?1",
                [height],
                row_to_block,
            )
            .optional()
            .context("select block")?;
        let Some(mut block) = block else {
            warn!(target: "companion::storage", height, "No block found");
            return Err(StorageError::EntryNotFound(format!("block at height {height}")));
        };

        block.txs = self.transactions(height)?;
        block.last_commit.signatures = self.commit_signatures(block.last_commit.height)?;
        block.evidence = EvidenceProvider::new(self.conn).get_evidence(height)?;
        Ok(block)
    }

    fn transactions(&self, height: i64) -> Result<Vec<Bytes>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT tx FROM block_transaction WHERE height = ?1 ORDER BY ordinal")
            .context("select transactions")?;
        stmt.query_map([height], |row| bytes_at(row, 0))
            .and_then(|rows| rows.collect())
            .context("select transactions")
    }

    fn commit_signatures(&self, commit_height: i64) -> Result<Vec<CommitSig>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT block_id_flag, validator_address, timestamp, signature
                 FROM block_commit_signature WHERE height = ?1 ORDER BY ordinal",
            )
            .context("select commit signatures")?;
        stmt.query_map([commit_height], |row| {
            Ok(CommitSig {
                block_id_flag: discriminant_at(row, 0)?,
                validator_address: bytes_at(row, 1)?,
                timestamp: timestamp_at(row, 2)?,
                signature: bytes_at(row, 3)?,
            })
        })
        .and_then(|rows| rows.collect())
        .context("select commit signatures")
    }

    /// Returns the highest stored block height.
    pub(crate) fn latest_height(&self) -> Result<Option<i64>, StorageError> {
        self.conn
            .query_row("SELECT MAX(height) FROM block", [], |row| row.get(0))
            .context("select latest height")
    }
}

fn row_to_block(row: &Row<'_>) -> rusqlite::Result<Block> {
    let header = Header {
        height: row.get(0)?,
        version: Version { block: row.get::<_, i64>(4)? as u64, app: row.get::<_, i64>(5)? as u64 },
        chain_id: row.get(6)?,
        time: timestamp_at(row, 7)?,
        last_block_id: block_id_at(row, 8)?,
        last_commit_hash: bytes_at(row, 11)?,
        data_hash: bytes_at(row, 12)?,
        validators_hash: bytes_at(row, 13)?,
        next_validators_hash: bytes_at(row, 14)?,
        consensus_hash: bytes_at(row, 15)?,
        app_hash: bytes_at(row, 16)?,
        last_results_hash: bytes_at(row, 17)?,
        evidence_hash: bytes_at(row, 18)?,
        proposer_address: bytes_at(row, 19)?,
    };
    let last_commit = Commit {
        height: row.get(20)?,
        round: row.get(21)?,
        block_id: block_id_at(row, 22)?,
        signatures: Vec::new(),
    };

    Ok(Block {
        block_id: block_id_at(row, 1)?,
        header,
        txs: Vec::new(),
        evidence: Vec::new(),
        last_commit,
    })
}
