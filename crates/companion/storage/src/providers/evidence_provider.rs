//! Provider for misbehavior evidence and the validators it references.

use super::{block_id_at, bytes_at, discriminant_at, timestamp_at};
use crate::{StorageError, error::QueryContext};
use companion_types::{
    DuplicateVoteEvidence, Evidence, LightClientAttackEvidence, PubKey, Validator, Vote,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, warn};

/// Number of columns a flattened [`Vote`] occupies.
const VOTE_COLUMNS: usize = 10;

/// Reads and writes [`Evidence`] on a borrowed connection.
#[derive(Debug)]
pub(crate) struct EvidenceProvider<'c> {
    conn: &'c Connection,
}

impl<'c> EvidenceProvider<'c> {
    pub(crate) const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Stores every supported evidence item of the block at `height`.
    ///
    /// The position in `evidence` is kept as the ordinal, so skipped items leave a gap.
    pub(crate) fn insert_evidence(
        &self,
        height: i64,
        evidence: &[Evidence],
    ) -> Result<(), StorageError> {
        for (ordinal, item) in evidence.iter().enumerate() {
            let ordinal = ordinal as i64;
            match item {
                Evidence::DuplicateVote(dve) => self.insert_duplicate_vote(height, ordinal, dve)?,
                Evidence::LightClientAttack(lca) => {
                    self.insert_light_client_attack(height, ordinal, lca)?
                }
                Evidence::Unsupported => {
                    warn!(
                        target: "companion::storage",
                        height,
                        ordinal,
                        kind = item.kind(),
                        "Skipping unsupported evidence"
                    );
                }
            }
        }
        Ok(())
    }

    fn insert_duplicate_vote(
        &self,
        height: i64,
        ordinal: i64,
        evidence: &DuplicateVoteEvidence,
    ) -> Result<(), StorageError> {
        let (a, b) = (&evidence.vote_a, &evidence.vote_b);
        self.conn
            .execute(
                "INSERT INTO evidence_duplicate_vote
                 (height, ordinal,
                  vote_a_type, vote_a_height, vote_a_round, vote_a_block_id_hash,
                  vote_a_block_id_parts_hash, vote_a_block_id_parts_total, vote_a_timestamp,
                  vote_a_validator_address, vote_a_validator_index, vote_a_signature,
                  vote_b_type, vote_b_height, vote_b_round, vote_b_block_id_hash,
                  vote_b_block_id_parts_hash, vote_b_block_id_parts_total, vote_b_timestamp,
                  vote_b_validator_address, vote_b_validator_index, vote_b_signature,
                  total_voting_power, validator_power, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                         ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
                params![
                    height,
                    ordinal,
                    i64::from(a.vote_type as u8),
                    a.height,
                    a.round,
                    &a.block_id.hash[..],
                    &a.block_id.part_set_header.hash[..],
                    a.block_id.part_set_header.total,
                    a.timestamp.unix_nanos(),
                    &a.validator_address[..],
                    a.validator_index,
                    &a.signature[..],
                    i64::from(b.vote_type as u8),
                    b.height,
                    b.round,
                    &b.block_id.hash[..],
                    &b.block_id.part_set_header.hash[..],
                    b.block_id.part_set_header.total,
                    b.timestamp.unix_nanos(),
                    &b.validator_address[..],
                    b.validator_index,
                    &b.signature[..],
                    evidence.total_voting_power,
                    evidence.validator_power,
                    evidence.timestamp.unix_nanos(),
                ],
            )
            .context("insert duplicate vote evidence")?;
        Ok(())
    }

    fn insert_light_client_attack(
        &self,
        height: i64,
        ordinal: i64,
        evidence: &LightClientAttackEvidence,
    ) -> Result<(), StorageError> {
        let evidence_id: i64 = self
            .conn
            .query_row(
                "INSERT INTO evidence_light_client_attack
                 (height, ordinal, common_height, total_voting_power, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id",
                params![
                    height,
                    ordinal,
                    evidence.common_height,
                    evidence.total_voting_power,
                    evidence.timestamp.unix_nanos(),
                ],
                |row| row.get(0),
            )
            .context("insert light client attack evidence")?;

        for (position, validator) in evidence.byzantine_validators.iter().enumerate() {
            let validator_id = self.upsert_validator(validator)?;
            let inserted = self
                .conn
                .execute(
                    "INSERT OR IGNORE INTO evidence_light_client_attack_validator
                     (evidence_id, validator_id, ordinal) VALUES (?1, ?2, ?3)",
                    params![evidence_id, validator_id, position as i64],
                )
                .context("insert byzantine validator link")?;
            if inserted == 0 {
                debug!(
                    target: "companion::storage",
                    evidence_id,
                    validator_id,
                    "Validator already linked to evidence"
                );
            }
        }
        Ok(())
    }

    /// Returns the id of the validator matching `(address, voting_power)`, inserting it first if
    /// no such row exists.
    fn upsert_validator(&self, validator: &Validator) -> Result<i64, StorageError> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM validator WHERE address = ?1 AND voting_power = ?2",
                params![&validator.address[..], validator.voting_power],
                |row| row.get(0),
            )
            .optional()
            .context("select validator")?;
        if let Some(id) = existing {
            return Ok(id);
        }

        self.conn
            .execute(
                "INSERT INTO validator
                 (address, pub_key_type, pub_key_value, voting_power, proposer_priority)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    &validator.address[..],
                    validator.pub_key.key_type,
                    &validator.pub_key.value[..],
                    validator.voting_power,
                    validator.proposer_priority,
                ],
            )
            .context("insert validator")?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Reads all evidence of the block at `height`, ordered as it was inserted.
    pub(crate) fn get_evidence(&self, height: i64) -> Result<Vec<Evidence>, StorageError> {
        let mut evidence: Vec<(i64, Evidence)> = self
            .duplicate_votes(height)?
            .into_iter()
            .map(|(ordinal, dve)| (ordinal, Evidence::DuplicateVote(dve)))
            .collect();

        for (id, ordinal, mut lca) in self.light_client_attacks(height)? {
            lca.byzantine_validators = self.byzantine_validators(id)?;
            evidence.push((ordinal, Evidence::LightClientAttack(lca)));
        }

        evidence.sort_by_key(|(ordinal, _)| *ordinal);
        Ok(evidence.into_iter().map(|(_, item)| item).collect())
    }

    fn duplicate_votes(
        &self,
        height: i64,
    ) -> Result<Vec<(i64, DuplicateVoteEvidence)>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT ordinal,
                        vote_a_type, vote_a_height, vote_a_round, vote_a_block_id_hash,
                        vote_a_block_id_parts_hash, vote_a_block_id_parts_total, vote_a_timestamp,
                        vote_a_validator_address, vote_a_validator_index, vote_a_signature,
                        vote_b_type, vote_b_height, vote_b_round, vote_b_block_id_hash,
                        vote_b_block_id_parts_hash, vote_b_block_id_parts_total, vote_b_timestamp,
                        vote_b_validator_address, vote_b_validator_index, vote_b_signature,
                        total_voting_power, validator_power, timestamp
                 FROM evidence_duplicate_vote WHERE height = ?1 ORDER BY ordinal",
            )
            .context("select duplicate vote evidence")?;
        stmt.query_map([height], |row| {
            let tail = 1 + 2 * VOTE_COLUMNS;
            Ok((
                row.get(0)?,
                DuplicateVoteEvidence {
                    vote_a: vote_at(row, 1)?,
                    vote_b: vote_at(row, 1 + VOTE_COLUMNS)?,
                    total_voting_power: row.get(tail)?,
                    validator_power: row.get(tail + 1)?,
                    timestamp: timestamp_at(row, tail + 2)?,
                },
            ))
        })
        .and_then(|rows| rows.collect())
        .context("select duplicate vote evidence")
    }

    fn light_client_attacks(
        &self,
        height: i64,
    ) -> Result<Vec<(i64, i64, LightClientAttackEvidence)>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, ordinal, common_height, total_voting_power, timestamp
                 FROM evidence_light_client_attack WHERE height = ?1 ORDER BY ordinal",
            )
            .context("select light client attack evidence")?;
        stmt.query_map([height], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                LightClientAttackEvidence {
                    common_height: row.get(2)?,
                    byzantine_validators: Vec::new(),
                    total_voting_power: row.get(3)?,
                    timestamp: timestamp_at(row, 4)?,
                },
            ))
        })
        .and_then(|rows| rows.collect())
        .context("select light client attack evidence")
    }

    fn byzantine_validators(&self, evidence_id: i64) -> Result<Vec<Validator>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT v.address, v.pub_key_type, v.pub_key_value, v.voting_power,
                        v.proposer_priority
                 FROM evidence_light_client_attack_validator e
                 JOIN validator v ON e.validator_id = v.id
                 WHERE e.evidence_id = ?1 ORDER BY e.ordinal",
            )
            .context("select byzantine validators")?;
        stmt.query_map([evidence_id], |row| {
            Ok(Validator {
                address: bytes_at(row, 0)?,
                pub_key: PubKey { key_type: row.get(1)?, value: bytes_at(row, 2)? },
                voting_power: row.get(3)?,
                proposer_priority: row.get(4)?,
            })
        })
        .and_then(|rows| rows.collect())
        .context("select byzantine validators")
    }
}

/// Reads a flattened [`Vote`] starting at `idx`.
fn vote_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vote> {
    Ok(Vote {
        vote_type: discriminant_at(row, idx)?,
        height: row.get(idx + 1)?,
        round: row.get(idx + 2)?,
        block_id: block_id_at(row, idx + 3)?,
        timestamp: timestamp_at(row, idx + 6)?,
        validator_address: bytes_at(row, idx + 7)?,
        validator_index: row.get(idx + 8)?,
        signature: bytes_at(row, idx + 9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{providers::BlockProvider, schema::init_schema};
    use alloy_primitives::Bytes;
    use companion_types::{Block, BlockId, Header, PartSetHeader, SignedMsgType, Timestamp};

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        init_schema(&conn).expect("init schema");
        conn
    }

    fn validator(address: u8, voting_power: i64) -> Validator {
        Validator {
            address: Bytes::from(vec![address; 20]),
            pub_key: PubKey {
                key_type: "tendermint/PubKeyEd25519".to_string(),
                value: Bytes::from(vec![address; 32]),
            },
            voting_power,
            proposer_priority: 1,
        }
    }

    fn light_client_attack(validators: Vec<Validator>) -> Evidence {
        Evidence::LightClientAttack(LightClientAttackEvidence {
            common_height: 3,
            byzantine_validators: validators,
            total_voting_power: 100,
            timestamp: Timestamp::new(1_700_000_000, 0),
        })
    }

    fn duplicate_vote() -> Evidence {
        let vote = |round| Vote {
            vote_type: SignedMsgType::Prevote,
            height: 4,
            round,
            block_id: BlockId {
                hash: Bytes::from(vec![round as u8; 32]),
                part_set_header: PartSetHeader { hash: Bytes::from(vec![0x01; 32]), total: 2 },
            },
            timestamp: Timestamp::new(1_700_000_000, round),
            validator_address: Bytes::from_static(&[0x0a; 20]),
            validator_index: 3,
            signature: Bytes::from_static(&[0x0b; 64]),
        };
        Evidence::DuplicateVote(DuplicateVoteEvidence {
            vote_a: vote(1),
            vote_b: vote(2),
            total_voting_power: 100,
            validator_power: 10,
            timestamp: Timestamp::new(1_700_000_001, 0),
        })
    }

    fn insert_parent(conn: &Connection, height: i64) {
        let block =
            Block { header: Header { height, ..Default::default() }, ..Default::default() };
        BlockProvider::new(conn).insert_block(&block).expect("insert block");
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .expect("count rows")
    }

    #[test]
    fn test_evidence_roundtrip_keeps_order() {
        let conn = setup_db();
        insert_parent(&conn, 5);
        let provider = EvidenceProvider::new(&conn);
        let evidence =
            vec![light_client_attack(vec![validator(1, 10)]), duplicate_vote(), duplicate_vote()];

        provider.insert_evidence(5, &evidence).expect("insert evidence");
        assert_eq!(provider.get_evidence(5).expect("get evidence"), evidence);
    }

    #[test]
    fn test_unsupported_evidence_is_skipped() {
        let conn = setup_db();
        insert_parent(&conn, 5);
        let provider = EvidenceProvider::new(&conn);

        provider
            .insert_evidence(5, &[Evidence::Unsupported, duplicate_vote()])
            .expect("insert evidence");

        assert_eq!(provider.get_evidence(5).expect("get evidence"), vec![duplicate_vote()]);
    }

    #[test]
    fn test_validator_shared_across_evidence() {
        let conn = setup_db();
        insert_parent(&conn, 5);
        let provider = EvidenceProvider::new(&conn);
        let evidence = vec![
            light_client_attack(vec![validator(1, 10)]),
            light_client_attack(vec![validator(1, 10)]),
        ];

        provider.insert_evidence(5, &evidence).expect("insert evidence");

        assert_eq!(count(&conn, "validator"), 1);
        assert_eq!(count(&conn, "evidence_light_client_attack_validator"), 2);
        assert_eq!(provider.get_evidence(5).expect("get evidence"), evidence);
    }

    #[test]
    fn test_validator_repeated_in_one_evidence_links_once() {
        let conn = setup_db();
        insert_parent(&conn, 5);
        let provider = EvidenceProvider::new(&conn);

        provider
            .insert_evidence(5, &[light_client_attack(vec![validator(1, 10), validator(1, 10)])])
            .expect("insert evidence");

        assert_eq!(count(&conn, "validator"), 1);
        assert_eq!(count(&conn, "evidence_light_client_attack_validator"), 1);
        assert_eq!(
            provider.get_evidence(5).expect("get evidence"),
            vec![light_client_attack(vec![validator(1, 10)])]
        );
    }

    #[test]
    fn test_validator_with_new_voting_power_is_new_row() {
        let conn = setup_db();
        insert_parent(&conn, 5);
        let provider = EvidenceProvider::new(&conn);

        provider
            .insert_evidence(5, &[light_client_attack(vec![validator(1, 10), validator(1, 20)])])
            .expect("insert evidence");

        assert_eq!(count(&conn, "validator"), 2);
    }
}
