//! Table layout of the companion database.

use rusqlite::Connection;

/// Configure a connection with standard PRAGMAs for WAL mode.
pub(crate) fn configure_connection(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         PRAGMA foreign_keys=ON;",
    )
}

/// Creates all tables and indexes if they do not exist yet.
///
/// Child tables carry an `ordinal` column so the order of transactions, signatures, evidence
/// and byzantine validators survives a round trip. Commit signatures are keyed by the height of
/// the commit, which is one less than the height of the block carrying it.
pub(crate) fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS block (
             height INTEGER PRIMARY KEY,
             block_id_hash BLOB NOT NULL,
             block_id_parts_hash BLOB NOT NULL,
             block_id_parts_total INTEGER NOT NULL,
             version_block INTEGER NOT NULL,
             version_app INTEGER NOT NULL,
             chain_id TEXT NOT NULL,
             time INTEGER NOT NULL,
             last_block_id_hash BLOB NOT NULL,
             last_block_id_parts_hash BLOB NOT NULL,
             last_block_id_parts_total INTEGER NOT NULL,
             last_commit_hash BLOB NOT NULL,
             data_hash BLOB NOT NULL,
             validators_hash BLOB NOT NULL,
             next_validators_hash BLOB NOT NULL,
             consensus_hash BLOB NOT NULL,
             app_hash BLOB NOT NULL,
             last_results_hash BLOB NOT NULL,
             evidence_hash BLOB NOT NULL,
             proposer_address BLOB NOT NULL,
             last_commit_height INTEGER NOT NULL,
             last_commit_round INTEGER NOT NULL,
             last_commit_block_id_hash BLOB NOT NULL,
             last_commit_block_id_parts_hash BLOB NOT NULL,
             last_commit_block_id_parts_total INTEGER NOT NULL
         );

         CREATE TABLE IF NOT EXISTS block_transaction (
             height INTEGER NOT NULL,
             ordinal INTEGER NOT NULL,
             tx BLOB NOT NULL,
             PRIMARY KEY (height, ordinal),
             FOREIGN KEY (height) REFERENCES block(height)
         );

         CREATE TABLE IF NOT EXISTS block_commit_signature (
             height INTEGER NOT NULL,
             ordinal INTEGER NOT NULL,
             block_id_flag INTEGER NOT NULL,
             validator_address BLOB NOT NULL,
             timestamp INTEGER NOT NULL,
             signature BLOB NOT NULL,
             PRIMARY KEY (height, ordinal)
         );

         CREATE TABLE IF NOT EXISTS evidence_duplicate_vote (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             height INTEGER NOT NULL,
             ordinal INTEGER NOT NULL,
             vote_a_type INTEGER NOT NULL,
             vote_a_height INTEGER NOT NULL,
             vote_a_round INTEGER NOT NULL,
             vote_a_block_id_hash BLOB NOT NULL,
             vote_a_block_id_parts_hash BLOB NOT NULL,
             vote_a_block_id_parts_total INTEGER NOT NULL,
             vote_a_timestamp INTEGER NOT NULL,
             vote_a_validator_address BLOB NOT NULL,
             vote_a_validator_index INTEGER NOT NULL,
             vote_a_signature BLOB NOT NULL,
             vote_b_type INTEGER NOT NULL,
             vote_b_height INTEGER NOT NULL,
             vote_b_round INTEGER NOT NULL,
             vote_b_block_id_hash BLOB NOT NULL,
             vote_b_block_id_parts_hash BLOB NOT NULL,
             vote_b_block_id_parts_total INTEGER NOT NULL,
             vote_b_timestamp INTEGER NOT NULL,
             vote_b_validator_address BLOB NOT NULL,
             vote_b_validator_index INTEGER NOT NULL,
             vote_b_signature BLOB NOT NULL,
             total_voting_power INTEGER NOT NULL,
             validator_power INTEGER NOT NULL,
             timestamp INTEGER NOT NULL,
             FOREIGN KEY (height) REFERENCES block(height)
         );
         CREATE INDEX IF NOT EXISTS idx_evidence_duplicate_vote_height
             ON evidence_duplicate_vote(height);

         CREATE TABLE IF NOT EXISTS evidence_light_client_attack (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             height INTEGER NOT NULL,
             ordinal INTEGER NOT NULL,
             common_height INTEGER NOT NULL,
             total_voting_power INTEGER NOT NULL,
             timestamp INTEGER NOT NULL,
             FOREIGN KEY (height) REFERENCES block(height)
         );
         CREATE INDEX IF NOT EXISTS idx_evidence_light_client_attack_height
             ON evidence_light_client_attack(height);

         CREATE TABLE IF NOT EXISTS validator (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             address BLOB NOT NULL,
             pub_key_type TEXT NOT NULL,
             pub_key_value BLOB NOT NULL,
             voting_power INTEGER NOT NULL,
             proposer_priority INTEGER NOT NULL,
             UNIQUE (address, voting_power)
         );

         CREATE TABLE IF NOT EXISTS evidence_light_client_attack_validator (
             evidence_id INTEGER NOT NULL,
             validator_id INTEGER NOT NULL,
             ordinal INTEGER NOT NULL,
             PRIMARY KEY (evidence_id, validator_id),
             FOREIGN KEY (evidence_id) REFERENCES evidence_light_client_attack(id),
             FOREIGN KEY (validator_id) REFERENCES validator(id)
         );

         CREATE TABLE IF NOT EXISTS block_header (
             height INTEGER PRIMARY KEY,
             header BLOB NOT NULL
         );",
    )
}
