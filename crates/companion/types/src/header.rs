use crate::{BlockId, Timestamp};
use alloy_primitives::Bytes;

/// Protocol versions a block was produced under.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Version {
    /// Block protocol version.
    pub block: u64,
    /// Application protocol version.
    pub app: u64,
}

/// A block header. `height` is the natural primary key of a block.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Header {
    /// Protocol versions.
    pub version: Version,
    /// Chain identifier.
    pub chain_id: String,
    /// Block height, strictly increasing per chain.
    pub height: i64,
    /// Block time.
    pub time: Timestamp,
    /// Identifier of the previous block.
    pub last_block_id: BlockId,
    /// Hash of the previous block's commit.
    pub last_commit_hash: Bytes,
    /// Merkle root of the transactions.
    pub data_hash: Bytes,
    /// Hash of the current validator set.
    pub validators_hash: Bytes,
    /// Hash of the next validator set.
    pub next_validators_hash: Bytes,
    /// Hash of the consensus parameters.
    pub consensus_hash: Bytes,
    /// Application state hash after the previous block.
    pub app_hash: Bytes,
    /// Root of the previous block's results.
    pub last_results_hash: Bytes,
    /// Hash of the included evidence.
    pub evidence_hash: Bytes,
    /// Address of the block proposer.
    pub proposer_address: Bytes,
}
