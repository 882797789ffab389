use crate::{Commit, Evidence, Header};
use alloy_primitives::Bytes;

/// Header of the part set a block was gossiped as.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PartSetHeader {
    /// Merkle root of the parts.
    pub hash: Bytes,
    /// Number of parts.
    pub total: u32,
}

/// Identifies a block independent of its content.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BlockId {
    /// Hash of the block header.
    pub hash: Bytes,
    /// Header of the part set.
    pub part_set_header: PartSetHeader,
}

/// A full block as fetched from the remote node.
///
/// The `last_commit` certifies the *previous* height: for a block at height `H`,
/// `last_commit.height` is `H - 1`.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    /// Identifier of this block.
    pub block_id: BlockId,
    /// The block header.
    pub header: Header,
    /// Opaque transactions, in block order.
    pub txs: Vec<Bytes>,
    /// Misbehavior evidence included in this block.
    pub evidence: Vec<Evidence>,
    /// The commit for the previous block.
    pub last_commit: Commit,
}

impl Block {
    /// Returns the height of the block.
    pub const fn height(&self) -> i64 {
        self.header.height
    }
}
