use crate::{BlockId, Timestamp, UnknownDiscriminant};
use alloy_primitives::Bytes;
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Indicates which block, if any, a commit signature is for.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum BlockIdFlag {
    /// Unknown flag.
    #[default]
    Unknown = 0,
    /// The validator did not vote.
    Absent = 1,
    /// The validator voted for the committed block.
    Commit = 2,
    /// The validator voted for nil.
    Nil = 3,
}

impl TryFrom<i64> for BlockIdFlag {
    type Error = UnknownDiscriminant;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Absent),
            2 => Ok(Self::Commit),
            3 => Ok(Self::Nil),
            _ => Err(UnknownDiscriminant { kind: "block id flag", value }),
        }
    }
}

/// A single validator's signature inside a [`Commit`].
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CommitSig {
    /// Which block the signature is for.
    pub block_id_flag: BlockIdFlag,
    /// Address of the signing validator.
    pub validator_address: Bytes,
    /// Time of the signature.
    pub timestamp: Timestamp,
    /// Raw signature bytes.
    pub signature: Bytes,
}

/// Precommit signatures certifying the block at `height`.
///
/// The set of signatures is bounded by the validator set size at that height.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Commit {
    /// Height being certified.
    pub height: i64,
    /// Consensus round the commit was reached in.
    pub round: i32,
    /// The committed block.
    pub block_id: BlockId,
    /// Ordered validator signatures.
    pub signatures: Vec<CommitSig>,
}
