//! Core types shared across companion components.
//!
//! This crate defines the block aggregate ingested from the remote node and persisted by the
//! storage engine: header, last commit, transactions and misbehavior evidence.

mod time;
pub use time::Timestamp;

mod block;
pub use block::{Block, BlockId, PartSetHeader};

mod header;
pub use header::{Header, Version};

mod commit;
pub use commit::{BlockIdFlag, Commit, CommitSig};

mod evidence;
pub use evidence::{
    DuplicateVoteEvidence, Evidence, LightClientAttackEvidence, PubKey, SignedMsgType,
    Validator, Vote,
};

mod retain;
pub use retain::RetainHeights;

mod error;
pub use error::UnknownDiscriminant;
