//! Misbehavior evidence carried by a block.

use crate::{BlockId, Timestamp, UnknownDiscriminant};
use alloy_primitives::Bytes;
use serde::de::Error as _;
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Type of a consensus message.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum SignedMsgType {
    /// Unknown message type.
    #[default]
    Unknown = 0,
    /// Prevote.
    Prevote = 1,
    /// Precommit.
    Precommit = 2,
    /// Block proposal.
    Proposal = 32,
}

impl TryFrom<i64> for SignedMsgType {
    type Error = UnknownDiscriminant;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Prevote),
            2 => Ok(Self::Precommit),
            32 => Ok(Self::Proposal),
            _ => Err(UnknownDiscriminant { kind: "signed message type", value }),
        }
    }
}

/// A signed consensus vote.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Vote {
    /// Vote type.
    #[serde(rename = "type")]
    pub vote_type: SignedMsgType,
    /// Height voted at.
    pub height: i64,
    /// Round voted in.
    pub round: i32,
    /// Block voted for. Zero-valued for nil votes.
    pub block_id: BlockId,
    /// Time of the vote.
    pub timestamp: Timestamp,
    /// Address of the voting validator.
    pub validator_address: Bytes,
    /// Index of the validator in the validator set.
    pub validator_index: i32,
    /// Raw signature bytes.
    pub signature: Bytes,
}

/// Proof that a validator signed two conflicting votes at the same height and round.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DuplicateVoteEvidence {
    /// First conflicting vote.
    pub vote_a: Vote,
    /// Second conflicting vote.
    pub vote_b: Vote,
    /// Total voting power of the validator set.
    pub total_voting_power: i64,
    /// Voting power of the offending validator.
    pub validator_power: i64,
    /// Time of the evidence.
    pub timestamp: Timestamp,
}

/// Public key of a validator.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PubKey {
    /// Key type, e.g. `ed25519`.
    #[serde(rename = "type")]
    pub key_type: String,
    /// Raw key bytes.
    pub value: Bytes,
}

/// A validator as referenced by light client attack evidence.
///
/// Stored validators are deduplicated by `(address, voting_power)`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Validator {
    /// Validator address.
    pub address: Bytes,
    /// Validator public key.
    pub pub_key: PubKey,
    /// Voting power.
    pub voting_power: i64,
    /// Proposer priority.
    pub proposer_priority: i64,
}

/// Proof that a set of validators colluded to present a false chain to a light client.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LightClientAttackEvidence {
    /// Last height both chains agree on.
    pub common_height: i64,
    /// Validators that signed the conflicting header.
    pub byzantine_validators: Vec<Validator>,
    /// Total voting power of the validator set at the common height.
    pub total_voting_power: i64,
    /// Time of the evidence.
    pub timestamp: Timestamp,
}

const DUPLICATE_VOTE_KIND: &str = "tendermint/DuplicateVoteEvidence";
const LIGHT_CLIENT_ATTACK_KIND: &str = "tendermint/LightClientAttackEvidence";

/// A closed set of evidence kinds.
///
/// Kinds the companion cannot decompose deserialize into [`Evidence::Unsupported`] whatever
/// payload they carry; they are skipped on insert rather than failing the whole block.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "type", content = "value")]
pub enum Evidence {
    /// Two conflicting votes by one validator.
    #[serde(rename = "tendermint/DuplicateVoteEvidence")]
    DuplicateVote(DuplicateVoteEvidence),
    /// A light client attack by a set of byzantine validators.
    #[serde(rename = "tendermint/LightClientAttackEvidence")]
    LightClientAttack(LightClientAttackEvidence),
    /// Any evidence kind not listed above.
    #[serde(rename = "unsupported")]
    Unsupported,
}

impl Evidence {
    /// Returns the wire name of the evidence kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateVote(_) => DUPLICATE_VOTE_KIND,
            Self::LightClientAttack(_) => LIGHT_CLIENT_ATTACK_KIND,
            Self::Unsupported => "unsupported",
        }
    }
}

impl<'de> serde::Deserialize<'de> for Evidence {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct Tagged {
            #[serde(rename = "type")]
            kind: String,
            #[serde(default)]
            value: serde_json::Value,
        }

        let Tagged { kind, value } = Tagged::deserialize(deserializer)?;
        let evidence = match kind.as_str() {
            DUPLICATE_VOTE_KIND => {
                Self::DuplicateVote(serde_json::from_value(value).map_err(D::Error::custom)?)
            }
            LIGHT_CLIENT_ATTACK_KIND => {
                Self::LightClientAttack(serde_json::from_value(value).map_err(D::Error::custom)?)
            }
            _ => Self::Unsupported,
        };
        Ok(evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Block;

    #[test]
    fn test_evidence_tagged_roundtrip() {
        let evidence = Evidence::LightClientAttack(LightClientAttackEvidence {
            common_height: 7,
            byzantine_validators: vec![Validator {
                address: Bytes::from_static(&[0xab; 20]),
                pub_key: PubKey {
                    key_type: "ed25519".to_string(),
                    value: Bytes::from_static(&[0x01; 32]),
                },
                voting_power: 10,
                proposer_priority: -3,
            }],
            total_voting_power: 100,
            timestamp: Timestamp::new(1_700_000_000, 0),
        });

        let json = serde_json::to_value(&evidence).unwrap();
        assert_eq!(json["type"], "tendermint/LightClientAttackEvidence");
        assert_eq!(json["value"]["common_height"], 7);

        let decoded: Evidence = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, evidence);
    }

    #[test]
    fn test_unknown_evidence_kind_is_unsupported() {
        let decoded: Evidence =
            serde_json::from_str(r#"{"type":"tendermint/SomethingNew"}"#).unwrap();
        assert_eq!(decoded, Evidence::Unsupported);

        let decoded: Evidence = serde_json::from_str(
            r#"{"type":"tendermint/SomethingNew","value":{"height":"5","foo":[1,2]}}"#,
        )
        .unwrap();
        assert_eq!(decoded, Evidence::Unsupported);
    }

    #[test]
    fn test_block_with_unknown_evidence_payload_decodes() {
        let known = Evidence::DuplicateVote(DuplicateVoteEvidence {
            total_voting_power: 100,
            validator_power: 10,
            ..Default::default()
        });
        let block = Block { evidence: vec![known.clone()], ..Default::default() };
        let mut json = serde_json::to_value(&block).unwrap();
        json["evidence"].as_array_mut().unwrap().push(serde_json::json!({
            "type": "tendermint/SomethingNew",
            "value": { "height": "5", "validators": [{ "address": "0xab" }] }
        }));

        let decoded: Block = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.evidence, vec![known, Evidence::Unsupported]);
    }

    #[test]
    fn test_known_evidence_with_bad_payload_is_rejected() {
        let err = serde_json::from_str::<Evidence>(
            r#"{"type":"tendermint/DuplicateVoteEvidence","value":{"vote_a":7}}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_vote_type_discriminants() {
        assert_eq!(SignedMsgType::try_from(32).unwrap(), SignedMsgType::Proposal);
        assert!(SignedMsgType::try_from(3).is_err());
        assert_eq!(serde_json::to_string(&SignedMsgType::Precommit).unwrap(), "2");
    }
}
