//! Records of data availability challenges, as stored by the challenge contract.
use ethers_core::abi::{self, Token};
use ethers_core::types::{Address, H256, U256};
use ethers_core::utils::keccak256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of a data root inclusion challenge. Transitions only move forward:
/// `None -> ChallengerInitiated -> {ChallengerWon | DefenderWon}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChallengeStatus {
    /// No challenge exists for the key.
    None = 0,
    /// A challenge is open and awaiting a defense.
    ChallengerInitiated = 1,
    /// The challenge expired without a valid defense.
    ChallengerWon = 2,
    /// A valid defense was accepted.
    DefenderWon = 3,
}

/// The contract returned a status byte outside the known range.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown challenge status {0}")]
pub struct UnknownStatus(pub u8);

impl TryFrom<u8> for ChallengeStatus {
    type Error = UnknownStatus;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::ChallengerInitiated),
            2 => Ok(Self::ChallengerWon),
            3 => Ok(Self::DefenderWon),
            other => Err(UnknownStatus(other)),
        }
    }
}

impl ChallengeStatus {
    /// Whether the challenge has been decided.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ChallengerWon | Self::DefenderWon)
    }
}

/// A challenge as stored by the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaChallenge {
    pub block_index: u64,
    pub challenger: Address,
    /// Unix timestamp after which the challenge can be settled.
    pub expiry: u64,
    pub status: ChallengeStatus,
}

/// A challenge update emitted by the contract. Stored locally by the challenge watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeEvent {
    pub block_hash: H256,
    pub pointer_index: u8,
    pub share_index: u32,
    pub expiry: u64,
    pub status: ChallengeStatus,
}

/// Local replica of the contract's `dataRootInclusionChallengeKey`:
/// `keccak256(abi.encode(bytes32 blockHash, uint8 pointerIndex, uint32 shareIndex))`.
pub fn challenge_key(block_hash: H256, pointer_index: u8, share_index: u32) -> H256 {
    let encoded = abi::encode(&[
        Token::FixedBytes(block_hash.as_bytes().to_vec()),
        Token::Uint(U256::from(pointer_index)),
        Token::Uint(U256::from(share_index)),
    ]);
    H256(keccak256(encoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bytes_round_trip() {
        for byte in 0..4u8 {
            let status = ChallengeStatus::try_from(byte).unwrap();
            assert_eq!(status as u8, byte);
        }
        assert_eq!(ChallengeStatus::try_from(4), Err(UnknownStatus(4)));
        assert!(ChallengeStatus::DefenderWon.is_terminal());
        assert!(!ChallengeStatus::ChallengerInitiated.is_terminal());
    }

    #[test]
    fn key_depends_on_every_coordinate() {
        let hash = H256::repeat_byte(1);
        let key = challenge_key(hash, 0, 5);
        assert_ne!(key, challenge_key(hash, 1, 5));
        assert_ne!(key, challenge_key(hash, 0, 6));
        assert_ne!(key, challenge_key(H256::repeat_byte(2), 0, 5));

        let mut words = [0u8; 96];
        words[..32].copy_from_slice(hash.as_bytes());
        words[95] = 5;
        assert_eq!(key, H256(keccak256(words)));
    }
}
