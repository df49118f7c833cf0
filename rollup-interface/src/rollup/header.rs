//! The rollup header committed to the canonical state chain contract.
use ethers_core::abi::{self, InvalidOutputType, Token, Tokenizable};
use ethers_core::types::H256;
use ethers_core::utils::keccak256;
use serde::{Deserialize, Serialize};

use super::bundle::Bundle;
use crate::da::CelestiaPointer;

/// A header of the canonical state chain. Field order and widths match the
/// contract's `Header` struct.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupHeader {
    /// L1 height at which the header was produced.
    pub epoch: u64,
    /// Height of the last L2 block covered by this header.
    pub l2_height: u64,
    /// Hash of the previous rollup header.
    pub prev_hash: H256,
    /// Merkle root over the bundle's transaction hashes.
    pub tx_root: H256,
    /// Merkle root over the bundle's block hashes.
    pub block_root: H256,
    /// State root of the last L2 block in the bundle.
    pub state_root: H256,
    /// Celestia height at which the bundle was published.
    pub celestia_height: u64,
    /// Data root of that Celestia block.
    pub celestia_data_root: H256,
}

impl RollupHeader {
    /// Builds the header extending `prev` for a bundle published at `pointer`.
    pub fn next(prev: &RollupHeader, epoch: u64, bundle: &Bundle, pointer: &CelestiaPointer) -> Self {
        Self {
            epoch,
            l2_height: bundle.last().number(),
            prev_hash: prev.hash(),
            tx_root: bundle.tx_root(),
            block_root: bundle.block_root(),
            state_root: bundle.state_root(),
            celestia_height: pointer.height,
            celestia_data_root: pointer.data_root,
        }
    }

    /// `keccak256(abi.encode(header))`, the hash the contract links headers with.
    pub fn hash(&self) -> H256 {
        H256(keccak256(abi::encode(&[self.clone().into_token()])))
    }
}

impl Tokenizable for RollupHeader {
    fn from_token(token: Token) -> Result<Self, InvalidOutputType> {
        let (
            epoch,
            l2_height,
            prev_hash,
            tx_root,
            block_root,
            state_root,
            celestia_height,
            celestia_data_root,
        ) = <(u64, u64, H256, H256, H256, H256, u64, H256)>::from_token(token)?;
        Ok(Self {
            epoch,
            l2_height,
            prev_hash,
            tx_root,
            block_root,
            state_root,
            celestia_height,
            celestia_data_root,
        })
    }

    fn into_token(self) -> Token {
        (
            self.epoch,
            self.l2_height,
            self.prev_hash,
            self.tx_root,
            self.block_root,
            self.state_root,
            self.celestia_height,
            self.celestia_data_root,
        )
            .into_token()
    }
}
