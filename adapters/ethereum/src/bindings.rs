//! Contract bindings. Each contract lives in its own module since several of them declare
//! structs with the same names (`SharesProof`, `Namespace`, ...).
use ethers::abi::{InvalidOutputType, Tokenizable};
use ethers::contract::EthEvent;
use ethers::types::{H256, U256};

#[allow(clippy::all)]
pub mod state_chain {
    ethers::contract::abigen!(CanonicalStateChain, "./abi/CanonicalStateChain.json");
}

#[allow(clippy::all)]
pub mod challenge {
    ethers::contract::abigen!(Challenge, "./abi/Challenge.json");
}

#[allow(clippy::all)]
pub mod chain_oracle {
    ethers::contract::abigen!(ChainOracle, "./abi/ChainOracle.json");
}

/// Emitted by the challenge contract on every status change of a data root inclusion
/// challenge.
#[derive(Clone, Debug, PartialEq, Eq, EthEvent)]
#[ethevent(
    name = "ChallengeUpdate",
    abi = "ChallengeUpdate(bytes32,uint8,uint32,uint256,uint8)"
)]
pub struct ChallengeUpdateFilter {
    #[ethevent(indexed)]
    pub block_hash: H256,
    #[ethevent(indexed)]
    pub pointer_index: u8,
    pub share_index: u32,
    pub expiry: U256,
    #[ethevent(indexed)]
    pub status: u8,
}

/// Emitted by Blobstream when it stores a data commitment over `[start_block, end_block)`.
#[derive(Clone, Debug, PartialEq, Eq, EthEvent)]
#[ethevent(
    name = "DataCommitmentStored",
    abi = "DataCommitmentStored(uint256,uint64,uint64,bytes32)"
)]
pub struct DataCommitmentStoredFilter {
    pub proof_nonce: U256,
    #[ethevent(indexed)]
    pub start_block: u64,
    #[ethevent(indexed)]
    pub end_block: u64,
    #[ethevent(indexed)]
    pub data_commitment: H256,
}

/// Converts between the node's wire types and the structs generated for a contract. Both
/// sides encode to the same ABI tuple.
pub fn convert<A: Tokenizable, B: Tokenizable>(value: A) -> Result<B, InvalidOutputType> {
    B::from_token(value.into_token())
}
