//! The settlement chain: canonical state chain, challenge contract, chain oracle and the
//! Blobstream bridge.
use std::time::Duration;

use async_trait::async_trait;
use ethers_core::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

use crate::da::{DataCommitment, ShareRange, SharesProof};
use crate::rollup::{ChallengeEvent, DaChallenge, RollupHeader};

/// A transaction handed to the L1 client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedTx {
    /// Hash of the signed transaction.
    pub hash: H256,
    /// False when the client was asked not to broadcast (dry run).
    pub sent: bool,
}

/// The outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: H256,
    pub block_number: u64,
    pub success: bool,
}

/// Client of the L1 settlement chain.
///
/// Calls that change contract state return a [`SubmittedTx`]. Transactions the contracts
/// would revert are reported as errors carrying the revert reason.
#[async_trait]
pub trait L1Client: Send + Sync + 'static {
    /// Latest L1 block number.
    async fn get_height(&self) -> anyhow::Result<u64>;

    /// Unix timestamp of the latest L1 block, the clock challenge expiries are measured on.
    async fn get_timestamp(&self) -> anyhow::Result<u64>;

    /// Index of the current head of the canonical state chain.
    async fn get_rollup_head_index(&self) -> anyhow::Result<u64>;

    /// The current head header.
    async fn get_rollup_head(&self) -> anyhow::Result<RollupHeader> {
        let index = self.get_rollup_head_index().await?;
        self.get_header_by_index(index).await
    }

    /// The header at `index` in the chain.
    async fn get_header_by_index(&self, index: u64) -> anyhow::Result<RollupHeader>;

    /// The hash of the header at `index`.
    async fn get_block_hash_by_index(&self, index: u64) -> anyhow::Result<H256>;

    /// The header with the given hash.
    async fn get_header_by_hash(&self, hash: H256) -> anyhow::Result<RollupHeader>;

    /// Pushes a new head to the canonical state chain.
    async fn push_rollup_head(&self, header: &RollupHeader) -> anyhow::Result<SubmittedTx>;

    /// Waits for a transaction to be mined.
    async fn wait(&self, tx_hash: H256) -> anyhow::Result<TxReceipt>;

    /// Account allowed to push headers.
    async fn get_publisher(&self) -> anyhow::Result<Address>;

    /// Hash of a header, as the contract computes it.
    async fn hash_header(&self, header: &RollupHeader) -> anyhow::Result<H256> {
        Ok(header.hash())
    }

    /// Key of the challenge on `(block_hash, pointer_index, share_index)`.
    async fn challenge_key(
        &self,
        block_hash: H256,
        pointer_index: u8,
        share_index: u32,
    ) -> anyhow::Result<H256>;

    /// Fee attached to every challenge.
    async fn get_challenge_fee(&self) -> anyhow::Result<U256>;

    /// How long a defender has to answer a challenge.
    async fn get_challenge_window(&self) -> anyhow::Result<Duration>;

    /// Opens a challenge, paying the challenge fee.
    async fn challenge_data_root_inclusion(
        &self,
        block_index: u64,
        pointer_index: u8,
        share_index: u32,
    ) -> anyhow::Result<SubmittedTx>;

    /// Answers the challenge under `key` with a proof.
    async fn defend_data_root_inclusion(
        &self,
        key: H256,
        proof: &SharesProof,
    ) -> anyhow::Result<SubmittedTx>;

    /// Settles an expired challenge in the challenger's favour.
    async fn settle_data_root_inclusion(&self, key: H256) -> anyhow::Result<SubmittedTx>;

    /// Reads the challenge under `key`. Unknown keys have status `None`.
    async fn get_data_root_inclusion_challenge(&self, key: H256) -> anyhow::Result<DaChallenge>;

    /// Challenge updates emitted in L1 blocks `[from, to]`.
    async fn get_challenge_events(&self, from: u64, to: u64) -> anyhow::Result<Vec<ChallengeEvent>>;

    /// Blobstream commitments stored in L1 blocks `[from, to]`.
    async fn get_data_commitments(&self, from: u64, to: u64) -> anyhow::Result<Vec<DataCommitment>>;

    /// Stores proven shares of a rollup block in the chain oracle.
    async fn provide_shares(
        &self,
        rblock: H256,
        pointer_index: u8,
        proof: &SharesProof,
    ) -> anyhow::Result<SubmittedTx>;

    /// The chain oracle's key for shares provided for `rblock`.
    async fn shares_key(&self, rblock: H256, shares: &[Bytes]) -> anyhow::Result<H256>;

    /// Decodes an L2 header out of provided shares.
    async fn provide_header(
        &self,
        shares_key: H256,
        ranges: &[ShareRange],
    ) -> anyhow::Result<SubmittedTx>;

    /// Decodes a legacy L2 transaction out of provided shares.
    async fn provide_legacy_tx(
        &self,
        shares_key: H256,
        ranges: &[ShareRange],
    ) -> anyhow::Result<SubmittedTx>;
}
