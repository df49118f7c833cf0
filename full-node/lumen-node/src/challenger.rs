use lumen_rollup_interface::rollup::DaChallenge;
use lumen_rollup_interface::services::l1::{L1Client, SubmittedTx};
use lumen_rollup_interface::H256;
use tracing::info;

/// Opens and inspects data availability challenges against rollup blocks.
#[derive(Debug, Clone)]
pub struct Challenger<L1> {
    l1: L1,
}

impl<L1: L1Client> Challenger<L1> {
    pub fn new(l1: L1) -> Self {
        Self { l1 }
    }

    /// Challenges the availability of share `share_index` of the rollup block at
    /// `block_index`. Returns the transaction and the hash of the challenged block.
    pub async fn challenge_data_root_inclusion(
        &self,
        block_index: u64,
        pointer_index: u8,
        share_index: u32,
    ) -> anyhow::Result<(SubmittedTx, H256)> {
        let block_hash = self.l1.get_block_hash_by_index(block_index).await?;
        let tx = self
            .l1
            .challenge_data_root_inclusion(block_index, pointer_index, share_index)
            .await?;
        info!(block_index, ?block_hash, share_index, tx = ?tx.hash, "Opened data availability challenge");
        Ok((tx, block_hash))
    }

    /// Reads the challenge on `(block_hash, pointer_index, share_index)` and returns it with
    /// its key.
    pub async fn get_data_root_inclusion_challenge(
        &self,
        block_hash: H256,
        pointer_index: u8,
        share_index: u32,
    ) -> anyhow::Result<(H256, DaChallenge)> {
        let key = self
            .l1
            .challenge_key(block_hash, pointer_index, share_index)
            .await?;
        let challenge = self.l1.get_data_root_inclusion_challenge(key).await?;
        Ok((key, challenge))
    }
}
