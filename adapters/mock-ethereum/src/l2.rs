use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use lumen_rollup_interface::rollup::L2Block;
use lumen_rollup_interface::services::l2::L2Client;
use tokio::sync::RwLock;

/// An L2 chain held in memory. Blocks must be appended in height order.
#[derive(Debug, Clone, Default)]
pub struct MockL2Client {
    blocks: Arc<RwLock<Vec<L2Block>>>,
}

impl MockL2Client {
    /// Creates a chain holding `blocks`.
    pub fn new(blocks: Vec<L2Block>) -> Self {
        Self {
            blocks: Arc::new(RwLock::new(blocks)),
        }
    }

    /// Appends blocks to the tip of the chain.
    pub async fn extend(&self, blocks: impl IntoIterator<Item = L2Block>) {
        self.blocks.write().await.extend(blocks);
    }
}

#[async_trait]
impl L2Client for MockL2Client {
    async fn get_height(&self) -> anyhow::Result<u64> {
        self.blocks
            .read()
            .await
            .last()
            .map(L2Block::number)
            .ok_or_else(|| anyhow!("the L2 chain is empty"))
    }

    async fn get_block(&self, height: u64) -> anyhow::Result<L2Block> {
        let blocks = self.blocks.read().await;
        let first = blocks.first().map(L2Block::number).unwrap_or_default();
        height
            .checked_sub(first)
            .and_then(|offset| blocks.get(offset as usize))
            .cloned()
            .ok_or_else(|| anyhow!("L2 block {height} not found"))
    }
}

#[cfg(test)]
mod tests {
    use lumen_rollup_interface::mocks::l2_chain;

    use super::*;

    #[tokio::test]
    async fn serves_blocks_by_height() {
        let chain = l2_chain(100, 5, 1);
        let l2 = MockL2Client::new(chain[..3].to_vec());
        assert_eq!(l2.get_height().await.unwrap(), 102);
        assert_eq!(l2.get_block(101).await.unwrap(), chain[1]);
        assert!(l2.get_block(99).await.is_err());
        assert!(l2.get_block(103).await.is_err());

        l2.extend(chain[3..].to_vec()).await;
        assert_eq!(l2.get_height().await.unwrap(), 104);
        assert_eq!(l2.get_blocks(102, 105).await.unwrap(), chain[2..].to_vec());
    }

    #[tokio::test]
    async fn empty_chain_has_no_height() {
        assert!(MockL2Client::default().get_height().await.is_err());
    }
}
