//! Read access to the L2 chain being rolled up.
use async_trait::async_trait;

use crate::rollup::L2Block;

/// Client of the L2 source chain.
#[async_trait]
pub trait L2Client: Send + Sync + 'static {
    /// Height of the latest L2 block.
    async fn get_height(&self) -> anyhow::Result<u64>;

    /// Fetches the block at `height`.
    async fn get_block(&self, height: u64) -> anyhow::Result<L2Block>;

    /// Fetches the blocks in `[start, end)`, one request at a time.
    async fn get_blocks(&self, start: u64, end: u64) -> anyhow::Result<Vec<L2Block>> {
        let mut blocks = Vec::with_capacity(end.saturating_sub(start) as usize);
        for height in start..end {
            blocks.push(self.get_block(height).await?);
        }
        Ok(blocks)
    }
}
