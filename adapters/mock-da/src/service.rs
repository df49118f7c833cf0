use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use lumen_celestia_adapter::shares::sparse_shares_needed;
use lumen_celestia_adapter::verifier::binary_merkle;
use lumen_rollup_interface::da::{
    BinaryMerkleProof, CelestiaPointer, DataCommitment, DataRootTuple, Namespace, ShareProof,
    SharePointer,
};
use lumen_rollup_interface::rollup::Bundle;
use lumen_rollup_interface::services::da::DaService;
use lumen_rollup_interface::H256;
use sha2::Digest;
use tokio::sync::RwLock;

use crate::square::Square;

/// Height of the first block when none is configured.
pub const DEFAULT_START_HEIGHT: u64 = 1;

#[derive(Debug, Clone, PartialEq)]
struct MockDaBlock {
    square: Square,
    pointer: CelestiaPointer,
}

#[derive(Debug, Default)]
struct MockDaState {
    next_height: u64,
    blocks: BTreeMap<u64, MockDaBlock>,
    withheld: HashSet<u64>,
}

#[derive(Clone)]
/// DaService used in tests and dry runs.
/// Every published bundle lands in its own block, with real share and data root proofs.
/// Heights without a published bundle have a data root derived from the height alone.
/// Submitted blocks are kept indefinitely in memory.
pub struct MockDaService {
    namespace: Namespace,
    state: Arc<RwLock<MockDaState>>,
}

impl MockDaService {
    /// Creates a new [`MockDaService`] whose first block is at [`DEFAULT_START_HEIGHT`].
    pub fn new(namespace: Namespace) -> Self {
        Self::with_start_height(namespace, DEFAULT_START_HEIGHT)
    }

    /// Creates a new [`MockDaService`] whose first block is at `start_height`.
    pub fn with_start_height(namespace: Namespace, start_height: u64) -> Self {
        Self {
            namespace,
            state: Arc::new(RwLock::new(MockDaState {
                next_height: start_height,
                ..Default::default()
            })),
        }
    }

    /// Height the next published bundle will land at.
    pub async fn next_height(&self) -> u64 {
        self.state.read().await.next_height
    }

    /// Leaves `count` heights empty.
    pub async fn skip_blocks(&self, count: u64) {
        self.state.write().await.next_height += count;
    }

    /// Stops serving the shares and proofs of the block at `height`, as a publisher
    /// withholding data would.
    pub async fn withhold(&self, height: u64) {
        self.state.write().await.withheld.insert(height);
    }

    /// Data root of the block at `height`.
    pub async fn data_root(&self, height: u64) -> H256 {
        let state = self.state.read().await;
        data_root_at(&state, height)
    }

    /// The Blobstream commitment over the data roots of heights `[start, end)`.
    pub async fn data_commitment(&self, nonce: u64, start: u64, end: u64) -> DataCommitment {
        let state = self.state.read().await;
        DataCommitment {
            nonce,
            start_block: start,
            end_block: end,
            data_commitment: binary_merkle::root(&tuples(&state, start, end)),
        }
    }

    async fn available_block(&self, height: u64) -> anyhow::Result<MockDaBlock> {
        let state = self.state.read().await;
        if state.withheld.contains(&height) {
            anyhow::bail!("Data of block at height={height} is withheld");
        }
        state
            .blocks
            .get(&height)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No block at height={height} has been published"))
    }
}

fn hash_to_array(bytes: &[u8]) -> [u8; 32] {
    sha2::Sha256::digest(bytes).into()
}

fn data_root_at(state: &MockDaState, height: u64) -> H256 {
    state
        .blocks
        .get(&height)
        .map(|block| block.square.data_root())
        .unwrap_or_else(|| H256(hash_to_array(&height.to_be_bytes())))
}

fn tuples(state: &MockDaState, start: u64, end: u64) -> Vec<Vec<u8>> {
    (start..end)
        .map(|height| {
            DataRootTuple {
                height,
                data_root: data_root_at(state, height),
            }
            .abi_encode()
        })
        .collect()
}

#[async_trait]
impl DaService for MockDaService {
    fn namespace(&self) -> Namespace {
        self.namespace
    }

    async fn publish_bundle(&self, bundle: &Bundle) -> anyhow::Result<CelestiaPointer> {
        let blob = bundle.blob(self.namespace);
        let tx_hash = H256(hash_to_array(&blob.data));
        let (square, share_start) = Square::with_blob(&blob, tx_hash);

        let mut state = self.state.write().await;
        let height = state.next_height;
        let pointer = CelestiaPointer {
            height,
            data_root: square.data_root(),
            tx_hash,
            share_start,
            share_len: sparse_shares_needed(blob.data.len()) as u64,
        };
        state.blocks.insert(height, MockDaBlock { square, pointer });
        state.next_height += 1;
        tracing::debug!(%pointer, "Published bundle to mock DA");
        Ok(pointer)
    }

    async fn get_shares(&self, pointer: &CelestiaPointer) -> anyhow::Result<Vec<Vec<u8>>> {
        let block = self.available_block(pointer.height).await?;
        let start = pointer.share_start as usize;
        block
            .square
            .shares(start, start + pointer.share_len as usize)
            .ok_or_else(|| anyhow::anyhow!("Pointer {pointer} is outside the square"))
    }

    async fn find_pointer(&self, height: u64) -> anyhow::Result<Option<CelestiaPointer>> {
        let state = self.state.read().await;
        Ok(state.blocks.get(&height).map(|block| block.pointer))
    }

    async fn get_shares_proof(
        &self,
        pointer: &CelestiaPointer,
        share_pointer: &SharePointer,
    ) -> anyhow::Result<ShareProof> {
        let block = self.available_block(pointer.height).await?;
        let start = pointer.absolute_share(share_pointer.start_share) as usize;
        let end = pointer.absolute_share(share_pointer.end_share()) as usize;
        block
            .square
            .prove(self.namespace, start, end)
            .ok_or_else(|| anyhow::anyhow!("Cannot prove shares {start}..{end} of {pointer}"))
    }

    async fn get_data_root_inclusion_proof(
        &self,
        height: u64,
        start: u64,
        end: u64,
    ) -> anyhow::Result<BinaryMerkleProof> {
        if !(start..end).contains(&height) {
            anyhow::bail!("Height {height} is outside the commitment range {start}..{end}");
        }
        let state = self.state.read().await;
        binary_merkle::prove(&tuples(&state, start, end), (height - start) as usize)
            .ok_or_else(|| anyhow::anyhow!("Cannot prove height {height}"))
    }
}
