//! The da module defines the trait used by the full node to interact with the DA layer.
use async_trait::async_trait;

use crate::da::{BinaryMerkleProof, CelestiaPointer, Namespace, ShareProof, SharePointer};
use crate::rollup::Bundle;

/// A DaService is the local side of an RPC connection talking to a node of the DA layer.
#[async_trait]
pub trait DaService: Send + Sync + 'static {
    /// The namespace bundles are published to.
    fn namespace(&self) -> Namespace;

    /// Publishes a bundle and returns where it landed.
    async fn publish_bundle(&self, bundle: &Bundle) -> anyhow::Result<CelestiaPointer>;

    /// Returns the raw shares of the blob the pointer refers to, in order.
    async fn get_shares(&self, pointer: &CelestiaPointer) -> anyhow::Result<Vec<Vec<u8>>>;

    /// Returns the bundle blob published in our namespace at `height`, if any.
    async fn find_pointer(&self, height: u64) -> anyhow::Result<Option<CelestiaPointer>>;

    /// Proves the shares spanned by `share_pointer` against their row roots, and the row roots
    /// against the block's data root.
    async fn get_shares_proof(
        &self,
        pointer: &CelestiaPointer,
        share_pointer: &SharePointer,
    ) -> anyhow::Result<ShareProof>;

    /// Proves the data root tuple of `height` against the commitment over `[start, end)`.
    async fn get_data_root_inclusion_proof(
        &self,
        height: u64,
        start: u64,
        end: u64,
    ) -> anyhow::Result<BinaryMerkleProof>;
}
