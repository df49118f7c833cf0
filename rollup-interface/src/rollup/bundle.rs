//! Bundles: the batches of contiguous L2 blocks published to the DA layer as one blob.
use ethers_core::types::H256;
use ethers_core::utils::rlp::{DecoderError, Rlp, RlpStream};
use thiserror::Error;

use super::block::L2Block;
use crate::crypto::merkle;
use crate::da::{Blob, Namespace};

/// The largest blob payload a single DA transaction may carry.
pub const MAX_BLOB_PAYLOAD_SIZE: usize = 1_962_441;
/// Bytes reserved for the blob transaction's own envelope.
pub const BLOB_PAYLOAD_RESERVE: usize = 6_000;

/// Errors raised while building or decoding a bundle.
#[derive(Debug, Error)]
pub enum BundleError {
    /// A bundle must contain at least one block.
    #[error("a bundle must contain at least one block")]
    Empty,
    /// The blocks do not form a contiguous, linked range.
    #[error("block {height} does not extend block {parent_height}")]
    NotContiguous {
        /// Height of the offending block.
        height: u64,
        /// Height of the block it should extend.
        parent_height: u64,
    },
    /// A header sets a fork field without the fields of the earlier forks.
    #[error("header of block {height} has a gap in its fork fields")]
    MalformedHeader {
        /// Height of the offending block.
        height: u64,
    },
    /// The bytes are not a valid RLP block list.
    #[error("invalid bundle encoding: {0}")]
    Decode(#[from] DecoderError),
}

/// Outcome of a size check against the blob payload limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeCheck {
    /// Whether the bundle fits.
    pub ok: bool,
    /// The limit that was applied.
    pub limit: usize,
    /// The encoded size of the bundle.
    pub size: usize,
}

/// An ordered, contiguous range of L2 blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    blocks: Vec<L2Block>,
}

impl Bundle {
    /// Creates a bundle, checking that the blocks are ascending by height and linked by parent hash,
    /// and that every header encodes to itself.
    pub fn new(blocks: Vec<L2Block>) -> Result<Self, BundleError> {
        if blocks.is_empty() {
            return Err(BundleError::Empty);
        }
        if let Some(block) = blocks.iter().find(|block| !block.header.is_well_formed()) {
            return Err(BundleError::MalformedHeader {
                height: block.number(),
            });
        }
        for pair in blocks.windows(2) {
            let (parent, child) = (&pair[0], &pair[1]);
            if child.number() != parent.number() + 1 || child.header.parent_hash != parent.hash()
            {
                return Err(BundleError::NotContiguous {
                    height: child.number(),
                    parent_height: parent.number(),
                });
            }
        }
        Ok(Self { blocks })
    }

    /// The blocks of this bundle, lowest height first.
    pub fn blocks(&self) -> &[L2Block] {
        &self.blocks
    }

    /// Number of blocks in the bundle.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Bundles are never empty; provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The last (highest) block.
    pub fn last(&self) -> &L2Block {
        // `new` and `truncate` never leave the bundle empty
        &self.blocks[self.blocks.len() - 1]
    }

    /// Drops every block after the first `len`. A bundle always keeps at least one block.
    pub fn truncate(&mut self, len: usize) {
        self.blocks.truncate(len.max(1));
    }

    /// Encodes the bundle as an RLP list of blocks.
    pub fn encode(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(self.blocks.len());
        for block in &self.blocks {
            stream.append(block);
        }
        stream.out().to_vec()
    }

    /// Decodes a bundle produced by [`Bundle::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, BundleError> {
        let rlp = Rlp::new(bytes);
        let info = rlp.payload_info()?;
        if info.header_len + info.value_len != bytes.len() {
            return Err(DecoderError::RlpIsTooBig.into());
        }
        Self::new(rlp.as_list()?)
    }

    /// Merkle root over the block hashes.
    pub fn block_root(&self) -> H256 {
        let hashes: Vec<H256> = self.blocks.iter().map(L2Block::hash).collect();
        merkle::root(&hashes)
    }

    /// Merkle root over every transaction hash of the bundle, in block order.
    pub fn tx_root(&self) -> H256 {
        let hashes: Vec<H256> = self.blocks.iter().flat_map(L2Block::tx_hashes).collect();
        merkle::root(&hashes)
    }

    /// The state root of the last block.
    pub fn state_root(&self) -> H256 {
        self.last().header.state_root
    }

    /// Checks the encoded size against the DA payload limit.
    pub fn is_under_tx_limit(&self) -> SizeCheck {
        self.is_under_limit(MAX_BLOB_PAYLOAD_SIZE - BLOB_PAYLOAD_RESERVE)
    }

    /// Checks the encoded size against an arbitrary limit. Sizes equal to the limit pass.
    pub fn is_under_limit(&self, limit: usize) -> SizeCheck {
        let size = self.encode().len();
        SizeCheck {
            ok: size <= limit,
            limit,
            size,
        }
    }

    /// Wraps the encoded bundle in a blob for the given namespace.
    pub fn blob(&self, namespace: Namespace) -> Blob {
        Blob {
            namespace,
            data: self.encode(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{l2_chain, legacy_tx};

    #[test]
    fn encoding_round_trips_block_hashes() {
        let bundle = Bundle::new(l2_chain(100, 3, 4)).unwrap();
        let decoded = Bundle::decode(&bundle.encode()).unwrap();
        let hashes = |b: &Bundle| b.blocks().iter().map(L2Block::hash).collect::<Vec<_>>();
        assert_eq!(hashes(&decoded), hashes(&bundle));
        assert_eq!(decoded, bundle);
    }

    #[test]
    fn transactions_appear_verbatim_in_the_encoding() {
        let bundle = Bundle::new(l2_chain(1, 2, 3)).unwrap();
        let encoded = bundle.encode();
        for tx in bundle.blocks().iter().flat_map(|b| &b.transactions) {
            assert!(encoded.windows(tx.len()).any(|window| window == tx.as_ref()));
        }
    }

    #[test]
    fn rejects_gaps_and_broken_links() {
        let mut blocks = l2_chain(10, 3, 0);
        blocks.remove(1);
        assert!(matches!(
            Bundle::new(blocks),
            Err(BundleError::NotContiguous { height: 12, .. })
        ));

        let mut blocks = l2_chain(10, 2, 0);
        blocks[1].header.parent_hash = H256::repeat_byte(9);
        assert!(Bundle::new(blocks).is_err());
        assert!(matches!(Bundle::new(vec![]), Err(BundleError::Empty)));
    }

    #[test]
    fn rejects_headers_with_fork_field_gaps() {
        let mut blocks = l2_chain(10, 3, 1);
        blocks[1].header.base_fee_per_gas = None;
        blocks[1].header.withdrawals_root = Some(H256::repeat_byte(5));
        assert!(matches!(
            Bundle::new(blocks),
            Err(BundleError::MalformedHeader { height: 11 })
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Bundle::decode(&[0xde, 0xad, 0xbe, 0xef]).is_err());
        let mut encoded = Bundle::new(l2_chain(1, 1, 1)).unwrap().encode();
        encoded.push(0);
        assert!(Bundle::decode(&encoded).is_err());
    }

    #[test]
    fn roots_follow_block_contents() {
        let bundle = Bundle::new(l2_chain(5, 3, 2)).unwrap();
        let block_hashes: Vec<_> = bundle.blocks().iter().map(L2Block::hash).collect();
        let tx_hashes: Vec<_> = bundle.blocks().iter().flat_map(L2Block::tx_hashes).collect();
        assert_eq!(bundle.block_root(), merkle::root(&block_hashes));
        assert_eq!(bundle.tx_root(), merkle::root(&tx_hashes));
        assert_eq!(bundle.state_root(), bundle.blocks()[2].header.state_root);
    }

    fn bundle_with_payload(payload: usize) -> Bundle {
        let mut blocks = l2_chain(1, 1, 0);
        blocks[0].transactions = vec![legacy_tx(0, payload)];
        Bundle::new(blocks).unwrap()
    }

    fn bundle_of_exact_size(target: usize) -> Bundle {
        let sample = bundle_with_payload(target / 2);
        let overhead = sample.encode().len() - target / 2;
        bundle_with_payload(target - overhead)
    }

    #[test]
    fn size_limit_is_inclusive() {
        let limit = MAX_BLOB_PAYLOAD_SIZE - BLOB_PAYLOAD_RESERVE;

        let at_limit = bundle_of_exact_size(limit);
        let check = at_limit.is_under_tx_limit();
        assert_eq!(check.size, limit);
        assert!(check.ok);

        let over = bundle_of_exact_size(limit + 1);
        let check = over.is_under_tx_limit();
        assert!(!check.ok);
        assert!(check.size > check.limit);
    }

    #[test]
    fn blob_carries_the_encoding() {
        let bundle = Bundle::new(l2_chain(1, 2, 1)).unwrap();
        let namespace = Namespace::new_v0(b"lumen");
        let blob = bundle.blob(namespace);
        assert_eq!(blob.namespace, namespace);
        assert_eq!(blob.data, bundle.encode());
        assert_eq!(blob.data.len(), bundle.is_under_tx_limit().size);
    }
}
