//! Proof types handed to the challenge and chain oracle contracts.
//!
//! Every type here mirrors a Solidity struct field for field. Their token encodings are
//! the wire format, so field order and widths must not change.
use ethers_core::abi::{self, InvalidOutputType, Token, Tokenizable, TokenizableItem};
use ethers_core::types::{Bytes, H256};
use serde::{Deserialize, Serialize};

use super::namespace::{Namespace, NAMESPACE_SIZE};

/// Serialized length of a [`NamespaceNode`]: two namespaces and a digest.
pub const NAMESPACE_NODE_SIZE: usize = 2 * NAMESPACE_SIZE + 32;

/// A node of a namespaced merkle tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceNode {
    pub min: Namespace,
    pub max: Namespace,
    pub digest: H256,
}

impl NamespaceNode {
    /// `min || max || digest`, the form in which row roots are committed to the data root.
    pub fn to_bytes(&self) -> [u8; NAMESPACE_NODE_SIZE] {
        let mut out = [0; NAMESPACE_NODE_SIZE];
        out[..NAMESPACE_SIZE].copy_from_slice(&self.min.to_bytes());
        out[NAMESPACE_SIZE..2 * NAMESPACE_SIZE].copy_from_slice(&self.max.to_bytes());
        out[2 * NAMESPACE_SIZE..].copy_from_slice(self.digest.as_bytes());
        out
    }

    /// Parses the serialized form produced by [`NamespaceNode::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != NAMESPACE_NODE_SIZE {
            return None;
        }
        Some(Self {
            min: Namespace::from_bytes(&bytes[..NAMESPACE_SIZE]).ok()?,
            max: Namespace::from_bytes(&bytes[NAMESPACE_SIZE..2 * NAMESPACE_SIZE]).ok()?,
            digest: H256::from_slice(&bytes[2 * NAMESPACE_SIZE..]),
        })
    }
}

/// A namespaced merkle tree range proof for the shares of one row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceMerkleMultiproof {
    pub begin_key: u64,
    pub end_key: u64,
    pub side_nodes: Vec<NamespaceNode>,
}

/// An RFC-6962 binary merkle proof. Side nodes are ordered from the leaf upwards.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryMerkleProof {
    pub side_nodes: Vec<H256>,
    pub key: u64,
    pub num_leaves: u64,
}

/// A `(height, dataRoot)` pair, the leaf of a Blobstream data commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRootTuple {
    pub height: u64,
    pub data_root: H256,
}

impl DataRootTuple {
    /// `abi.encode(height, dataRoot)`, the leaf bytes hashed into a data commitment.
    pub fn abi_encode(&self) -> Vec<u8> {
        abi::encode(&[self.into_token()])
    }
}

/// Proof that a data root tuple belongs to the Blobstream commitment with the given nonce.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationProof {
    pub tuple_root_nonce: u64,
    pub tuple: DataRootTuple,
    pub proof: BinaryMerkleProof,
}

/// The DA-side half of a shares proof: shares, their row proofs and the row roots.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareProof {
    pub data: Vec<Bytes>,
    pub share_proofs: Vec<NamespaceMerkleMultiproof>,
    pub namespace: Namespace,
    pub row_roots: Vec<NamespaceNode>,
    pub row_proofs: Vec<BinaryMerkleProof>,
}

impl ShareProof {
    /// Completes the proof with the attestation binding its data root to L1.
    pub fn with_attestation(self, attestation_proof: AttestationProof) -> SharesProof {
        SharesProof {
            data: self.data,
            share_proofs: self.share_proofs,
            namespace: self.namespace,
            row_roots: self.row_roots,
            row_proofs: self.row_proofs,
            attestation_proof,
        }
    }
}

/// Full proof that a set of shares was published to Celestia and attested on L1.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharesProof {
    /// Raw shares, in order.
    pub data: Vec<Bytes>,
    /// One namespace proof per row spanned.
    pub share_proofs: Vec<NamespaceMerkleMultiproof>,
    pub namespace: Namespace,
    /// Roots of the rows spanned.
    pub row_roots: Vec<NamespaceNode>,
    /// Proofs of the row roots against the data root.
    pub row_proofs: Vec<BinaryMerkleProof>,
    pub attestation_proof: AttestationProof,
}

/// A Blobstream data commitment covering Celestia heights `[start_block, end_block)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataCommitment {
    pub nonce: u64,
    pub start_block: u64,
    pub end_block: u64,
    pub data_commitment: H256,
}

impl DataCommitment {
    /// Whether the commitment covers `height`.
    pub fn contains(&self, height: u64) -> bool {
        self.start_block <= height && height < self.end_block
    }
}

impl Tokenizable for NamespaceNode {
    fn from_token(token: Token) -> Result<Self, InvalidOutputType> {
        let (min, max, digest) = <(Namespace, Namespace, H256)>::from_token(token)?;
        Ok(Self { min, max, digest })
    }

    fn into_token(self) -> Token {
        (self.min, self.max, self.digest).into_token()
    }
}

impl TokenizableItem for NamespaceNode {}

impl Tokenizable for NamespaceMerkleMultiproof {
    fn from_token(token: Token) -> Result<Self, InvalidOutputType> {
        let (begin_key, end_key, side_nodes) = <(u64, u64, Vec<NamespaceNode>)>::from_token(token)?;
        Ok(Self {
            begin_key,
            end_key,
            side_nodes,
        })
    }

    fn into_token(self) -> Token {
        (self.begin_key, self.end_key, self.side_nodes).into_token()
    }
}

impl TokenizableItem for NamespaceMerkleMultiproof {}

impl Tokenizable for BinaryMerkleProof {
    fn from_token(token: Token) -> Result<Self, InvalidOutputType> {
        let (side_nodes, key, num_leaves) = <(Vec<H256>, u64, u64)>::from_token(token)?;
        Ok(Self {
            side_nodes,
            key,
            num_leaves,
        })
    }

    fn into_token(self) -> Token {
        (self.side_nodes, self.key, self.num_leaves).into_token()
    }
}

impl TokenizableItem for BinaryMerkleProof {}

impl Tokenizable for DataRootTuple {
    fn from_token(token: Token) -> Result<Self, InvalidOutputType> {
        let (height, data_root) = <(u64, H256)>::from_token(token)?;
        Ok(Self { height, data_root })
    }

    fn into_token(self) -> Token {
        (self.height, self.data_root).into_token()
    }
}

impl Tokenizable for AttestationProof {
    fn from_token(token: Token) -> Result<Self, InvalidOutputType> {
        let (tuple_root_nonce, tuple, proof) =
            <(u64, DataRootTuple, BinaryMerkleProof)>::from_token(token)?;
        Ok(Self {
            tuple_root_nonce,
            tuple,
            proof,
        })
    }

    fn into_token(self) -> Token {
        (self.tuple_root_nonce, self.tuple, self.proof).into_token()
    }
}

impl Tokenizable for SharesProof {
    fn from_token(token: Token) -> Result<Self, InvalidOutputType> {
        let (data, share_proofs, namespace, row_roots, row_proofs, attestation_proof) = <(
            Vec<Bytes>,
            Vec<NamespaceMerkleMultiproof>,
            Namespace,
            Vec<NamespaceNode>,
            Vec<BinaryMerkleProof>,
            AttestationProof,
        )>::from_token(token)?;
        Ok(Self {
            data,
            share_proofs,
            namespace,
            row_roots,
            row_proofs,
            attestation_proof,
        })
    }

    fn into_token(self) -> Token {
        (
            self.data,
            self.share_proofs,
            self.namespace,
            self.row_roots,
            self.row_proofs,
            self.attestation_proof,
        )
            .into_token()
    }
}

#[cfg(test)]
mod tests {
    use ethers_core::types::U256;

    use super::*;

    #[test]
    fn tuple_leaf_is_two_words() {
        let tuple = DataRootTuple {
            height: 0x0102,
            data_root: H256::repeat_byte(0xaa),
        };
        let encoded = tuple.abi_encode();
        assert_eq!(encoded.len(), 64);
        assert_eq!(&encoded[30..32], &[0x01, 0x02]);
        assert_eq!(&encoded[32..], &[0xaa; 32]);
    }

    #[test]
    fn shares_proof_token_shape() {
        let node = NamespaceNode {
            min: Namespace::new_v0(b"a"),
            max: Namespace::new_v0(b"b"),
            digest: H256::repeat_byte(1),
        };
        let proof = SharesProof {
            data: vec![Bytes::from(vec![7; 512])],
            share_proofs: vec![NamespaceMerkleMultiproof {
                begin_key: 1,
                end_key: 2,
                side_nodes: vec![node],
            }],
            namespace: Namespace::new_v0(b"lumen"),
            row_roots: vec![node],
            row_proofs: vec![BinaryMerkleProof {
                side_nodes: vec![H256::repeat_byte(2)],
                key: 3,
                num_leaves: 4,
            }],
            attestation_proof: AttestationProof {
                tuple_root_nonce: 5,
                tuple: DataRootTuple {
                    height: 6,
                    data_root: H256::repeat_byte(7),
                },
                proof: BinaryMerkleProof::default(),
            },
        };

        let token = proof.clone().into_token();
        let Token::Tuple(fields) = &token else {
            panic!("expected a tuple, got {token:?}");
        };
        assert_eq!(fields.len(), 6);
        assert_eq!(
            fields[2],
            Token::Tuple(vec![
                Token::FixedBytes(vec![0]),
                Token::FixedBytes(Namespace::new_v0(b"lumen").id.to_vec()),
            ])
        );
        let Token::Tuple(attestation) = &fields[5] else {
            panic!("expected a tuple");
        };
        assert_eq!(attestation[0], Token::Uint(U256::from(5)));

        assert_eq!(SharesProof::from_token(token).unwrap(), proof);
    }

    #[test]
    fn node_bytes_round_trip() {
        let node = NamespaceNode {
            min: Namespace::new_v0(b"x"),
            max: Namespace::new_v0(b"y"),
            digest: H256::repeat_byte(9),
        };
        assert_eq!(NamespaceNode::from_bytes(&node.to_bytes()), Some(node));
        assert_eq!(NamespaceNode::from_bytes(&[0; 3]), None);
    }

    #[test]
    fn commitments_are_half_open() {
        let commitment = DataCommitment {
            nonce: 1,
            start_block: 10,
            end_block: 20,
            data_commitment: H256::zero(),
        };
        assert!(commitment.contains(10));
        assert!(commitment.contains(19));
        assert!(!commitment.contains(20));
        assert!(!commitment.contains(9));
    }
}
