//! The data square of a mock DA block: a pay-for-blob share, the blob's shares, then tail
//! padding up to a whole row. Rows are `ROW_WIDTH` shares wide and carry no parity data.
use lumen_celestia_adapter::shares::{split_blob, Share, SHARE_SIZE};
use lumen_celestia_adapter::verifier::{binary_merkle, nmt};
use lumen_rollup_interface::da::{
    Blob, Namespace, NamespaceNode, ShareProof, PAY_FOR_BLOB_NAMESPACE, TAIL_PADDING_NAMESPACE,
};
use lumen_rollup_interface::{Bytes, H256};
use nmt_rs::CelestiaNmt;

/// Number of shares in a row of the square.
pub const ROW_WIDTH: usize = 4;

/// An original data square with its row roots and data root.
#[derive(Debug, Clone, PartialEq)]
pub struct Square {
    shares: Vec<(Namespace, Vec<u8>)>,
    row_roots: Vec<NamespaceNode>,
    data_root: H256,
}

fn padding_share() -> Vec<u8> {
    let mut share = TAIL_PADDING_NAMESPACE.to_bytes().to_vec();
    share.resize(SHARE_SIZE, 0);
    share
}

impl Square {
    /// Lays out a square holding `blob`, paid for by `tx_hash`. Returns the square and the
    /// index of the blob's first share.
    pub fn with_blob(blob: &Blob, tx_hash: H256) -> (Self, u64) {
        let pay_for_blob = split_blob(&Blob {
            namespace: PAY_FOR_BLOB_NAMESPACE,
            data: tx_hash.as_bytes().to_vec(),
        });
        let mut shares: Vec<(Namespace, Vec<u8>)> = pay_for_blob
            .iter()
            .chain(&split_blob(blob))
            .map(|share: &Share| (share.namespace(), share.raw().to_vec()))
            .collect();
        let share_start = pay_for_blob.len() as u64;
        while shares.len() % ROW_WIDTH != 0 {
            shares.push((TAIL_PADDING_NAMESPACE, padding_share()));
        }
        (Self::new(shares), share_start)
    }

    fn new(shares: Vec<(Namespace, Vec<u8>)>) -> Self {
        let row_roots: Vec<NamespaceNode> = (0..shares.len().div_ceil(ROW_WIDTH))
            .filter_map(|row| nmt::row_root(&mut Self::row_tree(&shares, row)?))
            .collect();
        let data_root = binary_merkle::root(&Self::row_leaves(&row_roots));
        Self {
            shares,
            row_roots,
            data_root,
        }
    }

    /// The namespaced merkle tree of row `row`.
    fn row_tree(shares: &[(Namespace, Vec<u8>)], row: usize) -> Option<CelestiaNmt> {
        let start = row * ROW_WIDTH;
        let row_shares = shares.get(start..(start + ROW_WIDTH).min(shares.len()))?;
        nmt::row_tree(row_shares.iter().map(|(namespace, share)| (*namespace, share.as_slice())))
    }

    fn row_leaves(row_roots: &[NamespaceNode]) -> Vec<[u8; 90]> {
        row_roots.iter().map(NamespaceNode::to_bytes).collect()
    }

    /// Root over the serialized row roots.
    pub fn data_root(&self) -> H256 {
        self.data_root
    }

    /// Number of shares, padding included.
    pub fn len(&self) -> usize {
        self.shares.len()
    }

    /// Whether the square holds no shares.
    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// Raw shares `[start, end)`.
    pub fn shares(&self, start: usize, end: usize) -> Option<Vec<Vec<u8>>> {
        let range = self.shares.get(start..end)?;
        Some(range.iter().map(|(_, share)| share.clone()).collect())
    }

    /// Proves shares `[start, end)` of `namespace` against their rows and the rows against
    /// the data root.
    pub fn prove(&self, namespace: Namespace, start: usize, end: usize) -> Option<ShareProof> {
        if start >= end || end > self.shares.len() {
            return None;
        }
        let row_leaves = Self::row_leaves(&self.row_roots);
        let mut proof = ShareProof {
            data: self.shares(start, end)?.into_iter().map(Bytes::from).collect(),
            share_proofs: Vec::new(),
            namespace,
            row_roots: Vec::new(),
            row_proofs: Vec::new(),
        };

        for row in start / ROW_WIDTH..=(end - 1) / ROW_WIDTH {
            let row_start = row * ROW_WIDTH;
            let row_end = (row_start + ROW_WIDTH).min(self.shares.len());
            let begin = start.max(row_start) - row_start;
            let finish = end.min(row_end) - row_start;
            let mut tree = Self::row_tree(&self.shares, row)?;
            proof
                .share_proofs
                .push(nmt::prove_range(&mut tree, begin, finish)?);
            proof.row_roots.push(self.row_roots[row]);
            proof.row_proofs.push(binary_merkle::prove(&row_leaves, row)?);
        }
        Some(proof)
    }
}
