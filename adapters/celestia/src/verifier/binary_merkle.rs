//! RFC-6962 binary merkle trees over SHA-256, as used by Tendermint and Blobstream.
//!
//! Trees and proofs are built with `nmt_rs`. Its proofs list siblings in tree order, while
//! the contracts take them from the leaf upwards, so proofs are reordered at this boundary.
use lumen_rollup_interface::da::BinaryMerkleProof;
use lumen_rollup_interface::H256;
use nmt_rs::simple_merkle::db::MemDb;
use nmt_rs::simple_merkle::tree::{MerkleHash, MerkleTree};
use nmt_rs::TmSha2Hasher;

type Tree = MerkleTree<MemDb<[u8; 32]>, TmSha2Hasher>;

fn tree<L: AsRef<[u8]>>(leaves: &[L]) -> Tree {
    let mut tree = Tree::new();
    for leaf in leaves {
        tree.push_raw_leaf(leaf.as_ref());
    }
    tree
}

/// Largest power of two strictly below `n`, or 0 for `n <= 1`.
fn split_point(n: u64) -> u64 {
    n.next_power_of_two() / 2
}

/// Position of each sibling on the path from the root to leaf `key`, root first.
/// `true` marks a sibling on the left.
fn sibling_sides(mut key: u64, mut total: u64) -> Vec<bool> {
    let mut sides = Vec::new();
    while total > 1 {
        let split = split_point(total);
        if key < split {
            sides.push(false);
            total = split;
        } else {
            sides.push(true);
            key -= split;
            total -= split;
        }
    }
    sides
}

/// Reorders siblings from tree order (left siblings root first, then right siblings leaf
/// first) to leaf-first order.
fn leaf_first(siblings: &[[u8; 32]], key: u64, total: u64) -> Option<Vec<H256>> {
    let sides = sibling_sides(key, total);
    if siblings.len() != sides.len() {
        return None;
    }
    let lefts = sides.iter().filter(|left| **left).count();
    let (left_nodes, right_nodes) = siblings.split_at(lefts);
    let mut left_nodes = left_nodes.iter();
    let mut right_nodes = right_nodes.iter().rev();

    let mut nodes = Vec::with_capacity(sides.len());
    for left in sides {
        let node = if left {
            left_nodes.next()
        } else {
            right_nodes.next()
        };
        nodes.push(H256(*node?));
    }
    nodes.reverse();
    Some(nodes)
}

pub fn root<L: AsRef<[u8]>>(leaves: &[L]) -> H256 {
    H256(tree(leaves).root())
}

/// Builds the inclusion proof of leaf `index`.
pub fn prove<L: AsRef<[u8]>>(leaves: &[L], index: usize) -> Option<BinaryMerkleProof> {
    if index >= leaves.len() {
        return None;
    }
    let proof = tree(leaves).build_range_proof(index..index + 1);
    let num_leaves = leaves.len() as u64;
    Some(BinaryMerkleProof {
        side_nodes: leaf_first(&proof.siblings, index as u64, num_leaves)?,
        key: index as u64,
        num_leaves,
    })
}

/// Recomputes the root a proof commits `leaf` to, if the proof is well formed.
pub fn compute_root(proof: &BinaryMerkleProof, leaf: &[u8]) -> Option<H256> {
    if proof.key >= proof.num_leaves {
        return None;
    }
    let sides = sibling_sides(proof.key, proof.num_leaves);
    if sides.len() != proof.side_nodes.len() {
        return None;
    }
    let hasher = TmSha2Hasher {};
    let mut hash = hasher.hash_leaf(leaf);
    for (left, node) in sides.iter().rev().zip(&proof.side_nodes) {
        hash = if *left {
            hasher.hash_nodes(&node.0, &hash)
        } else {
            hasher.hash_nodes(&hash, &node.0)
        };
    }
    Some(H256(hash))
}

pub fn verify(proof: &BinaryMerkleProof, root: &H256, leaf: &[u8]) -> bool {
    compute_root(proof, leaf).as_ref() == Some(root)
}
