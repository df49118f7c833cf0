//! Pairwise Keccak-256 merkle tree used for the block and transaction roots of a bundle.
//!
//! This tree is *not* domain separated and pads odd levels by duplicating the last node,
//! which matches the roots the settlement contract recomputes.
use ethers_core::types::H256;

use super::keccak_pair;

/// Computes the merkle root of an ordered list of hashes.
///
/// An empty list yields the zero hash. A single hash is still paired with itself,
/// so `root(&[h]) == keccak(h || h)`.
pub fn root(leaves: &[H256]) -> H256 {
    if leaves.is_empty() {
        return H256::zero();
    }

    let mut level = leaves.to_vec();
    loop {
        level = next_level(&level);
        if level.len() == 1 {
            return level[0];
        }
    }
}

fn next_level(nodes: &[H256]) -> Vec<H256> {
    nodes
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => keccak_pair(left, right),
            [last] => keccak_pair(last, last),
            _ => unreachable!("chunks(2) yields one or two elements"),
        })
        .collect()
}
