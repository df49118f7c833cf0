//! Hashing primitives shared by every Lumen component.
pub mod merkle;

use ethers_core::types::H256;
use ethers_core::utils::keccak256;

/// Hashes the concatenation of `left` and `right` with Keccak-256.
pub fn keccak_pair(left: &H256, right: &H256) -> H256 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left.as_bytes());
    buf[32..].copy_from_slice(right.as_bytes());
    H256(keccak256(buf))
}
