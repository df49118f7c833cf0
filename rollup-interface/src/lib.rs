//! This crate defines the core types and traits shared by every Lumen component: the L2
//! blocks and bundles published to Celestia, the rollup headers committed to L1, the
//! pointers and proofs that tie the two together, and the service traits the node uses to
//! reach each chain.

#![warn(missing_docs)]

pub mod crypto;
pub mod da;
mod node;
pub mod rollup;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

pub use ethers_core::types::{Address, Bytes, H256, U256};
pub use node::*;
