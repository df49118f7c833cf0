//! Live clients of the two EVM chains Lumen bridges: the L1 settlement chain, where the
//! canonical state chain, challenge and chain oracle contracts live, and the L2 chain whose
//! blocks are rolled up.
pub mod bindings;
mod client;
mod config;
mod l2;

pub use client::EthereumClient;
pub use config::{EthereumConfig, SIGNER_KEY_ENV};
pub use l2::EthL2Client;
