#![doc = include_str!("../README.md")]

pub mod challenger;
pub mod config;
pub mod defender;
pub mod proofs;
pub mod rollup;

pub use challenger::Challenger;
pub use config::{from_toml_path, NodeConfig};
pub use defender::Defender;
pub use proofs::{ProofAssembler, ProofError};
pub use rollup::{ProducedBlock, ProducerError, RollupProducer, RollupState};
