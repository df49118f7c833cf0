//! Celestia data availability adapter: the share format, locating items inside a
//! published bundle, local verification of share proofs, and (with the `native` feature)
//! an RPC client of a Celestia node.
pub mod share_pointer;
pub mod shares;
pub mod types;
mod utils;
pub mod verifier;

#[cfg(feature = "native")]
mod da_service;
#[cfg(feature = "native")]
pub use da_service::{CelestiaService, DaServiceConfig};
