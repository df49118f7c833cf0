//! Data availability types: namespaces, blobs, pointers into Celestia, and proofs.
mod namespace;
mod pointer;
pub mod proof;

pub use namespace::*;
pub use pointer::*;
pub use proof::*;

/// Raw data submitted to a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// Namespace the blob is published in.
    pub namespace: Namespace,
    /// The blob's payload.
    pub data: Vec<u8>,
}
