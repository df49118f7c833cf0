//! Capability traits for the DA layer, the L1 settlement chain and the L2 source chain.
//! Each has a live RPC implementation and an in-memory mock.
pub mod da;
pub mod l1;
pub mod l2;
