//! Persistence for the Lumen node: a single RocksDB instance holding JSON values under
//! string keys. Headers and pointers are written by the producer, challenge records by the
//! challenge watcher.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod node_db;
/// Tuning options for the underlying RocksDB instance.
pub mod rocks_db_config;

pub use node_db::{challenge_key, header_key, pointer_key, NodeDB, CHALLENGE_PREFIX};
