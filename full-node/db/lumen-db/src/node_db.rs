use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use lumen_rollup_interface::da::CelestiaPointer;
use lumen_rollup_interface::rollup::{ChallengeEvent, ChallengeStatus, RollupHeader};
use lumen_rollup_interface::H256;
use rocksdb::{Direction, IteratorMode, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::rocks_db_config::gen_rocksdb_options;

/// Prefix of the challenge records kept by the challenge watcher.
pub const CHALLENGE_PREFIX: &str = "da_challenge_";
const POINTER_PREFIX: &str = "pointer_";
const HEADER_PREFIX: &str = "header_";
const WATCHER_HEIGHT_KEY: &str = "challenge_watcher_l1_height";

/// Key of the Celestia pointer of the rollup header with hash `header_hash`.
pub fn pointer_key(header_hash: H256) -> String {
    format!("{POINTER_PREFIX}{header_hash:#x}")
}

/// Key of the rollup header with hash `header_hash`.
pub fn header_key(header_hash: H256) -> String {
    format!("{HEADER_PREFIX}{header_hash:#x}")
}

/// Key of the challenge record on the rollup block `block_hash`.
pub fn challenge_key(block_hash: H256) -> String {
    format!("{CHALLENGE_PREFIX}{block_hash:#x}")
}

/// A RocksDB instance storing JSON values under string keys.
/// Internally, this is roughly just an [`Arc<DB>`].
#[derive(Clone)]
pub struct NodeDB {
    db: Arc<DB>,
}

impl std::fmt::Debug for NodeDB {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDB")
            .field("path", &self.db.path())
            .finish()
    }
}

impl NodeDB {
    const DB_PATH_SUFFIX: &'static str = "node";

    /// Opens a [`NodeDB`] at the path `{path}/node`, creating it if needed.
    pub fn with_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().join(Self::DB_PATH_SUFFIX);
        let db = DB::open(&gen_rocksdb_options(&Default::default(), false), &path)
            .with_context(|| format!("failed to open node db at {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Opened node db");
        Ok(Self { db: Arc::new(db) })
    }

    /// Stores `value` as JSON under `key`.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.db.put(key, bytes)?;
        Ok(())
    }

    /// Reads the JSON value under `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.db.get(key)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .with_context(|| format!("corrupt value under key {key}"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Removes `key`. Removing an absent key is not an error.
    pub fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.db.delete(key)?;
        Ok(())
    }

    /// All entries whose key starts with `prefix`, in key order.
    pub fn scan_prefix<T: DeserializeOwned>(&self, prefix: &str) -> anyhow::Result<Vec<(String, T)>> {
        let mut entries = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            let key = String::from_utf8(key.into_vec()).context("non utf-8 key")?;
            let value = serde_json::from_slice(&value)
                .with_context(|| format!("corrupt value under key {key}"))?;
            entries.push((key, value));
        }
        Ok(entries)
    }

    /// Stores the Celestia pointer of a rollup header.
    pub fn put_pointer(&self, header_hash: H256, pointer: &CelestiaPointer) -> anyhow::Result<()> {
        self.put(&pointer_key(header_hash), pointer)
    }

    /// The Celestia pointer of a rollup header, if it was stored.
    pub fn get_pointer(&self, header_hash: H256) -> anyhow::Result<Option<CelestiaPointer>> {
        self.get(&pointer_key(header_hash))
    }

    /// Stores a produced rollup header under its hash.
    pub fn put_header(&self, header_hash: H256, header: &RollupHeader) -> anyhow::Result<()> {
        self.put(&header_key(header_hash), header)
    }

    /// A stored rollup header.
    pub fn get_header(&self, header_hash: H256) -> anyhow::Result<Option<RollupHeader>> {
        self.get(&header_key(header_hash))
    }

    /// Records a challenge, replacing any earlier record on the same block.
    pub fn put_challenge(&self, event: &ChallengeEvent) -> anyhow::Result<()> {
        self.put(&challenge_key(event.block_hash), event)
    }

    /// The challenge record on `block_hash`.
    pub fn get_challenge(&self, block_hash: H256) -> anyhow::Result<Option<ChallengeEvent>> {
        self.get(&challenge_key(block_hash))
    }

    /// Forgets the challenge record on `block_hash`.
    pub fn delete_challenge(&self, block_hash: H256) -> anyhow::Result<()> {
        self.delete(&challenge_key(block_hash))
    }

    /// Recorded challenges that still await a defense.
    pub fn active_challenges(&self) -> anyhow::Result<Vec<ChallengeEvent>> {
        Ok(self
            .scan_prefix::<ChallengeEvent>(CHALLENGE_PREFIX)?
            .into_iter()
            .map(|(_, event)| event)
            .filter(|event| event.status == ChallengeStatus::ChallengerInitiated)
            .collect())
    }

    /// The last L1 height the challenge watcher scanned.
    pub fn get_watcher_height(&self) -> anyhow::Result<Option<u64>> {
        self.get(WATCHER_HEIGHT_KEY)
    }

    /// Saves the challenge watcher's progress.
    pub fn put_watcher_height(&self, height: u64) -> anyhow::Result<()> {
        self.put(WATCHER_HEIGHT_KEY, &height)
    }
}
