#![allow(dead_code)]

use lumen_db::NodeDB;
use lumen_mock_da::MockDaService;
use lumen_mock_ethereum::{MockL1Client, MockL1Config, MockL2Client};
use lumen_node::config::{DefenderConfig, RollupConfig};
use lumen_node::{Defender, RollupProducer};
use lumen_rollup_interface::da::{CelestiaPointer, Namespace};
use lumen_rollup_interface::mocks::{l2_chain, rollup_genesis};
use lumen_rollup_interface::rollup::L2Block;
use lumen_rollup_interface::H256;
use tempfile::TempDir;

pub const DA_START_HEIGHT: u64 = 500;

/// A chain with one rollup block over L2 heights 100..=102, published at Celestia height 500.
pub struct Rollup {
    pub da: MockDaService,
    pub l1: MockL1Client,
    pub blocks: Vec<L2Block>,
    pub db: NodeDB,
    /// Hash of the rollup block.
    pub rblock: H256,
    pub pointer: CelestiaPointer,
    _tmpdir: TempDir,
}

impl Rollup {
    pub fn defender(&self) -> Defender<MockDaService, MockL1Client> {
        Defender::new(self.da.clone(), self.l1.clone(), &watcher_config(None)).with_db(self.db.clone())
    }

    pub fn defender_without_db(&self) -> Defender<MockDaService, MockL1Client> {
        Defender::new(self.da.clone(), self.l1.clone(), &watcher_config(None))
    }

    /// Stores a Blobstream commitment over Celestia heights 500..510.
    pub async fn attest(&self) {
        let commitment = self.da.data_commitment(0, DA_START_HEIGHT, DA_START_HEIGHT + 10).await;
        self.l1.add_data_commitment(commitment).await;
    }
}

pub fn watcher_config(start_l1_height: Option<u64>) -> DefenderConfig {
    DefenderConfig {
        poll_delay_ms: 10,
        start_l1_height,
    }
}

pub async fn rolled_up() -> Rollup {
    let tmpdir = tempfile::tempdir().unwrap();
    let db = NodeDB::with_path(tmpdir.path()).unwrap();
    let da = MockDaService::with_start_height(Namespace::new_v0(b"lumen"), DA_START_HEIGHT);
    let l1 = MockL1Client::new(MockL1Config::default(), rollup_genesis(99));
    let blocks = l2_chain(100, 3, 4);
    let l2 = MockL2Client::new(blocks.clone());

    let config = RollupConfig {
        bundle_size: 3,
        poll_delay_ms: 10,
        store_headers: true,
        store_pointers: true,
    };
    let producer = RollupProducer::new(da.clone(), l1.clone(), l2, &config).with_db(db.clone());
    let state = producer.load_state().await.unwrap();
    let state = producer.produce(&state).await.unwrap();

    let rblock = state.head.hash();
    let pointer = db.get_pointer(rblock).unwrap().unwrap();
    l1.register_blob(rblock, &pointer).await;
    Rollup {
        da,
        l1,
        blocks,
        db,
        rblock,
        pointer,
        _tmpdir: tmpdir,
    }
}
