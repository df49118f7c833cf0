use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use lumen_db::NodeDB;
use lumen_rollup_interface::da::CelestiaPointer;
use lumen_rollup_interface::rollup::{Bundle, RollupHeader};
use lumen_rollup_interface::services::da::DaService;
use lumen_rollup_interface::services::l1::{L1Client, SubmittedTx};
use lumen_rollup_interface::services::l2::L2Client;
use lumen_rollup_interface::H256;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::RollupConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProducerError {
    /// The L2 chain has no block past the rollup head.
    #[error("no new L2 blocks: rollup head is at {head}, L2 chain at {l2_height}")]
    NothingToRollUp { head: u64, l2_height: u64 },
    /// A single L2 block is too large for one blob.
    #[error("L2 block {height} alone is {size} bytes, over the {limit} byte blob limit")]
    BlockTooLarge { height: u64, size: usize, limit: usize },
    /// A transaction was mined but reverted.
    #[error("transaction {0:?} failed")]
    TxFailed(H256),
}

/// The producer's view of the canonical state chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollupState {
    /// The last header accepted by the canonical state chain.
    pub head: RollupHeader,
}

/// A rollup block built on top of the current head, with its bundle already on the DA layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducedBlock {
    pub header: RollupHeader,
    pub pointer: CelestiaPointer,
    /// Number of L2 blocks bundled.
    pub bundle_len: usize,
}

/// Bundles L2 blocks, publishes them to the DA layer and commits their headers to the
/// canonical state chain.
pub struct RollupProducer<Da, L1, L2> {
    da: Da,
    l1: L1,
    l2: L2,
    db: Option<NodeDB>,
    bundle_size: u64,
    poll_delay: Duration,
    store_headers: bool,
    store_pointers: bool,
}

impl<Da, L1, L2> RollupProducer<Da, L1, L2>
where
    Da: DaService,
    L1: L1Client,
    L2: L2Client,
{
    pub fn new(da: Da, l1: L1, l2: L2, config: &RollupConfig) -> Self {
        Self {
            da,
            l1,
            l2,
            db: None,
            bundle_size: config.bundle_size,
            poll_delay: config.poll_delay(),
            store_headers: config.store_headers,
            store_pointers: config.store_pointers,
        }
    }

    /// Keeps produced headers and pointers in `db`, as enabled by the configuration.
    pub fn with_db(mut self, db: NodeDB) -> Self {
        self.db = Some(db);
        self
    }

    /// Reads the current head from the canonical state chain.
    pub async fn load_state(&self) -> anyhow::Result<RollupState> {
        let head = self
            .l1
            .get_rollup_head()
            .await
            .context("failed to read the rollup head")?;
        Ok(RollupState { head })
    }

    /// Bundles the L2 blocks following the head, publishes the bundle, and returns the header
    /// that commits to it. The header and pointer are stored before returning, as configured,
    /// so a failed submission does not lose the published bundle. Nothing is submitted to L1.
    pub async fn create_next_block(&self, state: &RollupState) -> anyhow::Result<ProducedBlock> {
        let epoch = self.l1.get_height().await?;
        let l2_height = self.l2.get_height().await?;
        let head = &state.head;

        let available = l2_height.saturating_sub(head.l2_height);
        let bundle_size = self.bundle_size.min(available);
        if bundle_size == 0 {
            return Err(ProducerError::NothingToRollUp {
                head: head.l2_height,
                l2_height,
            }
            .into());
        }

        let prev_hash = self.l1.hash_header(head).await?;
        let start = head.l2_height + 1;
        debug!(start, end = start + bundle_size - 1, "Fetching L2 blocks");
        let blocks = self.l2.get_blocks(start, start + bundle_size).await?;
        let bundle = self.shrink_to_fit(Bundle::new(blocks)?)?;

        let pointer = self.da.publish_bundle(&bundle).await?;
        info!(
            blocks = bundle.len(),
            l2_height = bundle.last().number(),
            %pointer,
            "Published bundle"
        );

        let header = RollupHeader {
            prev_hash,
            ..RollupHeader::next(head, epoch, &bundle, &pointer)
        };
        let block = ProducedBlock {
            header,
            pointer,
            bundle_len: bundle.len(),
        };
        self.persist(&block).await?;
        Ok(block)
    }

    fn shrink_to_fit(&self, mut bundle: Bundle) -> anyhow::Result<Bundle> {
        loop {
            let check = bundle.is_under_tx_limit();
            if check.ok {
                return Ok(bundle);
            }
            if bundle.len() == 1 {
                return Err(ProducerError::BlockTooLarge {
                    height: bundle.last().number(),
                    size: check.size,
                    limit: check.limit,
                }
                .into());
            }
            let half = bundle.len() / 2;
            warn!(
                size = check.size,
                limit = check.limit,
                from = bundle.len(),
                to = half,
                "Bundle too large, halving"
            );
            bundle.truncate(half);
        }
    }

    /// Pushes `header` to the canonical state chain.
    pub async fn submit_block(&self, header: &RollupHeader) -> anyhow::Result<SubmittedTx> {
        self.l1.push_rollup_head(header).await
    }

    /// Produces and submits one rollup block, returning the advanced state.
    /// The head only moves once the push is mined successfully, or when nothing was sent.
    pub async fn produce(&self, state: &RollupState) -> anyhow::Result<RollupState> {
        let block = self.create_next_block(state).await?;
        let tx = self.submit_block(&block.header).await?;
        if tx.sent {
            let receipt = self.l1.wait(tx.hash).await?;
            if !receipt.success {
                return Err(ProducerError::TxFailed(tx.hash).into());
            }
            info!(
                l2_height = block.header.l2_height,
                l1_block = receipt.block_number,
                tx = ?tx.hash,
                "Rollup block committed"
            );
        } else {
            info!(
                l2_height = block.header.l2_height,
                tx = ?tx.hash,
                "Rollup block signed but not sent"
            );
        }
        Ok(RollupState { head: block.header })
    }

    async fn persist(&self, block: &ProducedBlock) -> anyhow::Result<()> {
        let Some(db) = &self.db else {
            return Ok(());
        };
        if !self.store_headers && !self.store_pointers {
            return Ok(());
        }
        let hash = self.l1.hash_header(&block.header).await?;
        if self.store_headers {
            db.put_header(hash, &block.header)?;
        }
        if self.store_pointers {
            db.put_pointer(hash, &block.pointer)?;
        }
        Ok(())
    }

    /// Produces rollup blocks until `shutdown` resolves. Any failure stops the loop and is
    /// returned; the state returned on shutdown is the last committed head.
    pub async fn run(
        &self,
        mut state: RollupState,
        shutdown: impl Future<Output = ()>,
    ) -> anyhow::Result<RollupState> {
        tokio::pin!(shutdown);
        info!(l2_height = state.head.l2_height, bundle_size = self.bundle_size, "Starting rollup production");
        loop {
            let l2_height = tokio::select! {
                _ = &mut shutdown => break,
                height = self.l2.get_height() => height,
            };
            let l2_height = match l2_height {
                Ok(height) => height,
                Err(e) => {
                    error!(error = ?e, "Rollup production halted");
                    return Err(e);
                }
            };

            if l2_height.saturating_sub(state.head.l2_height) < self.bundle_size {
                debug!(
                    head = state.head.l2_height,
                    l2_height,
                    "Waiting for a full bundle"
                );
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(self.poll_delay) => continue,
                }
            }

            state = match self.produce(&state).await {
                Ok(state) => state,
                Err(e) => {
                    error!(error = ?e, "Rollup production halted");
                    return Err(e);
                }
            };
        }
        info!(l2_height = state.head.l2_height, "Rollup production stopped");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use lumen_mock_da::MockDaService;
    use lumen_mock_ethereum::{MockL1Client, MockL1Config, MockL2Client};
    use lumen_rollup_interface::da::Namespace;
    use lumen_rollup_interface::mocks::{l2_chain, rollup_genesis};

    use super::*;

    fn config(bundle_size: u64) -> RollupConfig {
        RollupConfig {
            bundle_size,
            poll_delay_ms: 10,
            store_headers: false,
            store_pointers: false,
        }
    }

    fn producer(
        bundle_size: u64,
        l2_blocks: u64,
    ) -> RollupProducer<MockDaService, MockL1Client, MockL2Client> {
        let da = MockDaService::with_start_height(Namespace::new_v0(b"lumen"), 500);
        let l1 = MockL1Client::new(MockL1Config::default(), rollup_genesis(99));
        let l2 = MockL2Client::new(l2_chain(100, l2_blocks, 2));
        RollupProducer::new(da, l1, l2, &config(bundle_size))
    }

    #[tokio::test]
    async fn bundle_is_capped_by_the_l2_chain() {
        let producer = producer(10, 3);
        let state = producer.load_state().await.unwrap();
        let block = producer.create_next_block(&state).await.unwrap();
        assert_eq!(block.bundle_len, 3);
        assert_eq!(block.header.l2_height, 102);
        assert_eq!(block.header.celestia_height, 500);
        assert_eq!(block.header.prev_hash, state.head.hash());
        assert_eq!(block.header.epoch, 1_000);
    }

    #[tokio::test]
    async fn nothing_to_roll_up() {
        let producer = producer(10, 0);
        producer.l2.extend(l2_chain(99, 1, 0)).await;
        let state = producer.load_state().await.unwrap();
        let error = producer.create_next_block(&state).await.unwrap_err();
        assert_eq!(
            error.downcast_ref::<ProducerError>(),
            Some(&ProducerError::NothingToRollUp {
                head: 99,
                l2_height: 99
            })
        );
    }

    #[tokio::test]
    async fn produce_advances_the_head() {
        let producer = producer(2, 5);
        let state = producer.load_state().await.unwrap();
        let state = producer.produce(&state).await.unwrap();
        assert_eq!(state.head.l2_height, 101);
        let state = producer.produce(&state).await.unwrap();
        assert_eq!(state.head.l2_height, 103);
        assert_eq!(producer.l1.get_rollup_head_index().await.unwrap(), 2);
        assert_eq!(producer.l1.get_rollup_head().await.unwrap(), state.head);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_and_leaves_partial_bundles() {
        let producer = producer(2, 5);
        let state = producer.load_state().await.unwrap();
        let shutdown = tokio::time::sleep(Duration::from_millis(200));
        let state = producer.run(state, shutdown).await.unwrap();
        // the fifth block waits for a full bundle
        assert_eq!(state.head.l2_height, 103);
    }

    #[tokio::test]
    async fn run_halts_on_error() {
        let producer = producer(1, 2);
        let state = RollupState {
            head: RollupHeader {
                l2_height: 99,
                epoch: 7,
                ..Default::default()
            },
        };
        // the head does not link to the contract's chain, so the push reverts
        let error = producer
            .run(state, std::future::pending())
            .await
            .unwrap_err();
        assert!(error.to_string().contains("pushBlock reverted"));
    }

    #[tokio::test]
    async fn produced_blocks_are_stored() {
        let tmpdir = tempfile::tempdir().unwrap();
        let db = NodeDB::with_path(tmpdir.path()).unwrap();
        let config = RollupConfig {
            store_headers: true,
            store_pointers: true,
            ..config(3)
        };
        let da = MockDaService::with_start_height(Namespace::new_v0(b"lumen"), 500);
        let l1 = MockL1Client::new(MockL1Config::default(), rollup_genesis(99));
        let l2 = MockL2Client::new(l2_chain(100, 3, 2));
        let producer = RollupProducer::new(da, l1, l2, &config).with_db(db.clone());

        let state = producer.load_state().await.unwrap();
        let state = producer.produce(&state).await.unwrap();
        let hash = state.head.hash();
        assert_eq!(db.get_header(hash).unwrap(), Some(state.head.clone()));
        assert_eq!(db.get_pointer(hash).unwrap().unwrap().height, 500);
    }

    #[tokio::test]
    async fn pointer_is_stored_before_submission() {
        let tmpdir = tempfile::tempdir().unwrap();
        let db = NodeDB::with_path(tmpdir.path()).unwrap();
        let config = RollupConfig {
            store_headers: false,
            store_pointers: true,
            ..config(3)
        };
        let da = MockDaService::with_start_height(Namespace::new_v0(b"lumen"), 500);
        let l1 = MockL1Client::new(MockL1Config::default(), rollup_genesis(99));
        let l2 = MockL2Client::new(l2_chain(100, 3, 2));
        let producer = RollupProducer::new(da, l1, l2, &config).with_db(db.clone());

        let state = producer.load_state().await.unwrap();
        let block = producer.create_next_block(&state).await.unwrap();
        let hash = block.header.hash();
        assert_eq!(db.get_pointer(hash).unwrap(), Some(block.pointer));
        assert_eq!(db.get_header(hash).unwrap(), None);
        assert_eq!(producer.l1.get_rollup_head_index().await.unwrap(), 0);

        // a rejected push leaves the pointer of the published bundle in place
        let unlinked = RollupHeader {
            prev_hash: H256::repeat_byte(1),
            ..block.header.clone()
        };
        assert!(producer.submit_block(&unlinked).await.is_err());
        assert_eq!(db.get_pointer(hash).unwrap(), Some(block.pointer));
    }
}
