//! Answers data availability challenges and feeds the chain oracle with rollup data.
use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use lumen_celestia_adapter::share_pointer::{find_header, find_transaction};
use lumen_celestia_adapter::shares::{parse_shares, SHARE_SIZE};
use lumen_db::NodeDB;
use lumen_rollup_interface::da::{CelestiaPointer, SharePointer};
use lumen_rollup_interface::rollup::block::is_legacy_envelope;
use lumen_rollup_interface::rollup::{ChallengeEvent, ChallengeStatus, RollupHeader};
use lumen_rollup_interface::services::da::DaService;
use lumen_rollup_interface::services::l1::{L1Client, SubmittedTx};
use lumen_rollup_interface::H256;
use tracing::{debug, info, warn};

use crate::config::DefenderConfig;
use crate::proofs::{ProofAssembler, COMMITMENT_SCAN_WINDOW};

/// Splits `[from, to]` into inclusive windows of at most `window` blocks, oldest first.
fn ascending_windows(from: u64, to: u64, window: u64) -> impl Iterator<Item = (u64, u64)> {
    let window = window.max(1);
    (from..=to)
        .step_by(window as usize)
        .map(move |low| (low, low.saturating_add(window - 1).min(to)))
}

/// A challenge can no longer be defended once L1 time passes its expiry.
fn is_expired(challenge: &ChallengeEvent, now: u64) -> bool {
    challenge.expiry < now
}

/// Defends rollup blocks against data availability challenges.
pub struct Defender<Da, L1> {
    da: Da,
    l1: L1,
    proofs: ProofAssembler<Da, L1>,
    db: Option<NodeDB>,
    poll_delay: Duration,
    start_l1_height: Option<u64>,
}

impl<Da, L1> Defender<Da, L1>
where
    Da: DaService + Clone,
    L1: L1Client + Clone,
{
    pub fn new(da: Da, l1: L1, config: &DefenderConfig) -> Self {
        Self {
            proofs: ProofAssembler::new(da.clone(), l1.clone()),
            da,
            l1,
            db: None,
            poll_delay: config.poll_delay(),
            start_l1_height: config.start_l1_height,
        }
    }

    /// Resolves pointers from `db` and lets the challenge watcher keep its records there.
    pub fn with_db(mut self, db: NodeDB) -> Self {
        self.db = Some(db);
        self
    }

    fn db(&self) -> anyhow::Result<&NodeDB> {
        self.db
            .as_ref()
            .ok_or_else(|| anyhow!("the challenge watcher needs a node database"))
    }

    /// The header with hash `block_hash` and the pointer to its bundle.
    async fn resolve(&self, block_hash: H256) -> anyhow::Result<(RollupHeader, CelestiaPointer)> {
        let header = self.l1.get_header_by_hash(block_hash).await?;

        let stored = match &self.db {
            Some(db) => db.get_pointer(block_hash)?,
            None => None,
        };
        let pointer = match stored {
            Some(pointer) => pointer,
            None => {
                debug!(?block_hash, height = header.celestia_height, "Pointer not stored, querying the DA layer");
                self.da
                    .find_pointer(header.celestia_height)
                    .await?
                    .ok_or_else(|| {
                        anyhow!(
                            "no bundle found at celestia height {} for rollup block {block_hash:?}",
                            header.celestia_height
                        )
                    })?
            }
        };

        if pointer.data_root != header.celestia_data_root {
            bail!(
                "pointer data root {:?} does not match rollup block {block_hash:?} data root {:?}",
                pointer.data_root,
                header.celestia_data_root
            );
        }
        Ok((header, pointer))
    }

    async fn wait_for(&self, tx: SubmittedTx, what: &str) -> anyhow::Result<()> {
        if !tx.sent {
            return Ok(());
        }
        let receipt = self.l1.wait(tx.hash).await?;
        if !receipt.success {
            bail!("{what} transaction {:?} failed", tx.hash);
        }
        Ok(())
    }

    /// Answers the open challenge on share `share_index` of rollup block `block_hash` with a
    /// proof that the share is available.
    pub async fn defend_data_root_inclusion(
        &self,
        block_hash: H256,
        pointer_index: u8,
        share_index: u32,
    ) -> anyhow::Result<SubmittedTx> {
        let key = self
            .l1
            .challenge_key(block_hash, pointer_index, share_index)
            .await?;
        let challenge = self.l1.get_data_root_inclusion_challenge(key).await?;
        if challenge.status != ChallengeStatus::ChallengerInitiated {
            bail!(
                "challenge on rollup block {block_hash:?} share {share_index} is {:?}, nothing to defend",
                challenge.status
            );
        }

        let (_, pointer) = self.resolve(block_hash).await?;
        if u64::from(share_index) >= pointer.share_len {
            bail!(
                "share {share_index} is outside the {} shares of rollup block {block_hash:?}",
                pointer.share_len
            );
        }
        let share_pointer = SharePointer::whole_share(share_index as usize, SHARE_SIZE);
        let proof = self
            .proofs
            .assemble(&pointer, &share_pointer)
            .await
            .with_context(|| format!("failed to prove share {share_index} of {block_hash:?}"))?;

        let tx = self.l1.defend_data_root_inclusion(key, &proof).await?;
        info!(?block_hash, share_index, tx = ?tx.hash, "Defended data availability challenge");
        Ok(tx)
    }

    /// Settles an expired challenge in the challenger's favour.
    pub async fn settle_data_root_inclusion(
        &self,
        block_hash: H256,
        pointer_index: u8,
        share_index: u32,
    ) -> anyhow::Result<SubmittedTx> {
        let key = self
            .l1
            .challenge_key(block_hash, pointer_index, share_index)
            .await?;
        let tx = self.l1.settle_data_root_inclusion(key).await?;
        info!(?block_hash, share_index, tx = ?tx.hash, "Settled data availability challenge");
        Ok(tx)
    }

    /// Provides the shares spanned by `share_pointer` to the chain oracle and returns their key.
    async fn provide_shares(
        &self,
        rblock: H256,
        pointer: &CelestiaPointer,
        share_pointer: &SharePointer,
    ) -> anyhow::Result<H256> {
        let proof = self.proofs.assemble(pointer, share_pointer).await?;
        let tx = self.l1.provide_shares(rblock, 0, &proof).await?;
        self.wait_for(tx, "provideShares").await?;
        self.l1.shares_key(rblock, &proof.data).await
    }

    /// Proves the L2 header whose extra-data-cleared hash is `l2_header_hash` to the chain
    /// oracle, using the bundle of rollup block `rblock`.
    pub async fn provide_header(
        &self,
        rblock: H256,
        l2_header_hash: H256,
    ) -> anyhow::Result<(H256, SubmittedTx)> {
        let (_, pointer) = self.resolve(rblock).await?;
        let raw = self.da.get_shares(&pointer).await?;
        let share_pointer = find_header(&parse_shares(&raw)?, l2_header_hash)?;

        let shares_key = self.provide_shares(rblock, &pointer, &share_pointer).await?;
        let tx = self
            .l1
            .provide_header(shares_key, &share_pointer.ranges)
            .await?;
        self.wait_for(tx, "provideHeader").await?;
        info!(?rblock, header = ?l2_header_hash, ?shares_key, "Provided L2 header");
        Ok((shares_key, tx))
    }

    /// Proves the L2 transaction `tx_hash` to the chain oracle, using the bundle of rollup
    /// block `rblock`. Only legacy transactions can be provided.
    pub async fn provide_transaction(
        &self,
        rblock: H256,
        tx_hash: H256,
    ) -> anyhow::Result<(H256, SubmittedTx)> {
        let (_, pointer) = self.resolve(rblock).await?;
        let raw = self.da.get_shares(&pointer).await?;
        let share_pointer = find_transaction(&parse_shares(&raw)?, tx_hash)?;
        if !is_legacy_envelope(&share_pointer.bytes(&raw)?) {
            bail!("transaction {tx_hash:?} is not a legacy transaction");
        }

        let shares_key = self.provide_shares(rblock, &pointer, &share_pointer).await?;
        let tx = self
            .l1
            .provide_legacy_tx(shares_key, &share_pointer.ranges)
            .await?;
        self.wait_for(tx, "provideLegacyTx").await?;
        info!(?rblock, tx = ?tx_hash, ?shares_key, "Provided L2 transaction");
        Ok((shares_key, tx))
    }

    /// Records the challenge updates emitted in L1 blocks `[from, to]`. Open challenges are
    /// stored, decided ones forgotten. Returns the number of events seen.
    pub async fn scan_challenges(&self, from: u64, to: u64) -> anyhow::Result<usize> {
        let db = self.db()?;
        let events = self.l1.get_challenge_events(from, to).await?;
        for event in &events {
            match event.status {
                ChallengeStatus::ChallengerInitiated => {
                    info!(block_hash = ?event.block_hash, share_index = event.share_index, expiry = event.expiry, "New data availability challenge");
                    db.put_challenge(event)?;
                }
                status if status.is_terminal() => {
                    info!(block_hash = ?event.block_hash, ?status, "Challenge decided");
                    db.delete_challenge(event.block_hash)?;
                }
                status => warn!(block_hash = ?event.block_hash, ?status, "Ignoring challenge update"),
            }
        }
        Ok(events.len())
    }

    /// Challenges recorded by the watcher that still await a defense.
    pub fn active_challenges(&self) -> anyhow::Result<Vec<ChallengeEvent>> {
        self.db()?.active_challenges()
    }

    /// One watcher iteration: scans new L1 blocks, then defends every open challenge that has
    /// not expired. Returns the next L1 height to scan.
    async fn watch(&self, next_height: u64) -> anyhow::Result<u64> {
        let db = self.db()?;
        let latest = self.l1.get_height().await?;
        let mut next = next_height;
        if latest >= next {
            for (from, to) in ascending_windows(next, latest, COMMITMENT_SCAN_WINDOW) {
                let seen = self.scan_challenges(from, to).await?;
                debug!(from, to, seen, "Scanned challenge updates");
                db.put_watcher_height(to)?;
            }
            next = latest + 1;
        }

        let now = self.l1.get_timestamp().await?;
        for challenge in self.active_challenges()? {
            if is_expired(&challenge, now) {
                debug!(block_hash = ?challenge.block_hash, share_index = challenge.share_index, expiry = challenge.expiry, "Challenge expired, awaiting settlement");
                continue;
            }
            let defended = self
                .defend_data_root_inclusion(
                    challenge.block_hash,
                    challenge.pointer_index,
                    challenge.share_index,
                )
                .await;
            let confirmed = match defended {
                Ok(tx) => self.wait_for(tx, "defendDataRootInclusion").await,
                Err(e) => Err(e),
            };
            if let Err(e) = confirmed {
                warn!(block_hash = ?challenge.block_hash, error = ?e, "Failed to defend challenge, will retry");
            }
        }
        Ok(next)
    }

    /// Watches the challenge contract until `shutdown` resolves, defending every challenge
    /// it sees. Progress is kept in the node database.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        tokio::pin!(shutdown);
        let db = self.db()?;
        let mut next = match db.get_watcher_height()? {
            Some(height) => height + 1,
            None => match self.start_l1_height {
                Some(height) => height,
                None => self.l1.get_height().await?,
            },
        };
        info!(from = next, "Starting challenge watcher");

        loop {
            let watched = tokio::select! {
                _ = &mut shutdown => break,
                watched = self.watch(next) => watched,
            };
            match watched {
                Ok(height) => next = height,
                Err(e) => warn!(error = ?e, from = next, "Challenge watcher iteration failed"),
            }
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.poll_delay) => {}
            }
        }
        info!("Challenge watcher stopped");
        Ok(())
    }
}
