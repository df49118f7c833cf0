//! Assembles the proofs the L1 contracts accept: the shares of a rollup block, proven
//! against their Celestia data root, which is itself proven against a Blobstream commitment.
use std::time::Duration;

use lumen_celestia_adapter::verifier::{verify_shares_proof, ValidationError};
use lumen_rollup_interface::da::{
    AttestationProof, CelestiaPointer, DataCommitment, DataRootTuple, SharePointer, SharesProof,
};
use lumen_rollup_interface::services::da::DaService;
use lumen_rollup_interface::services::l1::L1Client;
use thiserror::Error;

/// Number of L1 blocks covered by one commitment log query.
pub const COMMITMENT_SCAN_WINDOW: u64 = 5_000;
/// Expected L1 block interval, used to turn the challenge window into a block count.
pub const L1_AVERAGE_BLOCK_TIME: Duration = Duration::from_secs(12);

#[derive(Debug, Error)]
pub enum ProofError {
    /// No Blobstream commitment stored in the scanned L1 blocks covers the height.
    #[error("no data commitment covers celestia height {height} in L1 blocks {from}..={to}")]
    NoCommitmentFound { height: u64, from: u64, to: u64 },
    /// The assembled proof does not verify against the commitment.
    #[error("assembled proof is invalid: {0}")]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

/// Number of L1 blocks expected within `challenge_window`.
pub fn scan_width(challenge_window: Duration) -> u64 {
    challenge_window.as_secs() / L1_AVERAGE_BLOCK_TIME.as_secs()
}

/// Splits the L1 blocks `[latest - width, latest]` into inclusive windows of at most
/// `window` blocks, newest first.
#[derive(Debug, Clone)]
pub struct ScanWindows {
    floor: u64,
    next_high: Option<u64>,
    window: u64,
}

impl ScanWindows {
    pub fn new(latest: u64, width: u64, window: u64) -> Self {
        Self {
            floor: latest.saturating_sub(width),
            next_high: Some(latest),
            window: window.max(1),
        }
    }
}

impl Iterator for ScanWindows {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let high = self.next_high?;
        let low = high.saturating_sub(self.window - 1).max(self.floor);
        self.next_high = if low > self.floor { Some(low - 1) } else { None };
        Some((low, high))
    }
}

/// Builds [`SharesProof`]s for bundles published on the DA layer.
#[derive(Debug, Clone)]
pub struct ProofAssembler<Da, L1> {
    da: Da,
    l1: L1,
}

impl<Da: DaService, L1: L1Client> ProofAssembler<Da, L1> {
    pub fn new(da: Da, l1: L1) -> Self {
        Self { da, l1 }
    }

    /// Finds the most recent Blobstream commitment covering Celestia `height`, looking back
    /// one challenge window of L1 blocks.
    pub async fn find_data_commitment(&self, height: u64) -> Result<DataCommitment, ProofError> {
        let latest = self.l1.get_height().await?;
        let width = scan_width(self.l1.get_challenge_window().await?);
        for (from, to) in ScanWindows::new(latest, width, COMMITMENT_SCAN_WINDOW) {
            let commitments = self.l1.get_data_commitments(from, to).await?;
            if let Some(commitment) = commitments.into_iter().rev().find(|c| c.contains(height)) {
                return Ok(commitment);
            }
        }
        Err(ProofError::NoCommitmentFound {
            height,
            from: latest.saturating_sub(width),
            to: latest,
        })
    }

    /// Proves the shares `share_pointer` spans inside the blob at `pointer`. The proof is
    /// checked locally before it is returned.
    pub async fn assemble(
        &self,
        pointer: &CelestiaPointer,
        share_pointer: &SharePointer,
    ) -> Result<SharesProof, ProofError> {
        let share_proof = self.da.get_shares_proof(pointer, share_pointer).await?;
        let commitment = self.find_data_commitment(pointer.height).await?;
        let inclusion = self
            .da
            .get_data_root_inclusion_proof(
                pointer.height,
                commitment.start_block,
                commitment.end_block,
            )
            .await?;

        let proof = share_proof.with_attestation(AttestationProof {
            tuple_root_nonce: commitment.nonce,
            tuple: DataRootTuple {
                height: pointer.height,
                data_root: pointer.data_root,
            },
            proof: inclusion,
        });
        verify_shares_proof(&proof, commitment.data_commitment)?;
        Ok(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_cover_the_range_newest_first() {
        let windows: Vec<_> = ScanWindows::new(12_000, 7_200, 5_000).collect();
        assert_eq!(windows, vec![(7_001, 12_000), (4_800, 7_000)]);
    }

    #[test]
    fn windows_stop_at_genesis() {
        let windows: Vec<_> = ScanWindows::new(1_010, 7_200, 5_000).collect();
        assert_eq!(windows, vec![(0, 1_010)]);

        let windows: Vec<_> = ScanWindows::new(0, 7_200, 5_000).collect();
        assert_eq!(windows, vec![(0, 0)]);
    }

    #[test]
    fn exact_multiple_of_window() {
        let windows: Vec<_> = ScanWindows::new(10_000, 10_000, 5_000).collect();
        assert_eq!(windows, vec![(5_001, 10_000), (1, 5_000), (0, 0)]);
    }

    #[test]
    fn day_long_window_is_7200_blocks() {
        assert_eq!(scan_width(Duration::from_secs(24 * 60 * 60)), 7_200);
        assert_eq!(scan_width(Duration::from_secs(11)), 0);
    }
}
