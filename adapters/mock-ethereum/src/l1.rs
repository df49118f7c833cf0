use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use ethers_core::abi::{self, Token};
use ethers_core::types::{Address, Bytes, H256, U256};
use ethers_core::utils::{keccak256, rlp};
use lumen_celestia_adapter::verifier::verify_shares_proof;
use lumen_rollup_interface::da::{
    CelestiaPointer, DataCommitment, Namespace, ShareRange, SharePointer, SharesProof,
};
use lumen_rollup_interface::rollup::block::is_legacy_envelope;
use lumen_rollup_interface::rollup::{
    challenge_key, ChallengeEvent, ChallengeStatus, DaChallenge, L2Header, RollupHeader,
};
use lumen_rollup_interface::services::l1::{L1Client, SubmittedTx, TxReceipt};
use tokio::sync::Mutex;

/// Parameters of the mocked contracts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockL1Config {
    /// Account allowed to push headers.
    pub publisher: Address,
    /// Account opening challenges.
    pub challenger: Address,
    /// Fee paid with every challenge.
    pub challenge_fee: U256,
    /// Time a defender has to answer a challenge.
    pub challenge_window: Duration,
    /// L1 height before the first transaction.
    pub start_height: u64,
    /// Unix time of the mocked clock at startup.
    pub start_time: u64,
    /// Namespace the rollup publishes its blobs under.
    pub namespace: Namespace,
    /// Width of the data square rows the proofs are built over.
    pub row_width: u64,
}

impl Default for MockL1Config {
    fn default() -> Self {
        Self {
            publisher: Address::repeat_byte(0x0b),
            challenger: Address::repeat_byte(0x0c),
            challenge_fee: U256::exp10(15),
            challenge_window: Duration::from_secs(24 * 60 * 60),
            start_height: 1_000,
            start_time: 1_700_000_000,
            namespace: Namespace::new_v0(b"lumen"),
            row_width: 4,
        }
    }
}

#[derive(Debug, Default)]
struct MockL1State {
    height: u64,
    now: u64,
    headers: Vec<RollupHeader>,
    hashes: Vec<H256>,
    index_by_hash: HashMap<H256, usize>,
    receipts: HashMap<H256, TxReceipt>,
    tx_count: u64,
    challenges: HashMap<H256, DaChallenge>,
    challenge_events: Vec<(u64, ChallengeEvent)>,
    commitments: Vec<(u64, DataCommitment)>,
    provided_shares: HashMap<H256, Vec<Bytes>>,
    provided_headers: HashMap<H256, L2Header>,
    provided_txs: HashSet<H256>,
    blobs: HashMap<H256, CelestiaPointer>,
}

impl MockL1State {
    /// Mines a block holding one successful transaction.
    fn mine(&mut self, what: &str) -> SubmittedTx {
        self.height += 1;
        self.tx_count += 1;
        let hash = H256(keccak256(
            [what.as_bytes(), &self.tx_count.to_be_bytes()[..]].concat(),
        ));
        self.receipts.insert(
            hash,
            TxReceipt {
                tx_hash: hash,
                block_number: self.height,
                success: true,
            },
        );
        tracing::debug!(?hash, what, height = self.height, "Mined mock L1 transaction");
        SubmittedTx { hash, sent: true }
    }

    fn head_hash(&self) -> H256 {
        self.hashes.last().copied().unwrap_or_default()
    }

    fn open_challenge(&self, what: &str, key: H256) -> anyhow::Result<DaChallenge> {
        match self.challenges.get(&key) {
            Some(challenge) if challenge.status == ChallengeStatus::ChallengerInitiated => {
                Ok(challenge.clone())
            }
            _ => Err(revert(what, "challenge is not open")),
        }
    }

    /// The checks shared by `defendDataRootInclusion` and `provideShares`: the proof must be
    /// for the rollup's namespace and attested for the rollup block's Celestia block, against a
    /// stored commitment.
    fn check_proof(
        &self,
        what: &str,
        namespace: Namespace,
        header: &RollupHeader,
        proof: &SharesProof,
    ) -> anyhow::Result<()> {
        if proof.namespace != namespace {
            return Err(revert(what, "proof is not for the rollup namespace"));
        }
        let attestation = &proof.attestation_proof;
        if attestation.tuple.height != header.celestia_height
            || attestation.tuple.data_root != header.celestia_data_root
        {
            return Err(revert(what, "proof is not for the rollup block's celestia block"));
        }
        let commitment = self
            .commitments
            .iter()
            .map(|(_, commitment)| commitment)
            .find(|commitment| commitment.nonce == attestation.tuple_root_nonce)
            .ok_or_else(|| revert(what, "unknown data commitment nonce"))?;
        verify_shares_proof(proof, commitment.data_commitment)
            .map_err(|e| revert(what, &format!("invalid shares proof: {e}")))
    }

    /// A defense must prove exactly the challenged share: share `share_index` of the blob,
    /// found in its row by the row proof key and in the row by the namespace proof's first key.
    fn check_challenged_share(
        &self,
        what: &str,
        row_width: u64,
        block_hash: H256,
        share_index: u32,
        proof: &SharesProof,
    ) -> anyhow::Result<()> {
        let blob = self
            .blobs
            .get(&block_hash)
            .ok_or_else(|| revert(what, "blob location is unknown"))?;
        if u64::from(share_index) >= blob.share_len {
            return Err(revert(what, "share index out of bounds"));
        }
        let share = blob.absolute_share(share_index as usize);
        let (Some(share_proof), Some(row_proof)) =
            (proof.share_proofs.first(), proof.row_proofs.first())
        else {
            return Err(revert(what, "proof is empty"));
        };
        if proof.data.len() != 1
            || row_proof.key != share / row_width
            || share_proof.begin_key != share % row_width
        {
            return Err(revert(what, "proof is not for the challenged share"));
        }
        Ok(())
    }

    fn record(&mut self, challenge_key: H256, event: ChallengeEvent) {
        if let Some(challenge) = self.challenges.get_mut(&challenge_key) {
            challenge.status = event.status;
        }
        self.challenge_events.push((self.height, event));
    }

    fn spanned_bytes(&self, what: &str, shares_key: H256, ranges: &[ShareRange]) -> anyhow::Result<Vec<u8>> {
        let shares = self
            .provided_shares
            .get(&shares_key)
            .ok_or_else(|| revert(what, "shares not provided"))?;
        let pointer = SharePointer {
            start_share: 0,
            ranges: ranges.to_vec(),
        };
        pointer
            .bytes_of_spanned(shares)
            .map_err(|e| revert(what, &e.to_string()))
    }
}

fn revert(what: &str, reason: &str) -> anyhow::Error {
    anyhow!("{what} reverted: {reason}")
}

/// Local replica of the chain oracle's `sharesKey`:
/// `keccak256(abi.encode(bytes32 rblock, bytes[] shares))`.
pub fn shares_key(rblock: H256, shares: &[Bytes]) -> H256 {
    let encoded = abi::encode(&[
        Token::FixedBytes(rblock.as_bytes().to_vec()),
        Token::Array(shares.iter().map(|s| Token::Bytes(s.to_vec())).collect()),
    ]);
    H256(keccak256(encoded))
}

/// The canonical state chain, challenge contract, Blobstream and chain oracle, in memory.
#[derive(Debug, Clone)]
pub struct MockL1Client {
    config: MockL1Config,
    state: Arc<Mutex<MockL1State>>,
}

impl MockL1Client {
    /// Creates the contracts with `genesis` at index 0 of the canonical chain.
    pub fn new(config: MockL1Config, genesis: RollupHeader) -> Self {
        let genesis_hash = genesis.hash();
        let state = MockL1State {
            height: config.start_height,
            now: config.start_time,
            headers: vec![genesis],
            hashes: vec![genesis_hash],
            index_by_hash: HashMap::from([(genesis_hash, 0)]),
            ..Default::default()
        };
        Self {
            config,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Current unix time of the mocked clock.
    pub async fn now(&self) -> u64 {
        self.state.lock().await.now
    }

    /// Moves the mocked clock forward.
    pub async fn advance_time(&self, by: Duration) {
        self.state.lock().await.now += by.as_secs();
    }

    /// Mines `count` empty blocks.
    pub async fn mine_blocks(&self, count: u64) {
        self.state.lock().await.height += count;
    }

    /// Stores a Blobstream data commitment, as the bridge's relayer would.
    /// Records where the blob of rollup block `block_hash` lives in its data square, as the
    /// contract's copy of the block's DA pointer.
    pub async fn register_blob(&self, block_hash: H256, pointer: &CelestiaPointer) {
        self.state.lock().await.blobs.insert(block_hash, *pointer);
    }

    pub async fn add_data_commitment(&self, commitment: DataCommitment) {
        let mut state = self.state.lock().await;
        state.height += 1;
        let height = state.height;
        state.commitments.push((height, commitment));
    }

    /// An L2 header decoded by `provideHeader`, by its hash.
    pub async fn provided_header(&self, hash: H256) -> Option<L2Header> {
        self.state.lock().await.provided_headers.get(&hash).cloned()
    }

    /// Whether `provideLegacyTx` accepted a transaction with this hash.
    pub async fn provided_tx(&self, hash: H256) -> bool {
        self.state.lock().await.provided_txs.contains(&hash)
    }
}

#[async_trait]
impl L1Client for MockL1Client {
    async fn get_timestamp(&self) -> anyhow::Result<u64> {
        Ok(self.now().await)
    }

    async fn get_height(&self) -> anyhow::Result<u64> {
        Ok(self.state.lock().await.height)
    }

    async fn get_rollup_head_index(&self) -> anyhow::Result<u64> {
        Ok(self.state.lock().await.headers.len() as u64 - 1)
    }

    async fn get_header_by_index(&self, index: u64) -> anyhow::Result<RollupHeader> {
        self.state
            .lock()
            .await
            .headers
            .get(index as usize)
            .cloned()
            .ok_or_else(|| anyhow!("no rollup header at index {index}"))
    }

    async fn get_block_hash_by_index(&self, index: u64) -> anyhow::Result<H256> {
        self.state
            .lock()
            .await
            .hashes
            .get(index as usize)
            .copied()
            .ok_or_else(|| anyhow!("no rollup header at index {index}"))
    }

    async fn get_header_by_hash(&self, hash: H256) -> anyhow::Result<RollupHeader> {
        let state = self.state.lock().await;
        state
            .index_by_hash
            .get(&hash)
            .map(|index| state.headers[*index].clone())
            .ok_or_else(|| anyhow!("no rollup header with hash {hash:?}"))
    }

    async fn push_rollup_head(&self, header: &RollupHeader) -> anyhow::Result<SubmittedTx> {
        let mut state = self.state.lock().await;
        if header.prev_hash != state.head_hash() {
            return Err(revert("pushBlock", "prevHash does not match the chain head"));
        }
        let hash = header.hash();
        let index = state.headers.len();
        state.headers.push(header.clone());
        state.hashes.push(hash);
        state.index_by_hash.insert(hash, index);
        Ok(state.mine("pushBlock"))
    }

    async fn wait(&self, tx_hash: H256) -> anyhow::Result<TxReceipt> {
        self.state
            .lock()
            .await
            .receipts
            .get(&tx_hash)
            .copied()
            .ok_or_else(|| anyhow!("unknown transaction {tx_hash:?}"))
    }

    async fn get_publisher(&self) -> anyhow::Result<Address> {
        Ok(self.config.publisher)
    }

    async fn challenge_key(
        &self,
        block_hash: H256,
        pointer_index: u8,
        share_index: u32,
    ) -> anyhow::Result<H256> {
        Ok(challenge_key(block_hash, pointer_index, share_index))
    }

    async fn get_challenge_fee(&self) -> anyhow::Result<U256> {
        Ok(self.config.challenge_fee)
    }

    async fn get_challenge_window(&self) -> anyhow::Result<Duration> {
        Ok(self.config.challenge_window)
    }

    async fn challenge_data_root_inclusion(
        &self,
        block_index: u64,
        pointer_index: u8,
        share_index: u32,
    ) -> anyhow::Result<SubmittedTx> {
        const WHAT: &str = "challengeDataRootInclusion";
        let mut state = self.state.lock().await;
        let block_hash = *state
            .hashes
            .get(block_index as usize)
            .ok_or_else(|| revert(WHAT, "block index out of bounds"))?;
        if pointer_index != 0 {
            return Err(revert(WHAT, "pointer index out of bounds"));
        }
        if let Some(blob) = state.blobs.get(&block_hash) {
            if u64::from(share_index) >= blob.share_len {
                return Err(revert(WHAT, "share index out of bounds"));
            }
        }
        let key = challenge_key(block_hash, pointer_index, share_index);
        if state.challenges.contains_key(&key) {
            return Err(revert(WHAT, "challenge already exists"));
        }

        let expiry = state.now + self.config.challenge_window.as_secs();
        state.challenges.insert(
            key,
            DaChallenge {
                block_index,
                challenger: self.config.challenger,
                expiry,
                status: ChallengeStatus::ChallengerInitiated,
            },
        );
        let tx = state.mine(WHAT);
        state.record(
            key,
            ChallengeEvent {
                block_hash,
                pointer_index,
                share_index,
                expiry,
                status: ChallengeStatus::ChallengerInitiated,
            },
        );
        Ok(tx)
    }

    async fn defend_data_root_inclusion(
        &self,
        key: H256,
        proof: &SharesProof,
    ) -> anyhow::Result<SubmittedTx> {
        const WHAT: &str = "defendDataRootInclusion";
        let mut state = self.state.lock().await;
        let challenge = state.open_challenge(WHAT, key)?;
        if state.now > challenge.expiry {
            return Err(revert(WHAT, "challenge has expired"));
        }
        let event = state
            .challenge_events
            .iter()
            .rev()
            .map(|(_, event)| event)
            .find(|event| challenge_key(event.block_hash, event.pointer_index, event.share_index) == key)
            .cloned()
            .ok_or_else(|| revert(WHAT, "challenge is not open"))?;
        let header = state.headers[challenge.block_index as usize].clone();
        state.check_proof(WHAT, self.config.namespace, &header, proof)?;
        state.check_challenged_share(
            WHAT,
            self.config.row_width,
            event.block_hash,
            event.share_index,
            proof,
        )?;

        let tx = state.mine(WHAT);
        state.record(
            key,
            ChallengeEvent {
                status: ChallengeStatus::DefenderWon,
                ..event
            },
        );
        Ok(tx)
    }

    async fn settle_data_root_inclusion(&self, key: H256) -> anyhow::Result<SubmittedTx> {
        const WHAT: &str = "settleDataRootInclusion";
        let mut state = self.state.lock().await;
        let challenge = state.open_challenge(WHAT, key)?;
        if state.now <= challenge.expiry {
            return Err(revert(WHAT, "challenge has not expired"));
        }

        let event = state
            .challenge_events
            .iter()
            .rev()
            .map(|(_, event)| event)
            .find(|event| challenge_key(event.block_hash, event.pointer_index, event.share_index) == key)
            .cloned()
            .ok_or_else(|| revert(WHAT, "challenge is not open"))?;
        let tx = state.mine(WHAT);
        state.record(
            key,
            ChallengeEvent {
                status: ChallengeStatus::ChallengerWon,
                ..event
            },
        );
        Ok(tx)
    }

    async fn get_data_root_inclusion_challenge(&self, key: H256) -> anyhow::Result<DaChallenge> {
        Ok(self
            .state
            .lock()
            .await
            .challenges
            .get(&key)
            .cloned()
            .unwrap_or(DaChallenge {
                block_index: 0,
                challenger: Address::zero(),
                expiry: 0,
                status: ChallengeStatus::None,
            }))
    }

    async fn get_challenge_events(&self, from: u64, to: u64) -> anyhow::Result<Vec<ChallengeEvent>> {
        Ok(self
            .state
            .lock()
            .await
            .challenge_events
            .iter()
            .filter(|(height, _)| (from..=to).contains(height))
            .map(|(_, event)| event.clone())
            .collect())
    }

    async fn get_data_commitments(&self, from: u64, to: u64) -> anyhow::Result<Vec<DataCommitment>> {
        Ok(self
            .state
            .lock()
            .await
            .commitments
            .iter()
            .filter(|(height, _)| (from..=to).contains(height))
            .map(|(_, commitment)| *commitment)
            .collect())
    }

    async fn provide_shares(
        &self,
        rblock: H256,
        pointer_index: u8,
        proof: &SharesProof,
    ) -> anyhow::Result<SubmittedTx> {
        const WHAT: &str = "provideShares";
        let mut state = self.state.lock().await;
        let index = *state
            .index_by_hash
            .get(&rblock)
            .ok_or_else(|| revert(WHAT, "unknown rollup block"))?;
        if pointer_index != 0 {
            return Err(revert(WHAT, "pointer index out of bounds"));
        }
        let header = state.headers[index].clone();
        state.check_proof(WHAT, self.config.namespace, &header, proof)?;

        state
            .provided_shares
            .insert(shares_key(rblock, &proof.data), proof.data.clone());
        Ok(state.mine(WHAT))
    }

    async fn shares_key(&self, rblock: H256, shares: &[Bytes]) -> anyhow::Result<H256> {
        Ok(shares_key(rblock, shares))
    }

    async fn provide_header(
        &self,
        shares_key: H256,
        ranges: &[ShareRange],
    ) -> anyhow::Result<SubmittedTx> {
        const WHAT: &str = "provideHeader";
        let mut state = self.state.lock().await;
        let bytes = state.spanned_bytes(WHAT, shares_key, ranges)?;
        let header: L2Header =
            rlp::decode(&bytes).map_err(|e| revert(WHAT, &format!("invalid header rlp: {e}")))?;
        state.provided_headers.insert(header.hash(), header);
        Ok(state.mine(WHAT))
    }

    async fn provide_legacy_tx(
        &self,
        shares_key: H256,
        ranges: &[ShareRange],
    ) -> anyhow::Result<SubmittedTx> {
        const WHAT: &str = "provideLegacyTx";
        let mut state = self.state.lock().await;
        let bytes = state.spanned_bytes(WHAT, shares_key, ranges)?;
        if !is_legacy_envelope(&bytes) || rlp::Rlp::new(&bytes).item_count().ok() != Some(9) {
            return Err(revert(WHAT, "not a legacy transaction"));
        }
        state.provided_txs.insert(H256(keccak256(&bytes)));
        Ok(state.mine(WHAT))
    }
}
