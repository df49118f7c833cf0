use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use ethers::abi::{Detokenize, RawLog};
use ethers::contract::{ContractCall, ContractError, EthEvent};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, BlockNumber, Bytes, Filter, H256, U256};
use lumen_rollup_interface::da::{DataCommitment, ShareRange, SharesProof};
use lumen_rollup_interface::rollup::{ChallengeEvent, ChallengeStatus, DaChallenge, RollupHeader};
use lumen_rollup_interface::services::l1::{L1Client, SubmittedTx, TxReceipt};
use tracing::{debug, info, instrument};

use crate::bindings::chain_oracle::{self, ChainOracle};
use crate::bindings::challenge::{self, Challenge};
use crate::bindings::state_chain::{CanonicalStateChain, Header};
use crate::bindings::{convert, ChallengeUpdateFilter, DataCommitmentStoredFilter};
use crate::config::EthereumConfig;

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Client of the Lumen contracts on L1, signing with a single local key.
///
/// In dry-run mode transactions are built, gas-estimated and signed but never broadcast,
/// so reverts still surface as errors.
#[derive(Debug, Clone)]
pub struct EthereumClient {
    client: Arc<SignerClient>,
    state_chain: CanonicalStateChain<SignerClient>,
    challenge: Challenge<SignerClient>,
    oracle: ChainOracle<SignerClient>,
    blobstream: Address,
    dry_run: bool,
    poll_interval: Duration,
    tx_timeout: Duration,
}

impl EthereumClient {
    /// Connects to the configured L1 endpoint and binds the signer to its chain id.
    pub async fn new(config: &EthereumConfig, dry_run: bool) -> anyhow::Result<Self> {
        let provider = Provider::<Http>::try_from(config.l1_rpc_url.as_str())
            .context("invalid l1 rpc url")?;
        let wallet: LocalWallet = config
            .signer_key()?
            .parse()
            .context("invalid signer key")?;
        let chain_id = provider
            .get_chainid()
            .await
            .context("failed to fetch the l1 chain id")?;
        Ok(Self::with_wallet(
            provider,
            wallet.with_chain_id(chain_id.as_u64()),
            config,
            dry_run,
        ))
    }

    pub fn with_wallet(
        provider: Provider<Http>,
        wallet: LocalWallet,
        config: &EthereumConfig,
        dry_run: bool,
    ) -> Self {
        let poll_interval = Duration::from_millis(config.tx_poll_interval_ms);
        let client = Arc::new(SignerMiddleware::new(
            provider.interval(poll_interval),
            wallet,
        ));
        Self {
            state_chain: CanonicalStateChain::new(config.canonical_state_chain, client.clone()),
            challenge: Challenge::new(config.challenge, client.clone()),
            oracle: ChainOracle::new(config.chain_oracle, client.clone()),
            client,
            blobstream: config.blobstream,
            dry_run,
            poll_interval,
            tx_timeout: Duration::from_secs(config.tx_timeout_secs),
        }
    }

    /// The account signing transactions.
    pub fn signer_address(&self) -> Address {
        self.client.address()
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    async fn send<D: Detokenize>(
        &self,
        call: ContractCall<SignerClient, D>,
        what: &'static str,
    ) -> anyhow::Result<SubmittedTx> {
        if self.dry_run {
            let mut tx = call.tx;
            self.client
                .fill_transaction(&mut tx, None)
                .await
                .map_err(|e| anyhow!("failed to prepare {what}: {e}"))?;
            let signature = self.client.signer().sign_transaction(&tx).await?;
            let hash = tx.hash(&signature);
            info!(?hash, what, "Dry run, not broadcasting transaction");
            return Ok(SubmittedTx { hash, sent: false });
        }

        let pending = call.send().await.map_err(|e| revert_error(what, e))?;
        let hash = pending.tx_hash();
        debug!(?hash, what, "Sent transaction");
        Ok(SubmittedTx { hash, sent: true })
    }

    async fn events<E: EthEvent>(
        &self,
        address: Address,
        from: u64,
        to: u64,
    ) -> anyhow::Result<Vec<E>> {
        let filter = Filter::new()
            .address(address)
            .topic0(E::signature())
            .from_block(from)
            .to_block(to);
        let logs = self
            .client
            .get_logs(&filter)
            .await
            .with_context(|| format!("failed to get {} events", E::name()))?;
        logs.into_iter()
            .map(|log| {
                let raw_log = RawLog {
                    topics: log.topics,
                    data: log.data.to_vec(),
                };
                Ok::<_, anyhow::Error>(E::decode_log(&raw_log)?)
            })
            .collect()
    }
}

fn revert_error<M: Middleware>(what: &str, error: ContractError<M>) -> anyhow::Error {
    match error.decode_revert::<String>() {
        Some(reason) => anyhow!("{what} reverted: {reason}"),
        None => anyhow!("failed to send {what}: {error}"),
    }
}

fn to_u64(value: U256) -> anyhow::Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("value {value} does not fit in 64 bits"))
}

#[async_trait]
impl L1Client for EthereumClient {
    async fn get_height(&self) -> anyhow::Result<u64> {
        Ok(self.client.get_block_number().await?.as_u64())
    }

    async fn get_timestamp(&self) -> anyhow::Result<u64> {
        let block = self
            .client
            .get_block(BlockNumber::Latest)
            .await?
            .ok_or_else(|| anyhow!("latest L1 block not found"))?;
        to_u64(block.timestamp)
    }

    async fn get_rollup_head_index(&self) -> anyhow::Result<u64> {
        to_u64(self.state_chain.chain_head().call().await?)
    }

    async fn get_header_by_index(&self, index: u64) -> anyhow::Result<RollupHeader> {
        let header = self
            .state_chain
            .get_header_by_num(U256::from(index))
            .call()
            .await?;
        Ok(convert(header)?)
    }

    async fn get_block_hash_by_index(&self, index: u64) -> anyhow::Result<H256> {
        let hash = self.state_chain.chain(U256::from(index)).call().await?;
        Ok(H256(hash))
    }

    async fn get_header_by_hash(&self, hash: H256) -> anyhow::Result<RollupHeader> {
        let header: RollupHeader =
            convert(self.state_chain.get_header_by_hash(hash.0).call().await?)?;
        if header == RollupHeader::default() {
            bail!("no rollup header with hash {hash:?}");
        }
        Ok(header)
    }

    #[instrument(skip_all, fields(l2_height = header.l2_height, epoch = header.epoch))]
    async fn push_rollup_head(&self, header: &RollupHeader) -> anyhow::Result<SubmittedTx> {
        let header: Header = convert(header.clone())?;
        self.send(self.state_chain.push_block(header), "pushBlock")
            .await
    }

    async fn wait(&self, tx_hash: H256) -> anyhow::Result<TxReceipt> {
        let poll = async {
            loop {
                if let Some(receipt) = self.client.get_transaction_receipt(tx_hash).await? {
                    return anyhow::Ok(receipt);
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };
        let receipt = tokio::time::timeout(self.tx_timeout, poll)
            .await
            .map_err(|_| {
                anyhow!(
                    "transaction {tx_hash:?} was not mined within {:?}",
                    self.tx_timeout
                )
            })??;

        Ok(TxReceipt {
            tx_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()).unwrap_or_default(),
            success: receipt.status.map_or(false, |status| status.as_u64() == 1),
        })
    }

    async fn get_publisher(&self) -> anyhow::Result<Address> {
        Ok(self.state_chain.publisher().call().await?)
    }

    async fn hash_header(&self, header: &RollupHeader) -> anyhow::Result<H256> {
        let header: Header = convert(header.clone())?;
        let hash = self.state_chain.calculate_header_hash(header).call().await?;
        Ok(H256(hash))
    }

    async fn challenge_key(
        &self,
        block_hash: H256,
        pointer_index: u8,
        share_index: u32,
    ) -> anyhow::Result<H256> {
        let key = self
            .challenge
            .data_root_inclusion_challenge_key(block_hash.0, pointer_index, share_index)
            .call()
            .await?;
        Ok(H256(key))
    }

    async fn get_challenge_fee(&self) -> anyhow::Result<U256> {
        Ok(self.challenge.challenge_fee().call().await?)
    }

    async fn get_challenge_window(&self) -> anyhow::Result<Duration> {
        let seconds = self.challenge.challenge_window().call().await?;
        Ok(Duration::from_secs(to_u64(seconds)?))
    }

    #[instrument(skip(self))]
    async fn challenge_data_root_inclusion(
        &self,
        block_index: u64,
        pointer_index: u8,
        share_index: u32,
    ) -> anyhow::Result<SubmittedTx> {
        let fee = self.get_challenge_fee().await?;
        let call = self
            .challenge
            .challenge_data_root_inclusion(U256::from(block_index), pointer_index, share_index)
            .value(fee);
        self.send(call, "challengeDataRootInclusion").await
    }

    #[instrument(skip(self, proof))]
    async fn defend_data_root_inclusion(
        &self,
        key: H256,
        proof: &SharesProof,
    ) -> anyhow::Result<SubmittedTx> {
        let proof: challenge::SharesProof = convert(proof.clone())?;
        self.send(
            self.challenge.defend_data_root_inclusion(key.0, proof),
            "defendDataRootInclusion",
        )
        .await
    }

    #[instrument(skip(self))]
    async fn settle_data_root_inclusion(&self, key: H256) -> anyhow::Result<SubmittedTx> {
        self.send(
            self.challenge.settle_data_root_inclusion(key.0),
            "settleDataRootInclusion",
        )
        .await
    }

    async fn get_data_root_inclusion_challenge(&self, key: H256) -> anyhow::Result<DaChallenge> {
        let (block_index, challenger, expiry, status) = self
            .challenge
            .get_data_root_inclusion_challenge(key.0)
            .call()
            .await?;
        Ok(DaChallenge {
            block_index: to_u64(block_index)?,
            challenger,
            expiry: to_u64(expiry)?,
            status: ChallengeStatus::try_from(status)?,
        })
    }

    async fn get_challenge_events(&self, from: u64, to: u64) -> anyhow::Result<Vec<ChallengeEvent>> {
        let events: Vec<ChallengeUpdateFilter> =
            self.events(self.challenge.address(), from, to).await?;
        events
            .into_iter()
            .map(|event| {
                Ok::<_, anyhow::Error>(ChallengeEvent {
                    block_hash: event.block_hash,
                    pointer_index: event.pointer_index,
                    share_index: event.share_index,
                    expiry: to_u64(event.expiry)?,
                    status: ChallengeStatus::try_from(event.status)?,
                })
            })
            .collect()
    }

    async fn get_data_commitments(&self, from: u64, to: u64) -> anyhow::Result<Vec<DataCommitment>> {
        let events: Vec<DataCommitmentStoredFilter> =
            self.events(self.blobstream, from, to).await?;
        events
            .into_iter()
            .map(|event| {
                Ok::<_, anyhow::Error>(DataCommitment {
                    nonce: to_u64(event.proof_nonce)?,
                    start_block: event.start_block,
                    end_block: event.end_block,
                    data_commitment: event.data_commitment,
                })
            })
            .collect()
    }

    #[instrument(skip(self, proof))]
    async fn provide_shares(
        &self,
        rblock: H256,
        pointer_index: u8,
        proof: &SharesProof,
    ) -> anyhow::Result<SubmittedTx> {
        let proof: chain_oracle::SharesProof = convert(proof.clone())?;
        self.send(
            self.oracle.provide_shares(rblock.0, pointer_index, proof),
            "provideShares",
        )
        .await
    }

    async fn shares_key(&self, rblock: H256, shares: &[Bytes]) -> anyhow::Result<H256> {
        let key = self
            .oracle
            .shares_key(rblock.0, shares.to_vec())
            .call()
            .await?;
        Ok(H256(key))
    }

    #[instrument(skip(self, ranges))]
    async fn provide_header(
        &self,
        shares_key: H256,
        ranges: &[ShareRange],
    ) -> anyhow::Result<SubmittedTx> {
        let ranges = oracle_ranges(ranges)?;
        self.send(self.oracle.provide_header(shares_key.0, ranges), "provideHeader")
            .await
    }

    #[instrument(skip(self, ranges))]
    async fn provide_legacy_tx(
        &self,
        shares_key: H256,
        ranges: &[ShareRange],
    ) -> anyhow::Result<SubmittedTx> {
        let ranges = oracle_ranges(ranges)?;
        self.send(
            self.oracle.provide_legacy_tx(shares_key.0, ranges),
            "provideLegacyTx",
        )
        .await
    }
}

fn oracle_ranges(ranges: &[ShareRange]) -> anyhow::Result<Vec<chain_oracle::ShareRange>> {
    Ok(ranges
        .iter()
        .copied()
        .map(convert::<ShareRange, chain_oracle::ShareRange>)
        .collect::<Result<_, _>>()?)
}
