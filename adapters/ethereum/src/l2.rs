use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Block, Transaction, U256, U64};
use ethers::utils::keccak256;
use lumen_rollup_interface::rollup::{L2Block, L2Header};
use lumen_rollup_interface::services::l2::L2Client;
use lumen_rollup_interface::H256;
use serde::Deserialize;

/// Reads blocks from the L2 chain over JSON-RPC.
#[derive(Debug, Clone)]
pub struct EthL2Client {
    provider: Provider<Http>,
}

impl EthL2Client {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let provider = Provider::<Http>::try_from(url).context("invalid l2 rpc url")?;
        Ok(Self::with_provider(provider))
    }

    pub fn with_provider(provider: Provider<Http>) -> Self {
        Self { provider }
    }
}

fn narrow(value: U256, field: &str) -> anyhow::Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("block field {field}={value} does not fit in 64 bits"))
}

/// Cancun header fields, read from the same JSON as the block.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancunFields {
    blob_gas_used: Option<U64>,
    excess_blob_gas: Option<U64>,
    parent_beacon_block_root: Option<H256>,
}

/// Rebuilds the block in the chain's own encoding. Envelopes are the signed RLP of each
/// transaction, with the type byte prepended for typed transactions.
///
/// Fails if the rebuilt header or any envelope does not hash to what the node reported, since
/// such a block could never be matched against its published shares.
fn into_l2_block(block: Block<Transaction>, cancun: CancunFields) -> anyhow::Result<L2Block> {
    let number = block
        .number
        .ok_or_else(|| anyhow!("block {:?} has no number, is it pending?", block.hash))?
        .as_u64();
    let header = L2Header {
        parent_hash: block.parent_hash,
        uncles_hash: block.uncles_hash,
        coinbase: block.author.unwrap_or_default(),
        state_root: block.state_root,
        transactions_root: block.transactions_root,
        receipts_root: block.receipts_root,
        logs_bloom: block.logs_bloom.unwrap_or_default(),
        difficulty: block.difficulty,
        number,
        gas_limit: narrow(block.gas_limit, "gasLimit")?,
        gas_used: narrow(block.gas_used, "gasUsed")?,
        timestamp: narrow(block.timestamp, "timestamp")?,
        extra_data: block.extra_data,
        mix_hash: block.mix_hash.unwrap_or_default(),
        nonce: block.nonce.unwrap_or_default(),
        base_fee_per_gas: block.base_fee_per_gas,
        withdrawals_root: block.withdrawals_root,
        blob_gas_used: cancun.blob_gas_used.map(|gas| gas.as_u64()),
        excess_blob_gas: cancun.excess_blob_gas.map(|gas| gas.as_u64()),
        parent_beacon_block_root: cancun.parent_beacon_block_root,
    };
    if !header.is_well_formed() {
        bail!("block {number} sets a fork field without the fields of earlier forks");
    }

    let transactions = block
        .transactions
        .iter()
        .map(|tx| {
            let envelope = tx.rlp();
            if H256(keccak256(&envelope)) != tx.hash {
                bail!("re-encoded transaction {:?} of block {number} does not match its hash", tx.hash);
            }
            Ok(envelope)
        })
        .collect::<anyhow::Result<_>>()?;

    let l2_block = L2Block {
        header,
        transactions,
    };
    if let Some(hash) = block.hash {
        let actual = l2_block.hash();
        if actual != hash {
            bail!("re-encoded header of block {number} hashes to {actual:?}, node reported {hash:?}");
        }
    }
    Ok(l2_block)
}

#[async_trait]
impl L2Client for EthL2Client {
    async fn get_height(&self) -> anyhow::Result<u64> {
        Ok(self.provider.get_block_number().await?.as_u64())
    }

    async fn get_block(&self, height: u64) -> anyhow::Result<L2Block> {
        let json: serde_json::Value = self
            .provider
            .request("eth_getBlockByNumber", (U64::from(height), true))
            .await?;
        if json.is_null() {
            bail!("L2 block {height} not found");
        }
        let cancun: CancunFields =
            serde_json::from_value(json.clone()).context("invalid L2 block fork fields")?;
        let block: Block<Transaction> =
            serde_json::from_value(json).context("invalid L2 block")?;
        into_l2_block(block, cancun)
    }
}
