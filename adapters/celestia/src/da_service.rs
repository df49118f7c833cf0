use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::{ArrayParams, ObjectParams};
use jsonrpsee::http_client::{HeaderMap, HttpClient, HttpClientBuilder};
use lumen_rollup_interface::da::{
    BinaryMerkleProof, CelestiaPointer, Namespace, ShareProof, SharePointer,
};
use lumen_rollup_interface::rollup::Bundle;
use lumen_rollup_interface::services::da::DaService;
use lumen_rollup_interface::H256;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::shares::sparse_shares_needed;
use crate::types::{
    CelestiaBasicResponse, JsonBlob, RpcDataRootInclusionProof, RpcExtendedHeader,
    RpcShareProof, RpcShareRange,
};
use crate::utils::{decode_base64, encode_base64, BoxError};

// Approximate value, just to make it work.
const GAS_PER_BYTE: usize = 120;

/// Runtime configuration for the DA service
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct DaServiceConfig {
    /// The jwt used to authenticate with the Celestia rpc server
    pub celestia_rpc_auth_token: String,
    /// The address of the Celestia node rpc server
    #[serde(default = "default_rpc_addr")]
    pub celestia_rpc_address: String,
    /// The address of the Celestia core (consensus) rpc server, used for proofs
    #[serde(default = "default_core_rpc_addr")]
    pub celestia_core_rpc_address: String,
    /// The namespace bundles are published to
    pub namespace: Namespace,
    /// Gas price paid for blob submissions, in utia
    #[serde(default = "default_gas_price")]
    pub gas_price: f64,
    /// The maximum size of a Celestia RPC response, in bytes
    #[serde(default = "default_max_response_size")]
    pub max_celestia_response_body_size: u32,
    /// The timeout for a Celestia RPC request, in seconds
    #[serde(default = "default_request_timeout_seconds")]
    pub celestia_rpc_timeout_seconds: u64,
}

fn default_rpc_addr() -> String {
    "http://localhost:11111/".into()
}

fn default_core_rpc_addr() -> String {
    "http://localhost:26657".into()
}

const fn default_gas_price() -> f64 {
    0.002
}

fn default_max_response_size() -> u32 {
    1024 * 1024 * 100 // 100 MB
}

const fn default_request_timeout_seconds() -> u64 {
    60
}

/// Talks to a Celestia light/bridge node for blobs and shares, and to Celestia core for
/// share and data root inclusion proofs.
#[derive(Debug, Clone)]
pub struct CelestiaService {
    node: HttpClient,
    core: HttpClient,
    namespace: Namespace,
    gas_price: f64,
}

impl CelestiaService {
    pub fn with_clients(
        node: HttpClient,
        core: HttpClient,
        namespace: Namespace,
        gas_price: f64,
    ) -> Self {
        Self {
            node,
            core,
            namespace,
            gas_price,
        }
    }

    pub fn new(config: DaServiceConfig) -> Result<Self, BoxError> {
        let timeout = Duration::from_secs(config.celestia_rpc_timeout_seconds);
        let node = {
            let mut headers = HeaderMap::new();
            headers.insert(
                "Authorization",
                format!("Bearer {}", config.celestia_rpc_auth_token).parse()?,
            );

            HttpClientBuilder::default()
                .set_headers(headers)
                .max_response_size(config.max_celestia_response_body_size)
                .request_timeout(timeout)
                .build(&config.celestia_rpc_address)
                .context("invalid celestia node rpc address")?
        };
        let core = HttpClientBuilder::default()
            .max_response_size(config.max_celestia_response_body_size)
            .request_timeout(timeout)
            .build(&config.celestia_core_rpc_address)
            .context("invalid celestia core rpc address")?;

        Ok(Self::with_clients(
            node,
            core,
            config.namespace,
            config.gas_price,
        ))
    }

    async fn get_all_blobs(&self, height: u64) -> Result<Vec<JsonBlob>, BoxError> {
        let mut params = ArrayParams::new();
        params.insert(height)?;
        params.insert([encode_base64(self.namespace.to_bytes())])?;
        match self
            .node
            .request::<Option<Vec<JsonBlob>>, _>("blob.GetAll", params)
            .await
        {
            Ok(blobs) => Ok(blobs.unwrap_or_default()),
            // the node reports an empty namespace as an error
            Err(err) if err.to_string().contains("not found") => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_data_root(&self, height: u64) -> Result<H256, BoxError> {
        let mut params = ArrayParams::new();
        params.insert(height)?;
        let header = self
            .node
            .request::<RpcExtendedHeader, _>("header.GetByHeight", params)
            .await?;
        debug!(height = header.header.height, data_hash = %header.header.data_hash, "Fetched header");
        header.data_root()
    }
}

fn get_gas_limit_for_bytes(n: usize) -> usize {
    (n + 512) * GAS_PER_BYTE + 1060
}

#[async_trait]
impl DaService for CelestiaService {
    fn namespace(&self) -> Namespace {
        self.namespace
    }

    #[instrument(skip_all, fields(blocks = bundle.len()))]
    async fn publish_bundle(&self, bundle: &Bundle) -> Result<CelestiaPointer, BoxError> {
        // https://node-rpc-docs.celestia.org/
        let data = bundle.encode();
        debug!("Sending {} bytes of raw data to Celestia.", data.len());
        let blob = JsonBlob::new(self.namespace, &data);

        let mut params = ArrayParams::new();
        params.insert([&blob])?;
        params.insert(json!({
            "gas_price": self.gas_price,
            "is_gas_price_set": true,
            "gas": get_gas_limit_for_bytes(data.len()),
        }))?;
        // Note, we only deserialize what we can use, other fields might be left over
        let response = self
            .node
            .request::<CelestiaBasicResponse, _>("state.SubmitPayForBlob", params)
            .await?;
        if !response.is_success() {
            bail!("Error returned from Celestia node: {:?}", response);
        }
        debug!("Response after submitting blob: {:?}", response);
        let tx_hash = response.tx_hash()?;

        let share_start = self
            .get_all_blobs(response.height)
            .await?
            .into_iter()
            .find(|included| included.data == blob.data)
            .and_then(|included| included.share_index())
            .with_context(|| {
                format!(
                    "submitted blob not found in namespace {} at height {}",
                    self.namespace, response.height
                )
            })?;
        let data_root = self.get_data_root(response.height).await?;

        let pointer = CelestiaPointer {
            height: response.height,
            data_root,
            tx_hash,
            share_start,
            share_len: sparse_shares_needed(data.len()) as u64,
        };
        info!(%pointer, tx_hash = %response.tx_hash, "Blob has been submitted to Celestia");
        Ok(pointer)
    }

    async fn get_shares(&self, pointer: &CelestiaPointer) -> Result<Vec<Vec<u8>>, BoxError> {
        let mut params = ArrayParams::new();
        params.insert(pointer.height)?;
        params.insert(pointer.share_start)?;
        params.insert(pointer.share_start + pointer.share_len)?;
        let range = self
            .node
            .request::<RpcShareRange, _>("share.GetRange", params)
            .await?;
        if range.shares.len() as u64 != pointer.share_len {
            bail!(
                "expected {} shares from {}, the node returned {}",
                pointer.share_len,
                pointer,
                range.shares.len()
            );
        }
        Ok(range.shares)
    }

    async fn find_pointer(&self, height: u64) -> Result<Option<CelestiaPointer>, BoxError> {
        let found = self.get_all_blobs(height).await?.into_iter().rev().find_map(|blob| {
            let data = decode_base64(&blob.data).ok()?;
            let share_start = blob.share_index()?;
            Bundle::decode(&data).ok()?;
            Some((share_start, data.len()))
        });
        let Some((share_start, len)) = found else {
            debug!(height, namespace = %self.namespace, "No bundle published at height");
            return Ok(None);
        };

        Ok(Some(CelestiaPointer {
            height,
            data_root: self.get_data_root(height).await?,
            // the node's blob API does not expose the pay-for-blob transaction
            tx_hash: H256::zero(),
            share_start,
            share_len: sparse_shares_needed(len) as u64,
        }))
    }

    async fn get_shares_proof(
        &self,
        pointer: &CelestiaPointer,
        share_pointer: &SharePointer,
    ) -> Result<ShareProof, BoxError> {
        if share_pointer.end_share() as u64 > pointer.share_len {
            warn!(%pointer, ?share_pointer, "Share pointer reaches past the blob");
        }
        let start = pointer.absolute_share(share_pointer.start_share);
        let end = pointer.absolute_share(share_pointer.end_share());

        let mut params = ObjectParams::new();
        params.insert("height", pointer.height.to_string())?;
        params.insert("startShare", start.to_string())?;
        params.insert("endShare", end.to_string())?;
        let proof = self
            .core
            .request::<RpcShareProof, _>("prove_shares", params)
            .await?;
        debug!(height = pointer.height, start, end, "Fetched share proof");
        proof.into_share_proof()
    }

    async fn get_data_root_inclusion_proof(
        &self,
        height: u64,
        start: u64,
        end: u64,
    ) -> Result<BinaryMerkleProof, BoxError> {
        let mut params = ObjectParams::new();
        params.insert("height", height.to_string())?;
        params.insert("start", start.to_string())?;
        params.insert("end", end.to_string())?;
        let response = self
            .core
            .request::<RpcDataRootInclusionProof, _>("data_root_inclusion_proof", params)
            .await?;
        response.proof.into_binary_proof()
    }
}
