use anyhow::Context;
use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// Environment variable holding the signer key when the config file does not.
pub const SIGNER_KEY_ENV: &str = "LUMEN_SIGNER_KEY";

/// Runtime configuration for the L1 and L2 clients
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EthereumConfig {
    /// JSON-RPC endpoint of the L1 settlement chain
    pub l1_rpc_url: String,
    /// JSON-RPC endpoint of the L2 chain being rolled up
    pub l2_rpc_url: String,
    /// Hex private key signing every L1 transaction. Falls back to [`SIGNER_KEY_ENV`].
    #[serde(default, skip_serializing)]
    pub signer_key: Option<String>,
    pub canonical_state_chain: Address,
    pub challenge: Address,
    pub chain_oracle: Address,
    /// The Blobstream contract storing data commitments
    pub blobstream: Address,
    /// How often pending transactions are polled for a receipt, in milliseconds
    #[serde(default = "default_tx_poll_interval_ms")]
    pub tx_poll_interval_ms: u64,
    /// How long to wait for a transaction to be mined, in seconds
    #[serde(default = "default_tx_timeout_secs")]
    pub tx_timeout_secs: u64,
}

const fn default_tx_poll_interval_ms() -> u64 {
    1_000
}

const fn default_tx_timeout_secs() -> u64 {
    300
}

impl EthereumConfig {
    /// The signer key from the config, or from the environment.
    pub fn signer_key(&self) -> anyhow::Result<String> {
        match &self.signer_key {
            Some(key) => Ok(key.clone()),
            None => std::env::var(SIGNER_KEY_ENV)
                .with_context(|| format!("no signer_key configured and {SIGNER_KEY_ENV} is unset")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let config: EthereumConfig = serde_json::from_value(serde_json::json!({
            "l1_rpc_url": "http://localhost:8545",
            "l2_rpc_url": "http://localhost:9545",
            "signer_key": "0x01",
            "canonical_state_chain": "0x0000000000000000000000000000000000000001",
            "challenge": "0x0000000000000000000000000000000000000002",
            "chain_oracle": "0x0000000000000000000000000000000000000003",
            "blobstream": "0x0000000000000000000000000000000000000004"
        }))
        .unwrap();
        assert_eq!(config.tx_poll_interval_ms, 1_000);
        assert_eq!(config.tx_timeout_secs, 300);
        assert_eq!(config.signer_key().unwrap(), "0x01");
        assert_eq!(config.blobstream, Address::from_low_u64_be(4));
    }
}
