use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use lumen_celestia_adapter::DaServiceConfig;
pub use lumen_ethereum_adapter::EthereumConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Block production settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RollupConfig {
    /// Largest number of L2 blocks bundled into one rollup block.
    pub bundle_size: u64,
    /// Pause between production attempts while the L2 chain is too short for a bundle.
    #[serde(default = "default_poll_delay_ms")]
    pub poll_delay_ms: u64,
    /// Keep every produced header in the local store.
    #[serde(default)]
    pub store_headers: bool,
    /// Keep the Celestia pointer of every produced header in the local store.
    #[serde(default)]
    pub store_pointers: bool,
}

impl RollupConfig {
    pub fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms)
    }
}

/// Challenge watcher settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DefenderConfig {
    /// Pause between two watcher iterations.
    #[serde(default = "default_poll_delay_ms")]
    pub poll_delay_ms: u64,
    /// First L1 height to scan for challenges when the store has no progress recorded.
    /// Defaults to the L1 head at startup.
    #[serde(default)]
    pub start_l1_height: Option<u64>,
}

impl Default for DefenderConfig {
    fn default() -> Self {
        Self {
            poll_delay_ms: default_poll_delay_ms(),
            start_l1_height: None,
        }
    }
}

impl DefenderConfig {
    pub fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms)
    }
}

/// Local storage.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding the node database.
    pub path: PathBuf,
}

/// Node Configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeConfig {
    /// Block production configuration.
    pub rollup: RollupConfig,
    /// DA configuration.
    pub da: DaServiceConfig,
    /// L1 and L2 configuration.
    pub ethereum: EthereumConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Challenge watcher configuration.
    #[serde(default)]
    pub defender: DefenderConfig,
}

const fn default_poll_delay_ms() -> u64 {
    5_000
}

/// Reads a TOML file into `R`.
pub fn from_toml_path<P: AsRef<Path>, R: DeserializeOwned>(path: P) -> anyhow::Result<R> {
    let mut contents = String::new();
    {
        let mut file = File::open(path)?;
        file.read_to_string(&mut contents)?;
    }

    let result: R = toml::from_str(&contents)?;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use lumen_rollup_interface::da::Namespace;
    use lumen_rollup_interface::Address;
    use tempfile::NamedTempFile;

    use super::*;

    fn create_config_from(content: &str) -> NamedTempFile {
        let mut config_file = NamedTempFile::new().unwrap();
        config_file.write_all(content.as_bytes()).unwrap();
        config_file
    }

    const NAMESPACE: &str = "0x0000000000000000000000000000000000000000000000006c756d656e";

    #[test]
    fn test_correct_config() {
        let config = format!(
            r#"
            [rollup]
            bundle_size = 200
            store_pointers = true
            [da]
            celestia_rpc_auth_token = "SECRET_RPC_TOKEN"
            celestia_rpc_address = "http://localhost:11111/"
            namespace = "{NAMESPACE}"
            max_celestia_response_body_size = 980
            [ethereum]
            l1_rpc_url = "http://localhost:8545"
            l2_rpc_url = "http://localhost:9545"
            canonical_state_chain = "0x0000000000000000000000000000000000000001"
            challenge = "0x0000000000000000000000000000000000000002"
            chain_oracle = "0x0000000000000000000000000000000000000003"
            blobstream = "0x0000000000000000000000000000000000000004"
            tx_timeout_secs = 60
            [storage]
            path = "/tmp"
            [defender]
            start_l1_height = 31337
        "#
        );

        let config_file = create_config_from(&config);

        let config: NodeConfig = from_toml_path(config_file.path()).unwrap();
        let expected = NodeConfig {
            rollup: RollupConfig {
                bundle_size: 200,
                poll_delay_ms: 5_000,
                store_headers: false,
                store_pointers: true,
            },
            da: DaServiceConfig {
                celestia_rpc_auth_token: "SECRET_RPC_TOKEN".to_string(),
                celestia_rpc_address: "http://localhost:11111/".into(),
                celestia_core_rpc_address: "http://localhost:26657".into(),
                namespace: Namespace::new_v0(b"lumen"),
                gas_price: 0.002,
                max_celestia_response_body_size: 980,
                celestia_rpc_timeout_seconds: 60,
            },
            ethereum: EthereumConfig {
                l1_rpc_url: "http://localhost:8545".into(),
                l2_rpc_url: "http://localhost:9545".into(),
                signer_key: None,
                canonical_state_chain: Address::from_low_u64_be(1),
                challenge: Address::from_low_u64_be(2),
                chain_oracle: Address::from_low_u64_be(3),
                blobstream: Address::from_low_u64_be(4),
                tx_poll_interval_ms: 1_000,
                tx_timeout_secs: 60,
            },
            storage: StorageConfig {
                path: PathBuf::from("/tmp"),
            },
            defender: DefenderConfig {
                poll_delay_ms: 5_000,
                start_l1_height: Some(31337),
            },
        };
        assert_eq!(config, expected);
    }

    #[test]
    fn test_missing_section() {
        let config_file = create_config_from("[rollup]\nbundle_size = 1\n");
        let result: anyhow::Result<NodeConfig> = from_toml_path(config_file.path());
        assert!(result.is_err());
    }
}
