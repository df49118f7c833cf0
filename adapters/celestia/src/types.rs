//! JSON shapes of the Celestia node and Celestia core RPC responses, and their conversion
//! into the proof types used on L1.
use anyhow::{ensure, Context};
use lumen_rollup_interface::da::{
    BinaryMerkleProof, Namespace, NamespaceMerkleMultiproof, NamespaceNode, ShareProof,
    NAMESPACE_ID_SIZE,
};
use lumen_rollup_interface::{Bytes, H256};
use serde::{Deserialize, Serialize};

use crate::utils::{base64_bytes, base64_vec, encode_base64, hex_vec, u64_from_str_or_num, BoxError};

/// Response of `state.SubmitPayForBlob`. Only the fields we use are deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CelestiaBasicResponse {
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub height: u64,
    #[serde(default)]
    pub raw_log: String,
    #[serde(rename = "code")]
    pub error_code: Option<u64>,
    #[serde(rename = "txhash")]
    pub tx_hash: String,
    #[serde(default)]
    pub gas_wanted: u64,
    #[serde(default)]
    pub gas_used: u64,
}

impl CelestiaBasicResponse {
    /// We assume that absence of `code` (or a zero code) indicates that request was successful
    pub fn is_success(&self) -> bool {
        self.error_code.unwrap_or(0) == 0
    }

    pub fn tx_hash(&self) -> Result<H256, BoxError> {
        parse_hash(&self.tx_hash).context("invalid txhash in SubmitPayForBlob response")
    }
}

/// A blob as exchanged with the node's blob API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonBlob {
    pub namespace: String,
    pub data: String,
    pub share_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment: Option<String>,
    /// Index of the blob's first share in the square, `-1` when unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
}

impl JsonBlob {
    pub fn new(namespace: Namespace, data: &[u8]) -> Self {
        Self {
            namespace: encode_base64(namespace.to_bytes()),
            data: encode_base64(data),
            share_version: 0,
            commitment: None,
            index: None,
        }
    }

    pub fn share_index(&self) -> Option<u64> {
        self.index.and_then(|i| u64::try_from(i).ok())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcHeaderInner {
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub height: u64,
    pub data_hash: String,
}

/// The subset of `header.GetByHeight` we need.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcExtendedHeader {
    pub header: RpcHeaderInner,
}

impl RpcExtendedHeader {
    pub fn data_root(&self) -> Result<H256, BoxError> {
        parse_hash(&self.header.data_hash).context("invalid data_hash in header")
    }
}

/// Result of `share.GetRange`.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcShareRange {
    #[serde(rename = "Shares", alias = "shares", deserialize_with = "base64_vec")]
    pub shares: Vec<Vec<u8>>,
}

/// A Tendermint merkle proof.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcMerkleProof {
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub total: u64,
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub index: u64,
    #[serde(default, deserialize_with = "base64_vec")]
    pub aunts: Vec<Vec<u8>>,
}

impl RpcMerkleProof {
    pub fn into_binary_proof(self) -> Result<BinaryMerkleProof, BoxError> {
        let side_nodes = self
            .aunts
            .iter()
            .map(|aunt| {
                ensure!(aunt.len() == 32, "merkle aunt must be 32 bytes, got {}", aunt.len());
                Ok(H256::from_slice(aunt))
            })
            .collect::<Result<_, BoxError>>()?;
        Ok(BinaryMerkleProof {
            side_nodes,
            key: self.index,
            num_leaves: self.total,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcNmtProof {
    #[serde(default, deserialize_with = "u64_from_str_or_num")]
    pub start: u64,
    #[serde(default, deserialize_with = "u64_from_str_or_num")]
    pub end: u64,
    #[serde(default, deserialize_with = "base64_vec")]
    pub nodes: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRowProof {
    #[serde(deserialize_with = "hex_vec")]
    pub row_roots: Vec<Vec<u8>>,
    pub proofs: Vec<RpcMerkleProof>,
}

/// Result of Celestia core's `prove_shares`.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcShareProof {
    #[serde(deserialize_with = "base64_vec")]
    pub data: Vec<Vec<u8>>,
    pub share_proofs: Vec<RpcNmtProof>,
    #[serde(deserialize_with = "base64_bytes")]
    pub namespace_id: Vec<u8>,
    pub row_proof: RpcRowProof,
    #[serde(default)]
    pub namespace_version: u8,
}

fn parse_node(bytes: &[u8]) -> Result<NamespaceNode, BoxError> {
    NamespaceNode::from_bytes(bytes)
        .with_context(|| format!("namespace node must be 90 bytes, got {}", bytes.len()))
}

impl RpcShareProof {
    pub fn into_share_proof(self) -> Result<ShareProof, BoxError> {
        ensure!(
            self.namespace_id.len() == NAMESPACE_ID_SIZE,
            "namespace id must be {NAMESPACE_ID_SIZE} bytes, got {}",
            self.namespace_id.len()
        );
        let mut id = [0; NAMESPACE_ID_SIZE];
        id.copy_from_slice(&self.namespace_id);

        let share_proofs = self
            .share_proofs
            .into_iter()
            .map(|proof| {
                Ok(NamespaceMerkleMultiproof {
                    begin_key: proof.start,
                    end_key: proof.end,
                    side_nodes: proof
                        .nodes
                        .iter()
                        .map(|node| parse_node(node))
                        .collect::<Result<_, BoxError>>()?,
                })
            })
            .collect::<Result<_, BoxError>>()?;
        let row_roots = self
            .row_proof
            .row_roots
            .iter()
            .map(|root| parse_node(root))
            .collect::<Result<_, _>>()?;
        let row_proofs = self
            .row_proof
            .proofs
            .into_iter()
            .map(RpcMerkleProof::into_binary_proof)
            .collect::<Result<_, _>>()?;

        Ok(ShareProof {
            data: self.data.into_iter().map(Bytes::from).collect(),
            share_proofs,
            namespace: Namespace {
                version: self.namespace_version,
                id,
            },
            row_roots,
            row_proofs,
        })
    }
}

/// Result of Celestia core's `data_root_inclusion_proof`.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcDataRootInclusionProof {
    pub proof: RpcMerkleProof,
}

pub fn parse_hash(hex_hash: &str) -> Result<H256, BoxError> {
    let bytes = hex::decode(hex_hash.trim_start_matches("0x"))?;
    ensure!(bytes.len() == 32, "expected a 32 byte hash, got {} bytes", bytes.len());
    Ok(H256::from_slice(&bytes))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn node_hex(byte: u8) -> String {
        hex::encode_upper([byte; 90])
    }

    #[test]
    fn share_proof_conversion() {
        let namespace = Namespace::new_v0(b"lumen");
        let response = json!({
            "data": [encode_base64([1u8; 512]), encode_base64([2u8; 512])],
            "share_proofs": [{
                "start": 3,
                "end": 5,
                "nodes": [encode_base64([9u8; 90])]
            }],
            "namespace_id": encode_base64(namespace.id),
            "row_proof": {
                "row_roots": [node_hex(4)],
                "proofs": [{
                    "total": "8",
                    "index": "2",
                    "leaf_hash": encode_base64([0u8; 32]),
                    "aunts": [encode_base64([5u8; 32]), encode_base64([6u8; 32])]
                }],
                "start_row": 0,
                "end_row": 0
            },
            "namespace_version": 0
        });

        let proof: RpcShareProof = serde_json::from_value(response).unwrap();
        let proof = proof.into_share_proof().unwrap();
        assert_eq!(proof.namespace, namespace);
        assert_eq!(proof.data.len(), 2);
        assert_eq!(proof.share_proofs[0].begin_key, 3);
        assert_eq!(proof.share_proofs[0].end_key, 5);
        assert_eq!(proof.share_proofs[0].side_nodes[0].digest, H256::repeat_byte(9));
        assert_eq!(proof.row_roots[0].digest, H256::repeat_byte(4));
        assert_eq!(proof.row_proofs[0].key, 2);
        assert_eq!(proof.row_proofs[0].num_leaves, 8);
        assert_eq!(
            proof.row_proofs[0].side_nodes,
            vec![H256::repeat_byte(5), H256::repeat_byte(6)]
        );
    }

    #[test]
    fn malformed_nodes_are_rejected() {
        let response = json!({
            "data": [],
            "share_proofs": [{"start": 0, "end": 1, "nodes": [encode_base64([9u8; 12])]}],
            "namespace_id": encode_base64([0u8; 28]),
            "row_proof": {"row_roots": [], "proofs": []}
        });
        let proof: RpcShareProof = serde_json::from_value(response).unwrap();
        assert!(proof.into_share_proof().is_err());
    }

    #[test]
    fn submit_response_fields() {
        let response: CelestiaBasicResponse = serde_json::from_value(json!({
            "height": "26",
            "txhash": "C9FEFD6D35FCC73F9E7D5C74E1D33F0B7666936876F2AD75E5D0FB2944BFADF2",
            "gas_used": 70522,
            "gas_wanted": 133540,
            "raw_log": ""
        }))
        .unwrap();
        assert!(response.is_success());
        assert_eq!(response.height, 26);
        assert_eq!(response.tx_hash().unwrap().as_bytes()[0], 0xc9);
    }

    #[test]
    fn header_data_root() {
        let header: RpcExtendedHeader = serde_json::from_value(json!({
            "header": {"height": "500", "data_hash": hex::encode_upper([0xd0; 32])},
            "dah": {"row_roots": [], "column_roots": []}
        }))
        .unwrap();
        assert_eq!(header.header.height, 500);
        assert_eq!(header.data_root().unwrap(), H256::repeat_byte(0xd0));
    }
}
