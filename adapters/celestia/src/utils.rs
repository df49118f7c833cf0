use base64::engine::general_purpose::STANDARD as B64_ENGINE;
use base64::Engine;
use serde::de::Error;
use serde::{Deserialize, Deserializer};

pub type BoxError = anyhow::Error;

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(u64),
}

/// Tendermint encodes 64 bit integers as strings; accept both forms.
pub fn u64_from_str_or_num<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Number(n) => Ok(n),
        StringOrNumber::String(s) => s.parse().map_err(D::Error::custom),
    }
}

pub fn base64_bytes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    B64_ENGINE.decode(encoded).map_err(D::Error::custom)
}

pub fn base64_vec<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
    Option::<Vec<String>>::deserialize(deserializer)?
        .unwrap_or_default()
        .into_iter()
        .map(|encoded| B64_ENGINE.decode(encoded).map_err(D::Error::custom))
        .collect()
}

pub fn hex_vec<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
    Option::<Vec<String>>::deserialize(deserializer)?
        .unwrap_or_default()
        .into_iter()
        .map(|encoded| hex::decode(encoded.trim_start_matches("0x")).map_err(D::Error::custom))
        .collect()
}

pub fn encode_base64(bytes: impl AsRef<[u8]>) -> String {
    B64_ENGINE.encode(bytes)
}

pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    B64_ENGINE.decode(encoded)
}
