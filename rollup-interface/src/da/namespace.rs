use std::fmt;
use std::str::FromStr;

use ethers_core::abi::{InvalidOutputType, Token, Tokenizable, TokenizableItem};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Length of a serialized namespace: one version byte and a 28 byte id.
pub const NAMESPACE_SIZE: usize = 29;
/// Length of a namespace id.
pub const NAMESPACE_ID_SIZE: usize = 28;
/// Number of leading zero bytes in a version 0 namespace id.
pub const NAMESPACE_V0_ZERO_PREFIX: usize = 18;

/// A Celestia namespace.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Namespace {
    /// Namespace version.
    pub version: u8,
    /// Namespace id.
    pub id: [u8; NAMESPACE_ID_SIZE],
}

/// Namespace of compact shares holding ordinary transactions.
pub const TX_NAMESPACE: Namespace = Namespace::primary_reserved(1);
/// Namespace of compact shares holding pay-for-blob transactions.
pub const PAY_FOR_BLOB_NAMESPACE: Namespace = Namespace::primary_reserved(4);
/// Namespace of the padding shares after the last blob.
pub const TAIL_PADDING_NAMESPACE: Namespace = Namespace::secondary_reserved(0xfe);
/// Namespace of the parity shares.
pub const PARITY_SHARE_NAMESPACE: Namespace = Namespace::secondary_reserved(0xff);

/// The bytes could not be interpreted as a namespace.
#[derive(Debug, Error, PartialEq)]
pub enum InvalidNamespace {
    /// Wrong number of bytes.
    #[error("a namespace is {NAMESPACE_SIZE} bytes, got {0}")]
    Length(usize),
    /// Not valid hex.
    #[error("namespace is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl Namespace {
    const fn primary_reserved(last: u8) -> Self {
        let mut id = [0; NAMESPACE_ID_SIZE];
        id[NAMESPACE_ID_SIZE - 1] = last;
        Self { version: 0, id }
    }

    const fn secondary_reserved(last: u8) -> Self {
        let mut id = [0xff; NAMESPACE_ID_SIZE];
        id[NAMESPACE_ID_SIZE - 1] = last;
        Self {
            version: 0xff,
            id,
        }
    }

    /// Builds a version 0 namespace from a user id of at most 10 bytes.
    /// Longer ids are truncated to their last 10 bytes.
    pub fn new_v0(user_id: &[u8]) -> Self {
        let room = NAMESPACE_ID_SIZE - NAMESPACE_V0_ZERO_PREFIX;
        let user_id = &user_id[user_id.len().saturating_sub(room)..];
        let mut id = [0; NAMESPACE_ID_SIZE];
        id[NAMESPACE_ID_SIZE - user_id.len()..].copy_from_slice(user_id);
        Self { version: 0, id }
    }

    /// Parses a 29 byte serialized namespace.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InvalidNamespace> {
        if bytes.len() != NAMESPACE_SIZE {
            return Err(InvalidNamespace::Length(bytes.len()));
        }
        let mut id = [0; NAMESPACE_ID_SIZE];
        id.copy_from_slice(&bytes[1..]);
        Ok(Self {
            version: bytes[0],
            id,
        })
    }

    /// The 29 byte serialized namespace.
    pub fn to_bytes(&self) -> [u8; NAMESPACE_SIZE] {
        let mut out = [0; NAMESPACE_SIZE];
        out[0] = self.version;
        out[1..].copy_from_slice(&self.id);
        out
    }

    /// Whether shares in this namespace use the compact share format.
    pub fn is_compact(&self) -> bool {
        *self == TX_NAMESPACE || *self == PAY_FOR_BLOB_NAMESPACE
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({})", self)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_bytes()))
    }
}

impl FromStr for Namespace {
    type Err = InvalidNamespace;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for Namespace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Namespace {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Tokenizable for Namespace {
    fn from_token(token: Token) -> Result<Self, InvalidOutputType> {
        let (version, id) = <([u8; 1], [u8; NAMESPACE_ID_SIZE])>::from_token(token)?;
        Ok(Self {
            version: version[0],
            id,
        })
    }

    fn into_token(self) -> Token {
        ([self.version], self.id).into_token()
    }
}

impl TokenizableItem for Namespace {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v0_ids_are_left_padded() {
        let namespace = Namespace::new_v0(b"lumen");
        assert_eq!(namespace.version, 0);
        assert_eq!(&namespace.id[23..], b"lumen");
        assert!(namespace.id[..23].iter().all(|b| *b == 0));
    }

    #[test]
    fn hex_round_trip() {
        let namespace = Namespace::new_v0(b"0123456789abc");
        let parsed: Namespace = namespace.to_string().parse().unwrap();
        assert_eq!(parsed, namespace);
        assert_eq!(&parsed.id[18..], b"3456789abc");
        assert_eq!(
            "0x00".parse::<Namespace>(),
            Err(InvalidNamespace::Length(1))
        );
    }

    #[test]
    fn only_tx_and_pfb_namespaces_are_compact() {
        assert!(TX_NAMESPACE.is_compact());
        assert!(PAY_FOR_BLOB_NAMESPACE.is_compact());
        assert!(!TAIL_PADDING_NAMESPACE.is_compact());
        assert!(!Namespace::new_v0(b"lumen").is_compact());
    }
}
