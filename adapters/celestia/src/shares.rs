use std::fmt::Display;

use base64::engine::general_purpose::STANDARD as B64_ENGINE;
use base64::Engine;
use bytes::{Buf, Bytes};
use lumen_rollup_interface::da::{Blob, Namespace, NAMESPACE_SIZE};
use serde::de::Error;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// The size of a share, in bytes
pub const SHARE_SIZE: usize = 512;
/// The length of the "info byte" field
pub const INFO_BYTE_LEN: usize = 1;
/// The length of the "sequence length" field
pub const SEQUENCE_LENGTH_BYTES: usize = 4;
/// The length of the "reserved bytes" field in a compact share
pub const RESERVED_BYTES_LEN: usize = 4;
/// The only share version this crate understands
pub const SHARE_VERSION_ZERO: u8 = 0;

/// Offset of the first payload byte in a share.
///
/// Every share starts with a namespace and an info byte. The first share of a sequence also
/// carries the sequence length, and compact shares (transactions, PFBs) carry reserved bytes.
/// Both directions of share addressing go through this function.
pub const fn share_data_start(is_sequence_start: bool, is_compact: bool) -> usize {
    let mut offset = NAMESPACE_SIZE + INFO_BYTE_LEN;
    if is_sequence_start {
        offset += SEQUENCE_LENGTH_BYTES;
    }
    if is_compact {
        offset += RESERVED_BYTES_LEN;
    }
    offset
}

/// Payload capacity of a share.
pub const fn share_capacity(is_sequence_start: bool, is_compact: bool) -> usize {
    SHARE_SIZE - share_data_start(is_sequence_start, is_compact)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShareError {
    #[error("a share must be {SHARE_SIZE} bytes, got {0}")]
    InvalidLength(usize),
    #[error("unsupported share version {0}")]
    UnsupportedVersion(u8),
    #[error("the sequence does not begin with a start share")]
    NotAStartShare,
    #[error("sequence declares {declared} bytes but its shares only hold {available}")]
    SequenceTooLong { declared: usize, available: usize },
    #[error("no shares")]
    Empty,
    #[error("invalid base64 share encoding")]
    InvalidEncoding,
}

/// A single Celestia share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Share {
    Continuation(Bytes),
    Start(Bytes),
}

impl AsRef<[u8]> for Share {
    fn as_ref(&self) -> &[u8] {
        self.raw()
    }
}

impl Display for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", B64_ENGINE.encode(self.raw()))
    }
}

impl Serialize for Share {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Share {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let raw = B64_ENGINE
            .decode(encoded)
            .map_err(|_| Error::custom(ShareError::InvalidEncoding))?;
        Share::new(raw).map_err(Error::custom)
    }
}

fn is_sequence_start_unchecked(share: &[u8]) -> bool {
    share[NAMESPACE_SIZE] & 0x01 == 1
}

impl Share {
    /// Parses a raw share, checking its length and version.
    pub fn new(inner: impl Into<Bytes>) -> Result<Self, ShareError> {
        let inner = inner.into();
        if inner.len() != SHARE_SIZE {
            return Err(ShareError::InvalidLength(inner.len()));
        }
        let version = inner[NAMESPACE_SIZE] >> 1;
        if version != SHARE_VERSION_ZERO {
            return Err(ShareError::UnsupportedVersion(version));
        }
        if is_sequence_start_unchecked(&inner) {
            Ok(Self::Start(inner))
        } else {
            Ok(Self::Continuation(inner))
        }
    }

    /// Returns this share in raw serialized form as a slice
    pub fn raw(&self) -> &[u8] {
        match self {
            Share::Continuation(inner) => inner.as_ref(),
            Share::Start(inner) => inner.as_ref(),
        }
    }

    pub fn namespace(&self) -> Namespace {
        // the length was checked on construction
        Namespace::from_bytes(&self.raw()[..NAMESPACE_SIZE]).unwrap_or_default()
    }

    pub fn is_sequence_start(&self) -> bool {
        matches!(self, Share::Start(_))
    }

    pub fn is_compact(&self) -> bool {
        self.namespace().is_compact()
    }

    /// Length in bytes of the sequence this share starts.
    pub fn sequence_length(&self) -> Result<usize, ShareError> {
        match self {
            Share::Continuation(_) => Err(ShareError::NotAStartShare),
            Share::Start(inner) => {
                let mut inner = inner.clone();
                inner.advance(NAMESPACE_SIZE + INFO_BYTE_LEN);
                Ok(inner.get_u32() as usize)
            }
        }
    }

    /// Offset of the first payload byte
    pub fn data_offset(&self) -> usize {
        share_data_start(self.is_sequence_start(), self.is_compact())
    }

    /// The payload portion of the share, padding included
    pub fn data(&self) -> &[u8] {
        &self.raw()[self.data_offset()..]
    }
}

/// Parses raw shares as returned by a DA node.
pub fn parse_shares<S: AsRef<[u8]>>(raw: &[S]) -> Result<Vec<Share>, ShareError> {
    raw.iter()
        .map(|share| Share::new(Bytes::copy_from_slice(share.as_ref())))
        .collect()
}

/// Reassembles the payload of a share sequence, dropping the padding after the last byte.
pub fn sequence_data(shares: &[Share]) -> Result<Vec<u8>, ShareError> {
    let first = shares.first().ok_or(ShareError::Empty)?;
    let declared = first.sequence_length()?;

    let mut data = Vec::with_capacity(declared.min(shares.len() * SHARE_SIZE));
    for share in shares {
        data.extend_from_slice(share.data());
        if data.len() >= declared {
            break;
        }
    }
    if data.len() < declared {
        return Err(ShareError::SequenceTooLong {
            declared,
            available: data.len(),
        });
    }
    data.truncate(declared);
    Ok(data)
}

/// Splits a blob into sparse version 0 shares, as the DA network does.
pub fn split_blob(blob: &Blob) -> Vec<Share> {
    let namespace = blob.namespace.to_bytes();
    let compact = blob.namespace.is_compact();
    let mut remaining = blob.data.as_slice();
    let mut shares = Vec::new();

    loop {
        let is_start = shares.is_empty();
        let mut raw = Vec::with_capacity(SHARE_SIZE);
        raw.extend_from_slice(&namespace);
        raw.push((SHARE_VERSION_ZERO << 1) | u8::from(is_start));
        if is_start {
            raw.extend_from_slice(&(blob.data.len() as u32).to_be_bytes());
        }
        if compact {
            raw.extend_from_slice(&[0; RESERVED_BYTES_LEN]);
        }
        let take = remaining.len().min(SHARE_SIZE - raw.len());
        raw.extend_from_slice(&remaining[..take]);
        remaining = &remaining[take..];
        raw.resize(SHARE_SIZE, 0);

        let raw = Bytes::from(raw);
        shares.push(if is_start {
            Share::Start(raw)
        } else {
            Share::Continuation(raw)
        });
        if remaining.is_empty() {
            return shares;
        }
    }
}

/// Number of shares a sparse blob of `len` bytes occupies.
pub fn sparse_shares_needed(len: usize) -> usize {
    let first = share_capacity(true, false);
    if len <= first {
        1
    } else {
        let rest = share_capacity(false, false);
        1 + (len - first + rest - 1) / rest
    }
}
