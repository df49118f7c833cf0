use std::fmt;

use ethers_core::abi::{InvalidOutputType, Token, Tokenizable, TokenizableItem};
use ethers_core::types::H256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a bundle's blob lives on Celestia.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CelestiaPointer {
    /// Celestia block height.
    pub height: u64,
    /// Data root of that block.
    pub data_root: H256,
    /// Hash of the pay-for-blob transaction.
    pub tx_hash: H256,
    /// Index of the blob's first share in the original data square.
    pub share_start: u64,
    /// Number of shares the blob occupies.
    pub share_len: u64,
}

impl CelestiaPointer {
    /// Absolute square index of the `index`th share of the blob.
    pub fn absolute_share(&self, index: usize) -> u64 {
        self.share_start + index as u64
    }
}

impl fmt::Display for CelestiaPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "height={} data_root={:?} shares={}..{}",
            self.height,
            self.data_root,
            self.share_start,
            self.share_start + self.share_len
        )
    }
}

/// A byte range `[start, end)` inside one raw share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRange {
    pub start: u64,
    pub end: u64,
}

impl Tokenizable for ShareRange {
    fn from_token(token: Token) -> Result<Self, InvalidOutputType> {
        let (start, end) = <(u64, u64)>::from_token(token)?;
        Ok(Self { start, end })
    }

    fn into_token(self) -> Token {
        (self.start, self.end).into_token()
    }
}

impl TokenizableItem for ShareRange {}

/// Locates one item (a header or a transaction) inside a blob's shares.
///
/// Concatenating `shares[start_share + i][ranges[i].start..ranges[i].end]` yields exactly
/// the item's serialized bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharePointer {
    /// Index of the first share spanned, relative to the blob's first share.
    pub start_share: usize,
    /// One byte range per share spanned.
    pub ranges: Vec<ShareRange>,
}

/// A share pointer referenced bytes outside the shares it was applied to.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("range {index} of the share pointer is out of bounds")]
pub struct RangeOutOfBounds {
    /// Index of the offending range.
    pub index: usize,
}

impl SharePointer {
    /// A pointer covering the whole of share `index`.
    pub fn whole_share(index: usize, share_size: usize) -> Self {
        Self {
            start_share: index,
            ranges: vec![ShareRange {
                start: 0,
                end: share_size as u64,
            }],
        }
    }

    /// Number of shares spanned.
    pub fn share_count(&self) -> usize {
        self.ranges.len()
    }

    /// One past the last share spanned.
    pub fn end_share(&self) -> usize {
        self.start_share + self.ranges.len()
    }

    /// Concatenates the pointed-to bytes of `shares`, which must be the blob's shares.
    pub fn bytes<S: AsRef<[u8]>>(&self, shares: &[S]) -> Result<Vec<u8>, RangeOutOfBounds> {
        self.bytes_from(self.start_share, shares)
    }

    /// Like [`SharePointer::bytes`], for shares that start at the pointer's first share.
    pub fn bytes_of_spanned<S: AsRef<[u8]>>(&self, shares: &[S]) -> Result<Vec<u8>, RangeOutOfBounds> {
        self.bytes_from(0, shares)
    }

    fn bytes_from<S: AsRef<[u8]>>(&self, first: usize, shares: &[S]) -> Result<Vec<u8>, RangeOutOfBounds> {
        let mut out = Vec::new();
        for (index, range) in self.ranges.iter().enumerate() {
            let share = shares
                .get(first + index)
                .map(AsRef::as_ref)
                .ok_or(RangeOutOfBounds { index })?;
            let bytes = share
                .get(range.start as usize..range.end as usize)
                .ok_or(RangeOutOfBounds { index })?;
            out.extend_from_slice(bytes);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_concatenates_ranges() {
        let shares = vec![vec![0u8; 8], vec![1, 2, 3, 4, 5, 6, 7, 8], vec![9, 10, 11, 12]];
        let pointer = SharePointer {
            start_share: 1,
            ranges: vec![ShareRange { start: 6, end: 8 }, ShareRange { start: 0, end: 3 }],
        };
        assert_eq!(pointer.bytes(&shares).unwrap(), vec![7, 8, 9, 10, 11]);
        assert_eq!(pointer.bytes_of_spanned(&shares[1..]).unwrap(), vec![7, 8, 9, 10, 11]);
        assert_eq!(pointer.end_share(), 3);
    }

    #[test]
    fn pointer_json_uses_camel_case() {
        let pointer = CelestiaPointer {
            height: 500,
            data_root: H256::repeat_byte(1),
            tx_hash: H256::repeat_byte(2),
            share_start: 3,
            share_len: 4,
        };
        let json = serde_json::to_value(pointer).unwrap();
        assert_eq!(json["height"], 500);
        assert_eq!(json["shareStart"], 3);
        assert_eq!(serde_json::from_value::<CelestiaPointer>(json).unwrap(), pointer);
    }

    #[test]
    fn out_of_bounds_ranges_are_errors() {
        let shares = vec![vec![0u8; 4]];
        let pointer = SharePointer {
            start_share: 0,
            ranges: vec![ShareRange { start: 2, end: 5 }],
        };
        assert_eq!(pointer.bytes(&shares), Err(RangeOutOfBounds { index: 0 }));
        let pointer = SharePointer::whole_share(1, 4);
        assert_eq!(pointer.bytes(&shares), Err(RangeOutOfBounds { index: 0 }));
    }
}
