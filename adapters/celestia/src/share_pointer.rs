//! Locating single L2 headers and transactions inside the shares of a published bundle.
//!
//! The bundle blob is reassembled into its flat payload, its RLP structure is walked to find
//! the item whose hash matches, and the item's flat `(offset, len)` is mapped back onto the
//! shares. Both mappings use [`share_data_start`](crate::shares::share_data_start) through
//! [`Share::data_offset`], so `SharePointer::bytes` always returns exactly the located item.
use ethers_core::utils::keccak256;
use ethers_core::utils::rlp::{self, DecoderError};
use lumen_rollup_interface::da::{ShareRange, SharePointer};
use lumen_rollup_interface::rollup::L2Header;
use lumen_rollup_interface::H256;
use thiserror::Error;

use crate::shares::{sequence_data, Share, ShareError, SHARE_SIZE};

#[derive(Debug, Error)]
pub enum SharePointerError {
    /// No header or transaction in the shares hashes to the target.
    #[error("no item with hash {0:?} in the shares")]
    NotFound(H256),
    #[error(transparent)]
    Share(#[from] ShareError),
    #[error("malformed rlp item at offset {offset}")]
    Malformed { offset: usize },
    #[error("undecodable block header at offset {offset}: {source}")]
    Header {
        offset: usize,
        #[source]
        source: DecoderError,
    },
    #[error("range {offset}+{len} lies outside the share payload")]
    OutOfRange { offset: usize, len: usize },
}

/// The span of one RLP item inside a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RlpItem {
    offset: usize,
    header_len: usize,
    payload_len: usize,
    is_list: bool,
}

// Items only come out of `read_item`, which checks that they end inside the stream.
impl RlpItem {
    fn len(&self) -> usize {
        self.header_len + self.payload_len
    }

    fn end(&self) -> usize {
        self.offset + self.len()
    }

    fn payload_offset(&self) -> usize {
        self.offset + self.header_len
    }

    fn raw<'a>(&self, stream: &'a [u8]) -> &'a [u8] {
        &stream[self.offset..self.end()]
    }
}

fn read_item(stream: &[u8], offset: usize) -> Result<RlpItem, SharePointerError> {
    let malformed = || SharePointerError::Malformed { offset };
    let prefix = *stream.get(offset).ok_or_else(malformed)?;

    let (header_len, payload_len, is_list) = match prefix {
        0x00..=0x7f => (0, 1, false),
        0x80..=0xb7 => (1, (prefix - 0x80) as usize, false),
        0xc0..=0xf7 => (1, (prefix - 0xc0) as usize, true),
        0xb8..=0xbf | 0xf8..=0xff => {
            let is_list = prefix >= 0xf8;
            let len_of_len = (prefix - if is_list { 0xf7 } else { 0xb7 }) as usize;
            let len_bytes = stream
                .get(offset + 1..offset + 1 + len_of_len)
                .ok_or_else(malformed)?;
            if len_of_len > std::mem::size_of::<usize>() {
                return Err(malformed());
            }
            let payload_len = len_bytes
                .iter()
                .fold(0usize, |acc, byte| (acc << 8) | *byte as usize);
            (1 + len_of_len, payload_len, is_list)
        }
    };

    let end = offset
        .checked_add(header_len)
        .and_then(|start| start.checked_add(payload_len))
        .ok_or_else(malformed)?;
    if end > stream.len() {
        return Err(malformed());
    }
    Ok(RlpItem {
        offset,
        header_len,
        payload_len,
        is_list,
    })
}

fn children(stream: &[u8], list: &RlpItem) -> Result<Vec<RlpItem>, SharePointerError> {
    if !list.is_list {
        return Err(SharePointerError::Malformed {
            offset: list.offset,
        });
    }
    let mut items = Vec::new();
    let mut cursor = list.payload_offset();
    while cursor < list.end() {
        let item = read_item(stream, cursor)?;
        if item.end() > list.end() {
            return Err(SharePointerError::Malformed { offset: cursor });
        }
        cursor = item.end();
        items.push(item);
    }
    Ok(items)
}

/// What to look for in a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// A block header, by its hash with extra data cleared.
    Header(H256),
    /// A transaction, by the hash of its envelope.
    Transaction(H256),
}

impl Target {
    fn hash(&self) -> H256 {
        match self {
            Target::Header(hash) | Target::Transaction(hash) => *hash,
        }
    }
}

/// Locates the RLP encoding of the header whose extra-data-cleared hash is `hash`.
pub fn find_header(shares: &[Share], hash: H256) -> Result<SharePointer, SharePointerError> {
    find(shares, Target::Header(hash))
}

/// Locates the envelope of the transaction with the given hash.
pub fn find_transaction(shares: &[Share], hash: H256) -> Result<SharePointer, SharePointerError> {
    find(shares, Target::Transaction(hash))
}

/// Locates `target` in the shares of a bundle blob.
pub fn find(shares: &[Share], target: Target) -> Result<SharePointer, SharePointerError> {
    let stream = sequence_data(shares)?;
    let (offset, len) = locate_in_stream(&stream, target)?;
    stream_range_to_pointer(shares, offset, len)
}

/// Finds the flat `(offset, len)` of `target` in a bundle payload. Every candidate is
/// re-hashed from its bytes; nothing is trusted by position.
fn locate_in_stream(stream: &[u8], target: Target) -> Result<(usize, usize), SharePointerError> {
    let bundle = read_item(stream, 0)?;
    for block in children(stream, &bundle)? {
        let fields = children(stream, &block)?;
        let (header, txs) = match fields.as_slice() {
            [header, txs, ..] => (header, txs),
            _ => {
                return Err(SharePointerError::Malformed {
                    offset: block.offset,
                })
            }
        };

        match target {
            Target::Header(hash) => {
                let decoded: L2Header =
                    rlp::decode(header.raw(stream)).map_err(|source| {
                        SharePointerError::Header {
                            offset: header.offset,
                            source,
                        }
                    })?;
                if decoded.hash_without_extra() == hash {
                    return Ok((header.offset, header.len()));
                }
            }
            Target::Transaction(hash) => {
                for tx in children(stream, txs)? {
                    // typed envelopes are embedded as strings, legacy ones as lists
                    let (offset, len) = if tx.is_list {
                        (tx.offset, tx.len())
                    } else {
                        (tx.payload_offset(), tx.payload_len)
                    };
                    if H256(keccak256(&stream[offset..offset + len])) == hash {
                        return Ok((offset, len));
                    }
                }
            }
        }
    }
    Err(SharePointerError::NotFound(target.hash()))
}

/// Maps a flat payload range onto per-share byte ranges.
pub fn stream_range_to_pointer(
    shares: &[Share],
    offset: usize,
    len: usize,
) -> Result<SharePointer, SharePointerError> {
    let out_of_range = || SharePointerError::OutOfRange { offset, len };
    if len == 0 {
        return Err(out_of_range());
    }

    let mut ranges = Vec::new();
    let mut start_share = None;
    // flat offset of the current share's first payload byte
    let mut share_stream_start = 0;
    let mut remaining = len;

    for (index, share) in shares.iter().enumerate() {
        let data_start = share.data_offset();
        let capacity = SHARE_SIZE - data_start;
        let share_stream_end = share_stream_start + capacity;

        if start_share.is_none() && offset < share_stream_end {
            start_share = Some(index);
        }
        if start_share.is_some() {
            let local = offset.saturating_sub(share_stream_start);
            let take = remaining.min(capacity - local);
            ranges.push(ShareRange {
                start: (data_start + local) as u64,
                end: (data_start + local + take) as u64,
            });
            remaining -= take;
            if remaining == 0 {
                break;
            }
        }
        share_stream_start = share_stream_end;
    }

    match start_share {
        Some(start_share) if remaining == 0 => Ok(SharePointer {
            start_share,
            ranges,
        }),
        _ => Err(out_of_range()),
    }
}

#[cfg(test)]
mod tests {
    use lumen_rollup_interface::da::Namespace;
    use lumen_rollup_interface::mocks::l2_chain;
    use lumen_rollup_interface::rollup::{Bundle, L2Block};
    use proptest::prelude::*;

    use super::*;
    use crate::shares::split_blob;

    fn shares_of(bundle: &Bundle) -> Vec<Share> {
        split_blob(&bundle.blob(Namespace::new_v0(b"lumen")))
    }

    #[test]
    fn finds_every_header() {
        let bundle = Bundle::new(l2_chain(100, 6, 5)).unwrap();
        let shares = shares_of(&bundle);
        assert!(shares.len() > 2, "the bundle should span several shares");

        for block in bundle.blocks() {
            let target = block.header.hash_without_extra();
            let pointer = find_header(&shares, target).unwrap();
            let bytes = pointer.bytes(&shares).unwrap();
            let decoded: L2Header = rlp::decode(&bytes).unwrap();
            assert_eq!(decoded, block.header);
            assert_eq!(decoded.hash_without_extra(), target);
        }
    }

    #[test]
    fn finds_legacy_and_typed_transactions() {
        let bundle = Bundle::new(l2_chain(1, 4, 6)).unwrap();
        let shares = shares_of(&bundle);

        for tx in bundle.blocks().iter().flat_map(|b| &b.transactions) {
            let hash = H256(keccak256(tx));
            let pointer = find_transaction(&shares, hash).unwrap();
            assert_eq!(pointer.bytes(&shares).unwrap(), tx.to_vec());
        }
    }

    #[test]
    fn ranges_skip_share_headers() {
        let bundle = Bundle::new(l2_chain(1, 8, 8)).unwrap();
        let shares = shares_of(&bundle);
        let tx = &bundle.blocks()[7].transactions[7];
        let pointer = find_transaction(&shares, H256(keccak256(tx))).unwrap();

        for (i, range) in pointer.ranges.iter().enumerate() {
            let share = &shares[pointer.start_share + i];
            assert!(range.start as usize >= share.data_offset());
            assert!(range.end as usize <= SHARE_SIZE);
            if i > 0 {
                assert_eq!(range.start as usize, share.data_offset());
            }
        }
    }

    #[test]
    fn missing_items_are_not_found() {
        let shares = shares_of(&Bundle::new(l2_chain(1, 2, 2)).unwrap());
        let other = l2_chain(50, 1, 0).remove(0).header.hash_without_extra();
        assert!(matches!(
            find_header(&shares, other),
            Err(SharePointerError::NotFound(hash)) if hash == other
        ));
        assert!(matches!(
            find_transaction(&shares, H256::repeat_byte(1)),
            Err(SharePointerError::NotFound(_))
        ));
    }

    #[test]
    fn out_of_range_lookups_fail() {
        let shares = shares_of(&Bundle::new(l2_chain(1, 1, 1)).unwrap());
        assert!(stream_range_to_pointer(&shares, 0, 0).is_err());
        assert!(stream_range_to_pointer(&shares, 0, SHARE_SIZE * 4).is_err());
    }

    #[test]
    fn garbage_payloads_are_rejected() {
        let blob = lumen_rollup_interface::da::Blob {
            namespace: Namespace::new_v0(b"lumen"),
            data: vec![0xf9, 0xff, 0xff, 0x01],
        };
        let shares = split_blob(&blob);
        assert!(matches!(
            find_header(&shares, H256::zero()),
            Err(SharePointerError::Malformed { offset: 0 })
        ));
    }

    #[test]
    fn oversized_length_prefixes_are_rejected() {
        let namespace = Namespace::new_v0(b"lumen");
        let mut top_level = vec![0xbf];
        top_level.extend([0xff; 8]);
        // a list holding one string whose length prefix claims the whole address space
        let mut nested = vec![0xc9, 0xbf];
        nested.extend([0xff; 8]);

        for data in [top_level, nested] {
            let shares = split_blob(&lumen_rollup_interface::da::Blob {
                namespace,
                data,
            });
            assert!(matches!(
                find_header(&shares, H256::zero()),
                Err(SharePointerError::Malformed { .. })
            ));
            assert!(matches!(
                find_transaction(&shares, H256::zero()),
                Err(SharePointerError::Malformed { .. })
            ));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]
        #[test]
        fn header_lookups_round_trip(blocks in 2u64..8, txs in 0usize..12, pick in any::<prop::sample::Index>()) {
            let bundle = Bundle::new(l2_chain(1_000, blocks, txs)).unwrap();
            let shares = shares_of(&bundle);
            let block: &L2Block = pick.get(bundle.blocks());
            let target = block.header.hash_without_extra();

            let pointer = find_header(&shares, target).unwrap();
            let bytes = pointer.bytes(&shares).unwrap();
            let decoded: L2Header = rlp::decode(&bytes).unwrap();
            prop_assert_eq!(decoded.hash_without_extra(), target);
        }
    }
}
