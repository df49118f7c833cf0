//! The slice of the L2 chain's block format that Lumen needs: enough to hash headers and
//! transactions, check parent linkage, and reproduce the chain's RLP encoding byte for byte.
use ethers_core::types::{Address, Bloom, Bytes, H256, H64, U256};
use ethers_core::utils::keccak256;
use ethers_core::utils::rlp::{self, Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

/// Number of RLP fields in a header without any of the optional trailing fields.
const BASE_HEADER_FIELDS: usize = 15;
/// Number of optional trailing fields, one group per fork from London to Cancun.
const OPTIONAL_HEADER_FIELDS: usize = 5;

/// An L2 block header, in the field order used by the chain's RLP encoding.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L2Header {
    pub parent_hash: H256,
    pub uncles_hash: H256,
    pub coinbase: Address,
    pub state_root: H256,
    pub transactions_root: H256,
    pub receipts_root: H256,
    pub logs_bloom: Bloom,
    pub difficulty: U256,
    pub number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: Bytes,
    pub mix_hash: H256,
    pub nonce: H64,
    /// Present from the London fork onwards.
    pub base_fee_per_gas: Option<U256>,
    /// Present from the Shanghai fork onwards.
    pub withdrawals_root: Option<H256>,
    /// Present from the Cancun fork onwards.
    pub blob_gas_used: Option<u64>,
    /// Present from the Cancun fork onwards.
    pub excess_blob_gas: Option<u64>,
    /// Present from the Cancun fork onwards.
    pub parent_beacon_block_root: Option<H256>,
}

impl L2Header {
    /// The block hash: keccak-256 of the RLP encoded header.
    pub fn hash(&self) -> H256 {
        H256(keccak256(rlp::encode(self)))
    }

    /// Hash of the header with its extra data cleared.
    ///
    /// Extra data carries mutable metadata (such as sequencer seals) and is not
    /// part of the structural commitment, so share lookups match on this hash.
    pub fn hash_without_extra(&self) -> H256 {
        let mut header = self.clone();
        header.extra_data = Bytes::new();
        header.hash()
    }

    fn optional_present(&self) -> [bool; OPTIONAL_HEADER_FIELDS] {
        [
            self.base_fee_per_gas.is_some(),
            self.withdrawals_root.is_some(),
            self.blob_gas_used.is_some(),
            self.excess_blob_gas.is_some(),
            self.parent_beacon_block_root.is_some(),
        ]
    }

    /// Number of optional trailing fields the header carries, or `None` if a field is set
    /// while an earlier one is not. Every fork extends the previous fork's fields, so such
    /// a header has no encoding on the chain.
    pub fn trailing_fields(&self) -> Option<usize> {
        let present = self.optional_present();
        let count = present.iter().take_while(|set| **set).count();
        present[count..].iter().all(|set| !set).then_some(count)
    }

    /// Whether the optional fields form an unbroken prefix, see [`L2Header::trailing_fields`].
    pub fn is_well_formed(&self) -> bool {
        self.trailing_fields().is_some()
    }
}

/// Headers that are not [well formed](L2Header::is_well_formed) encode every optional field
/// up to the last one set, writing zero for the unset ones. They do not decode back to the
/// same value; bundles refuse them.
impl Encodable for L2Header {
    fn rlp_append(&self, s: &mut RlpStream) {
        let optional = self
            .optional_present()
            .iter()
            .rposition(|set| *set)
            .map_or(0, |last| last + 1);
        s.begin_list(BASE_HEADER_FIELDS + optional);
        s.append(&self.parent_hash);
        s.append(&self.uncles_hash);
        s.append(&self.coinbase);
        s.append(&self.state_root);
        s.append(&self.transactions_root);
        s.append(&self.receipts_root);
        s.append(&self.logs_bloom);
        s.append(&self.difficulty);
        s.append(&self.number);
        s.append(&self.gas_limit);
        s.append(&self.gas_used);
        s.append(&self.timestamp);
        s.append(&self.extra_data.to_vec());
        s.append(&self.mix_hash);
        s.append(&self.nonce);
        if optional > 0 {
            s.append(&self.base_fee_per_gas.unwrap_or_default());
        }
        if optional > 1 {
            s.append(&self.withdrawals_root.unwrap_or_default());
        }
        if optional > 2 {
            s.append(&self.blob_gas_used.unwrap_or_default());
        }
        if optional > 3 {
            s.append(&self.excess_blob_gas.unwrap_or_default());
        }
        if optional > 4 {
            s.append(&self.parent_beacon_block_root.unwrap_or_default());
        }
    }
}

fn optional_at<T: Decodable>(rlp: &Rlp, fields: usize, index: usize) -> Result<Option<T>, DecoderError> {
    if index < fields {
        rlp.val_at(index).map(Some)
    } else {
        Ok(None)
    }
}

impl Decodable for L2Header {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let fields = rlp.item_count()?;
        if !(BASE_HEADER_FIELDS..=BASE_HEADER_FIELDS + OPTIONAL_HEADER_FIELDS).contains(&fields) {
            return Err(DecoderError::RlpIncorrectListLen);
        }

        Ok(Self {
            parent_hash: rlp.val_at(0)?,
            uncles_hash: rlp.val_at(1)?,
            coinbase: rlp.val_at(2)?,
            state_root: rlp.val_at(3)?,
            transactions_root: rlp.val_at(4)?,
            receipts_root: rlp.val_at(5)?,
            logs_bloom: rlp.val_at(6)?,
            difficulty: rlp.val_at(7)?,
            number: rlp.val_at(8)?,
            gas_limit: rlp.val_at(9)?,
            gas_used: rlp.val_at(10)?,
            timestamp: rlp.val_at(11)?,
            extra_data: Bytes::from(rlp.val_at::<Vec<u8>>(12)?),
            mix_hash: rlp.val_at(13)?,
            nonce: rlp.val_at(14)?,
            base_fee_per_gas: optional_at(rlp, fields, 15)?,
            withdrawals_root: optional_at(rlp, fields, 16)?,
            blob_gas_used: optional_at(rlp, fields, 17)?,
            excess_blob_gas: optional_at(rlp, fields, 18)?,
            parent_beacon_block_root: optional_at(rlp, fields, 19)?,
        })
    }
}

/// Returns true if `envelope` is a legacy transaction, i.e. a bare RLP list.
///
/// Typed transactions (EIP-2718) start with a type byte below `0x7f` and are embedded
/// in a block body as RLP strings.
pub fn is_legacy_envelope(envelope: &[u8]) -> bool {
    envelope.first().map_or(false, |first| *first >= 0xc0)
}

/// An L2 block: a header plus the canonical envelopes of its transactions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct L2Block {
    pub header: L2Header,
    pub transactions: Vec<Bytes>,
}

impl L2Block {
    /// The block hash.
    pub fn hash(&self) -> H256 {
        self.header.hash()
    }

    /// The block height.
    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// Hashes of the block's transactions, in block order.
    pub fn tx_hashes(&self) -> impl Iterator<Item = H256> + '_ {
        self.transactions.iter().map(|tx| H256(keccak256(tx)))
    }
}

impl Encodable for L2Block {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.header);
        s.begin_list(self.transactions.len());
        for tx in &self.transactions {
            if is_legacy_envelope(tx) {
                s.append_raw(tx, 1);
            } else {
                s.append(&tx.to_vec());
            }
        }
        // uncles
        s.begin_list(0);
    }
}

impl Decodable for L2Block {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? < 2 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let header = rlp.val_at(0)?;
        let transactions = rlp
            .at(1)?
            .iter()
            .map(|item| tx_envelope(&item))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            header,
            transactions,
        })
    }
}

fn tx_envelope(item: &Rlp) -> Result<Bytes, DecoderError> {
    if item.is_list() {
        Ok(Bytes::from(item.as_raw().to_vec()))
    } else {
        Ok(Bytes::from(item.data()?.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{l2_chain, legacy_tx, typed_tx};

    #[test]
    fn header_round_trips_with_optional_fields() {
        let mut header = l2_chain(7, 1, 0).remove(0).header;
        header.base_fee_per_gas = None;
        assert_eq!(header.trailing_fields(), Some(0));
        let decoded: L2Header = rlp::decode(&rlp::encode(&header)).unwrap();
        assert_eq!(decoded, header);

        header.base_fee_per_gas = Some(U256::from(7u64));
        header.withdrawals_root = Some(H256::repeat_byte(3));
        header.blob_gas_used = Some(131_072);
        header.excess_blob_gas = Some(0);
        header.parent_beacon_block_root = Some(H256::repeat_byte(4));
        assert_eq!(header.trailing_fields(), Some(5));
        let decoded: L2Header = rlp::decode(&rlp::encode(&header)).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.hash(), header.hash());
    }

    #[test]
    fn gaps_in_fork_fields_are_not_well_formed() {
        let mut header = l2_chain(7, 1, 0).remove(0).header;
        header.base_fee_per_gas = None;
        header.withdrawals_root = Some(H256::repeat_byte(3));
        assert_eq!(header.trailing_fields(), None);
        assert!(!header.is_well_formed());

        // the gap is filled with zero, so the header does not survive a round trip
        let decoded: L2Header = rlp::decode(&rlp::encode(&header)).unwrap();
        assert_eq!(decoded.base_fee_per_gas, Some(U256::zero()));
        assert_ne!(decoded, header);
    }

    #[test]
    fn extra_data_does_not_affect_structural_hash() {
        let mut header = l2_chain(1, 1, 0).remove(0).header;
        let structural = header.hash_without_extra();
        let full = header.hash();
        header.extra_data = Bytes::from(vec![0xaa; 97]);
        assert_eq!(header.hash_without_extra(), structural);
        assert_ne!(header.hash(), full);
    }

    #[test]
    fn block_keeps_both_envelope_kinds() {
        let mut block = l2_chain(1, 1, 0).remove(0);
        block.transactions = vec![legacy_tx(1, 40), typed_tx(2, 40)];
        let encoded = rlp::encode(&block);
        let decoded: L2Block = rlp::decode(&encoded).unwrap();
        assert_eq!(decoded, block);
        assert!(is_legacy_envelope(&decoded.transactions[0]));
        assert!(!is_legacy_envelope(&decoded.transactions[1]));
    }
}
