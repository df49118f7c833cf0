//! Deterministic L2 fixtures for tests.
use ethers_core::types::{Address, Bloom, Bytes, H256, H64, U256};
use ethers_core::utils::rlp::RlpStream;

use crate::rollup::{L2Block, L2Header, RollupHeader};

const GWEI: u64 = 1_000_000_000;

/// A legacy transaction envelope whose calldata is `data_len` bytes long.
pub fn legacy_tx(nonce: u64, data_len: usize) -> Bytes {
    let mut s = RlpStream::new_list(9);
    s.append(&nonce);
    s.append(&GWEI);
    s.append(&21_000u64);
    s.append(&Address::repeat_byte(0x11));
    s.append(&U256::from(nonce + 1));
    s.append(&vec![0xab_u8; data_len]);
    s.append(&27u64);
    s.append(&U256::from(nonce + 0x1000));
    s.append(&U256::from(nonce + 0x2000));
    Bytes::from(s.out().to_vec())
}

/// An EIP-1559 transaction envelope whose calldata is `data_len` bytes long.
pub fn typed_tx(nonce: u64, data_len: usize) -> Bytes {
    let mut s = RlpStream::new_list(12);
    s.append(&1891u64);
    s.append(&nonce);
    s.append(&GWEI);
    s.append(&(2 * GWEI));
    s.append(&50_000u64);
    s.append(&Address::repeat_byte(0x22));
    s.append(&U256::from(nonce));
    s.append(&vec![0xcd_u8; data_len]);
    s.begin_list(0);
    s.append(&1u64);
    s.append(&U256::from(nonce + 0x3000));
    s.append(&U256::from(nonce + 0x4000));
    let mut envelope = vec![0x02];
    envelope.extend_from_slice(&s.out());
    Bytes::from(envelope)
}

/// `count` linked blocks starting at height `first`, each with `txs_per_block` transactions
/// alternating between legacy and typed envelopes.
pub fn l2_chain(first: u64, count: u64, txs_per_block: usize) -> Vec<L2Block> {
    let mut parent_hash = H256::from_low_u64_be(first.wrapping_sub(1)) ^ H256::repeat_byte(0x5a);
    (first..first + count)
        .map(|number| {
            let transactions: Vec<Bytes> = (0..txs_per_block)
                .map(|j| {
                    let nonce = number * 1_000 + j as u64;
                    let data_len = 16 + 37 * j;
                    if j % 2 == 0 {
                        legacy_tx(nonce, data_len)
                    } else {
                        typed_tx(nonce, data_len)
                    }
                })
                .collect();
            let header = L2Header {
                parent_hash,
                uncles_hash: H256::repeat_byte(0x1d),
                coinbase: Address::repeat_byte(0x33),
                state_root: H256::from_low_u64_be(number.wrapping_mul(7) + 1),
                transactions_root: H256::from_low_u64_be(number),
                receipts_root: H256::from_low_u64_be(number + 3),
                logs_bloom: Bloom::zero(),
                difficulty: U256::from(2),
                number,
                gas_limit: 30_000_000,
                gas_used: 21_000 * txs_per_block as u64,
                timestamp: 1_700_000_000 + 2 * number,
                extra_data: Bytes::from(vec![0x42; 32 + (number % 5) as usize]),
                mix_hash: H256::zero(),
                nonce: H64::zero(),
                base_fee_per_gas: Some(U256::from(7 * GWEI)),
                withdrawals_root: None,
                blob_gas_used: None,
                excess_blob_gas: None,
                parent_beacon_block_root: None,
            };
            let block = L2Block {
                header,
                transactions,
            };
            parent_hash = block.hash();
            block
        })
        .collect()
}

/// A genesis rollup header covering the L2 chain up to `l2_height`.
pub fn rollup_genesis(l2_height: u64) -> RollupHeader {
    RollupHeader {
        l2_height,
        ..Default::default()
    }
}
