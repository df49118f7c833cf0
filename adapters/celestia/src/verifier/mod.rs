//! Verification of shares proofs, mirroring the checks the challenge contract performs.
use lumen_rollup_interface::da::{AttestationProof, SharesProof};
use lumen_rollup_interface::H256;
use thiserror::Error;

use crate::shares::SHARE_SIZE;

pub mod binary_merkle;
pub mod nmt;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("the proof carries no shares")]
    NoShares,
    #[error("expected {expected} {what}, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("share {index} is malformed")]
    InvalidShare { index: usize },
    #[error("data root tuple for height {height} is not part of commitment {commitment:?}")]
    InvalidAttestation { height: u64, commitment: H256 },
    #[error("row root {index} is not part of data root {data_root:?}")]
    InvalidRowProof { index: usize, data_root: H256 },
    #[error("shares of row {index} do not match its row root")]
    InvalidShareProof { index: usize },
}

/// Checks that the attested data root tuple is a leaf of the Blobstream commitment.
pub fn verify_attestation(
    proof: &AttestationProof,
    data_commitment: H256,
) -> Result<(), ValidationError> {
    let leaf = proof.tuple.abi_encode();
    if binary_merkle::verify(&proof.proof, &data_commitment, &leaf) {
        Ok(())
    } else {
        Err(ValidationError::InvalidAttestation {
            height: proof.tuple.height,
            commitment: data_commitment,
        })
    }
}

fn check_shape(what: &'static str, expected: usize, found: usize) -> Result<(), ValidationError> {
    if expected == found {
        Ok(())
    } else {
        Err(ValidationError::ShapeMismatch {
            what,
            expected,
            found,
        })
    }
}

/// Checks the shares against their row roots and the row roots against the attested data root.
pub fn verify_shares(proof: &SharesProof) -> Result<(), ValidationError> {
    if proof.data.is_empty() {
        return Err(ValidationError::NoShares);
    }
    check_shape("row roots", proof.share_proofs.len(), proof.row_roots.len())?;
    check_shape("row proofs", proof.row_roots.len(), proof.row_proofs.len())?;
    let covered = proof
        .share_proofs
        .iter()
        .map(|p| p.end_key.saturating_sub(p.begin_key) as usize)
        .sum::<usize>();
    check_shape("shares", covered, proof.data.len())?;

    let namespace = proof.namespace.to_bytes();
    for (index, share) in proof.data.iter().enumerate() {
        if share.len() != SHARE_SIZE || share[..namespace.len()] != namespace {
            return Err(ValidationError::InvalidShare { index });
        }
    }

    let data_root = proof.attestation_proof.tuple.data_root;
    for (index, (row_root, row_proof)) in proof.row_roots.iter().zip(&proof.row_proofs).enumerate() {
        if !binary_merkle::verify(row_proof, &data_root, &row_root.to_bytes()) {
            return Err(ValidationError::InvalidRowProof { index, data_root });
        }
    }

    let mut remaining = proof.data.as_slice();
    for (index, (share_proof, row_root)) in proof.share_proofs.iter().zip(&proof.row_roots).enumerate() {
        let count = share_proof.end_key.saturating_sub(share_proof.begin_key) as usize;
        let (row_shares, rest) = remaining.split_at(count);
        remaining = rest;
        if !nmt::verify_range(row_root, share_proof, proof.namespace, row_shares) {
            return Err(ValidationError::InvalidShareProof { index });
        }
    }
    Ok(())
}

/// Full verification of a shares proof against a Blobstream data commitment.
pub fn verify_shares_proof(proof: &SharesProof, data_commitment: H256) -> Result<(), ValidationError> {
    verify_attestation(&proof.attestation_proof, data_commitment)?;
    verify_shares(proof)
}

#[cfg(test)]
mod tests {
    use lumen_rollup_interface::da::{
        Blob, BinaryMerkleProof, DataRootTuple, Namespace, NamespaceNode, PAY_FOR_BLOB_NAMESPACE,
        TAIL_PADDING_NAMESPACE,
    };
    use lumen_rollup_interface::Bytes;

    use super::*;
    use crate::shares::split_blob;

    const WIDTH: usize = 4;

    fn filler(namespace: Namespace) -> (Namespace, Vec<u8>) {
        let mut share = namespace.to_bytes().to_vec();
        share.resize(SHARE_SIZE, 0);
        (namespace, share)
    }

    /// A two-row square holding a three share blob at indexes 2..5, attested at height 42
    /// in a commitment over heights 40..44.
    fn proof_for_blob() -> (SharesProof, H256) {
        let namespace = Namespace::new_v0(b"lumen");
        let blob = split_blob(&Blob {
            namespace,
            data: vec![7; 1200],
        });
        let mut square = vec![filler(PAY_FOR_BLOB_NAMESPACE), filler(PAY_FOR_BLOB_NAMESPACE)];
        square.extend(blob.iter().map(|s| (namespace, s.raw().to_vec())));
        square.push(filler(TAIL_PADDING_NAMESPACE));

        let mut rows: Vec<_> = square
            .chunks(WIDTH)
            .map(|row| nmt::row_tree(row.iter().map(|(ns, s)| (*ns, s.as_slice()))).unwrap())
            .collect();
        let row_roots: Vec<NamespaceNode> =
            rows.iter_mut().map(|tree| nmt::row_root(tree).unwrap()).collect();
        let row_leaves: Vec<[u8; 90]> = row_roots.iter().map(NamespaceNode::to_bytes).collect();
        let data_root = binary_merkle::root(&row_leaves);

        let tuples: Vec<Vec<u8>> = (40..44)
            .map(|height| {
                let data_root = if height == 42 { data_root } else { H256::repeat_byte(height as u8) };
                DataRootTuple { height, data_root }.abi_encode()
            })
            .collect();
        let commitment = binary_merkle::root(&tuples);

        let proof = SharesProof {
            data: blob.iter().map(|s| Bytes::from(s.raw().to_vec())).collect(),
            share_proofs: vec![
                nmt::prove_range(&mut rows[0], 2, 4).unwrap(),
                nmt::prove_range(&mut rows[1], 0, 1).unwrap(),
            ],
            namespace,
            row_roots: row_roots.clone(),
            row_proofs: vec![
                binary_merkle::prove(&row_leaves, 0).unwrap(),
                binary_merkle::prove(&row_leaves, 1).unwrap(),
            ],
            attestation_proof: AttestationProof {
                tuple_root_nonce: 3,
                tuple: DataRootTuple { height: 42, data_root },
                proof: binary_merkle::prove(&tuples, 2).unwrap(),
            },
        };
        (proof, commitment)
    }

    #[test]
    fn valid_proof_verifies() {
        let (proof, commitment) = proof_for_blob();
        assert_eq!(verify_shares_proof(&proof, commitment), Ok(()));
    }

    #[test]
    fn wrong_commitment_is_rejected() {
        let (proof, _) = proof_for_blob();
        assert!(matches!(
            verify_shares_proof(&proof, H256::repeat_byte(1)),
            Err(ValidationError::InvalidAttestation { height: 42, .. })
        ));
    }

    #[test]
    fn tampered_parts_are_rejected() {
        let (proof, commitment) = proof_for_blob();

        let mut bad = proof.clone();
        let mut share = bad.data[1].to_vec();
        share[200] ^= 0xff;
        bad.data[1] = Bytes::from(share);
        assert_eq!(
            verify_shares_proof(&bad, commitment),
            Err(ValidationError::InvalidShareProof { index: 0 })
        );

        let mut bad = proof.clone();
        bad.row_proofs[1] = BinaryMerkleProof::default();
        assert!(matches!(
            verify_shares_proof(&bad, commitment),
            Err(ValidationError::InvalidRowProof { index: 1, .. })
        ));

        let mut bad = proof.clone();
        bad.row_roots.pop();
        assert!(matches!(
            verify_shares_proof(&bad, commitment),
            Err(ValidationError::ShapeMismatch { .. })
        ));

        let mut bad = proof;
        bad.data.clear();
        assert_eq!(verify_shares(&bad), Err(ValidationError::NoShares));
    }
}
