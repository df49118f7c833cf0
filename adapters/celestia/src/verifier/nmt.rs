//! Namespaced merkle trees over the rows of a data square, backed by `nmt_rs`.
use lumen_rollup_interface::da::{
    Namespace, NamespaceMerkleMultiproof, NamespaceNode, NAMESPACE_SIZE,
};
use lumen_rollup_interface::H256;
use nmt_rs::simple_merkle::proof::Proof;
use nmt_rs::{
    CelestiaNmt, NamespaceId, NamespaceMerkleHasher, NamespaceProof, NamespacedHash,
    NamespacedSha2Hasher,
};

/// Range proof over one row.
pub type RowProof = NamespaceProof<NamespacedSha2Hasher<NAMESPACE_SIZE>, NAMESPACE_SIZE>;

pub fn namespace_id(namespace: Namespace) -> NamespaceId<NAMESPACE_SIZE> {
    NamespaceId(namespace.to_bytes())
}

pub fn to_namespaced_hash(node: &NamespaceNode) -> NamespacedHash<NAMESPACE_SIZE> {
    NamespacedHash::new(namespace_id(node.min), namespace_id(node.max), node.digest.0)
}

pub fn from_namespaced_hash(hash: &NamespacedHash<NAMESPACE_SIZE>) -> Option<NamespaceNode> {
    Some(NamespaceNode {
        min: Namespace::from_bytes(&hash.min_namespace().0).ok()?,
        max: Namespace::from_bytes(&hash.max_namespace().0).ok()?,
        digest: H256(hash.hash()),
    })
}

/// Converts a wire multiproof into the presence proof `nmt_rs` verifies.
pub fn to_row_proof(proof: &NamespaceMerkleMultiproof) -> Option<RowProof> {
    let start = u32::try_from(proof.begin_key).ok()?;
    let end = u32::try_from(proof.end_key).ok()?;
    if start >= end {
        return None;
    }
    Some(NamespaceProof::PresenceProof {
        proof: Proof {
            siblings: proof.side_nodes.iter().map(to_namespaced_hash).collect(),
            range: start..end,
        },
        ignore_max_ns: true,
    })
}

/// Builds the tree of one row from its shares, which must be sorted by namespace.
pub fn row_tree<'a>(shares: impl IntoIterator<Item = (Namespace, &'a [u8])>) -> Option<CelestiaNmt> {
    let mut tree = CelestiaNmt::with_hasher(NamespacedSha2Hasher::with_ignore_max_ns(true));
    for (namespace, share) in shares {
        tree.push_leaf(share, namespace_id(namespace)).ok()?;
    }
    Some(tree)
}

pub fn row_root(tree: &mut CelestiaNmt) -> Option<NamespaceNode> {
    from_namespaced_hash(&tree.root())
}

/// Builds a range proof for leaves `[start, end)` of a row.
pub fn prove_range(tree: &mut CelestiaNmt, start: usize, end: usize) -> Option<NamespaceMerkleMultiproof> {
    if start >= end {
        return None;
    }
    let (_, proof) = tree.get_range_with_proof(start..end);
    let side_nodes = proof
        .siblings()
        .iter()
        .map(from_namespaced_hash)
        .collect::<Option<Vec<_>>>()?;
    Some(NamespaceMerkleMultiproof {
        begin_key: start as u64,
        end_key: end as u64,
        side_nodes,
    })
}

/// Verifies that `shares` are the leaves `[begin_key, end_key)` of the row with the given root.
pub fn verify_range(
    root: &NamespaceNode,
    proof: &NamespaceMerkleMultiproof,
    namespace: Namespace,
    shares: &[impl AsRef<[u8]>],
) -> bool {
    let Some(row_proof) = to_row_proof(proof) else {
        return false;
    };
    if (proof.end_key - proof.begin_key) as usize != shares.len() {
        return false;
    }
    row_proof
        .verify_range(&to_namespaced_hash(root), shares, namespace_id(namespace))
        .is_ok()
}
