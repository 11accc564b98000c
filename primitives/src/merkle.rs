//! Merkle root and membership proofs over a block's transaction set.
//!
//! Leaves are the transaction hashes ordered by `(timestamp, hash)`
//! ascending, so the root depends only on the set of transactions and never
//! on map insertion order. Pairs are hashed left to right with
//! [`hash_pair`]; an odd trailing node is promoted to the next level
//! unchanged. A single leaf is its own root. An empty set has no root: it
//! yields `None`, the empty sentinel.

use std::collections::BTreeMap;

use crate::crypto::hash_pair;
use crate::error::{ChainError, ChainResult};
use crate::transaction::Transaction;
use crate::types::Hash;

/// Membership proof for a single transaction hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    /// The proven leaf (transaction hash).
    pub leaf: Hash,
    /// Sibling hashes along the path from leaf to root.
    pub siblings: Vec<Hash>,
    /// `true` when our node is the left child at that level.
    pub path_bits: Vec<bool>,
}

impl MerkleProof {
    /// Check the proof against a Merkle root.
    pub fn verify(&self, root: &Hash) -> bool {
        if self.siblings.len() != self.path_bits.len() {
            return false;
        }
        let mut current = self.leaf;
        for (sibling, is_left) in self.siblings.iter().zip(self.path_bits.iter()) {
            current = if *is_left {
                hash_pair(&current, sibling)
            } else {
                hash_pair(sibling, &current)
            };
        }
        current == *root
    }
}

/// Transaction hashes in Merkle leaf order.
///
/// Fails if a map key does not match the hash of the transaction stored
/// under it.
pub fn ordered_leaves(transactions: &BTreeMap<Hash, Transaction>) -> ChainResult<Vec<Hash>> {
    let mut keyed = Vec::with_capacity(transactions.len());
    for (key, tx) in transactions {
        if *key != tx.hash() {
            return Err(ChainError::MerkleError(
                "transaction map key does not match transaction hash".into(),
            ));
        }
        keyed.push(tx.ordering_key());
    }
    keyed.sort_unstable();
    Ok(keyed.into_iter().map(|(_, hash)| hash).collect())
}

/// Compute the Merkle root of a transaction set.
///
/// Returns `Ok(None)` for an empty set.
pub fn merkle_root(transactions: &BTreeMap<Hash, Transaction>) -> ChainResult<Option<Hash>> {
    let leaves = ordered_leaves(transactions)?;
    Ok(compute_root_from_leaves(&leaves))
}

/// Build a membership proof for `tx_hash`, or `Ok(None)` if it is not in
/// the set.
pub fn prove(
    transactions: &BTreeMap<Hash, Transaction>,
    tx_hash: &Hash,
) -> ChainResult<Option<MerkleProof>> {
    let leaves = ordered_leaves(transactions)?;
    let Some(index) = leaves.iter().position(|leaf| leaf == tx_hash) else {
        return Ok(None);
    };
    let (siblings, path_bits) = compute_proof_path(&leaves, index);
    Ok(Some(MerkleProof {
        leaf: *tx_hash,
        siblings,
        path_bits,
    }))
}

/// Reduce a leaf sequence to its root.
pub fn compute_root_from_leaves(leaves: &[Hash]) -> Option<Hash> {
    match leaves {
        [] => None,
        [only] => Some(*only),
        _ => {
            let mut current_level = leaves.to_vec();
            while current_level.len() > 1 {
                current_level = next_level(&current_level);
            }
            Some(current_level[0])
        }
    }
}

fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_pair(left, right),
            [odd] => *odd,
            _ => unreachable!("chunks(2) yields one or two elements"),
        })
        .collect()
}

fn compute_proof_path(leaves: &[Hash], index: usize) -> (Vec<Hash>, Vec<bool>) {
    let mut siblings = Vec::new();
    let mut path_bits = Vec::new();
    let mut current_level = leaves.to_vec();
    let mut idx = index;

    while current_level.len() > 1 {
        let is_left = idx % 2 == 0;
        let sibling_idx = if is_left { idx + 1 } else { idx - 1 };

        // promoted odd node has no sibling at this level
        if sibling_idx < current_level.len() {
            siblings.push(current_level[sibling_idx]);
            path_bits.push(is_left);
        }

        current_level = next_level(&current_level);
        idx /= 2;
    }

    (siblings, path_bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::double_hash;
    use crate::types::PROTOCOL_VERSION;

    fn tx(ts: i64, payload: &[u8]) -> Transaction {
        Transaction::new(ts, payload.to_vec(), PROTOCOL_VERSION, None, 4096).unwrap()
    }

    fn map_of(txs: &[Transaction]) -> BTreeMap<Hash, Transaction> {
        txs.iter().map(|t| (t.hash(), t.clone())).collect()
    }

    #[test]
    fn test_empty_set_is_sentinel() {
        assert_eq!(merkle_root(&BTreeMap::new()).unwrap(), None);
    }

    #[test]
    fn test_single_leaf_is_root() {
        let t = tx(1, b"only");
        assert_eq!(merkle_root(&map_of(&[t.clone()])).unwrap(), Some(t.hash()));
    }

    #[test]
    fn test_two_leaves_in_timestamp_order() {
        let later = tx(20, b"later");
        let earlier = tx(10, b"earlier");
        let root = merkle_root(&map_of(&[later.clone(), earlier.clone()])).unwrap();
        assert_eq!(root, Some(hash_pair(&earlier.hash(), &later.hash())));
    }

    #[test]
    fn test_odd_leaf_promoted() {
        let a = double_hash(b"a");
        let b = double_hash(b"b");
        let c = double_hash(b"c");
        let root = compute_root_from_leaves(&[a, b, c]).unwrap();
        assert_eq!(root, hash_pair(&hash_pair(&a, &b), &c));
    }

    #[test]
    fn test_insertion_order_independence() {
        let txs: Vec<Transaction> = (0..17).map(|i| tx(i, format!("tx{i}").as_bytes())).collect();
        let mut reversed = txs.clone();
        reversed.reverse();

        let mut m1 = BTreeMap::new();
        for t in &txs {
            m1.insert(t.hash(), t.clone());
        }
        let mut m2 = BTreeMap::new();
        for t in &reversed {
            m2.insert(t.hash(), t.clone());
        }
        assert_eq!(merkle_root(&m1).unwrap(), merkle_root(&m2).unwrap());
    }

    #[test]
    fn test_equal_timestamps_break_ties_by_hash() {
        let a = tx(7, b"alpha");
        let b = tx(7, b"beta");
        let (lo, hi) = if a.hash() < b.hash() { (&a, &b) } else { (&b, &a) };
        let root = merkle_root(&map_of(&[a.clone(), b.clone()])).unwrap();
        assert_eq!(root, Some(hash_pair(&lo.hash(), &hi.hash())));
    }

    #[test]
    fn test_mismatched_key_rejected() {
        let t = tx(1, b"x");
        let mut m = BTreeMap::new();
        m.insert([0u8; 20], t);
        assert!(matches!(merkle_root(&m), Err(ChainError::MerkleError(_))));
    }

    #[test]
    fn test_proof_and_verify() {
        let txs: Vec<Transaction> = (0..5).map(|i| tx(i, format!("p{i}").as_bytes())).collect();
        let m = map_of(&txs);
        let root = merkle_root(&m).unwrap().unwrap();

        for t in &txs {
            let proof = prove(&m, &t.hash()).unwrap().unwrap();
            assert!(proof.verify(&root));
        }

        let mut forged = prove(&m, &txs[2].hash()).unwrap().unwrap();
        forged.leaf = double_hash(b"not a member");
        assert!(!forged.verify(&root));
    }

    #[test]
    fn test_proof_absent_member() {
        let m = map_of(&[tx(1, b"a"), tx(2, b"b")]);
        assert!(prove(&m, &double_hash(b"zzz")).unwrap().is_none());
    }
}
