//! Core type aliases and constants for the Cairn ledger.
//!
//! These types are shared by the ledger store, the replica, and the sync
//! protocol.

/// Length in bytes of a content digest (RIPEMD-160 output).
pub const HASH_LEN: usize = 20;

/// 20-byte content digest used for transaction hashes, block hashes and
/// Merkle nodes.
///
/// Places where the empty sentinel is allowed (the Merkle root of an empty
/// block, the genesis parent hash) use `Option<Hash>`, with `None` standing
/// for the sentinel. A real digest is always exactly `HASH_LEN` bytes, so the
/// sentinel can never collide with one.
pub type Hash = [u8; HASH_LEN];

/// Block height (genesis is height 0).
pub type BlockHeight = u64;

/// Replica identifier assigned by the ordering substrate.
pub type ReplicaId = u32;

/// Protocol version string stamped into transactions and block headers.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Default maximum serialized size of a transaction (64 KiB).
pub const DEFAULT_MAX_TRANSACTION_SIZE: usize = 64 * 1024;

/// Convert a `Hash` to a hex string for display purposes.
pub fn hash_to_hex(hash: &Hash) -> String {
    let mut s = String::with_capacity(2 + 2 * HASH_LEN);
    s.push_str("0x");
    s.push_str(&hex::encode(hash));
    s
}

/// Hex rendering of an optional digest; the empty sentinel renders as `"-"`.
pub fn optional_hash_to_hex(hash: &Option<Hash>) -> String {
    match hash {
        Some(h) => hash_to_hex(h),
        None => "-".into(),
    }
}
