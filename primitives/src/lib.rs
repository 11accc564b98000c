//! `cairn-primitives`: data model for the Cairn replicated ledger.
//!
//! This crate provides the transaction, block and summary types, the
//! double-hash and Merkle construction that give them identity, the
//! client/peer message envelope, and the versioned binary codec shared by
//! block files on disk and the block-sync stream.

pub mod types;
pub mod error;
pub mod crypto;
pub mod merkle;
pub mod transaction;
pub mod block;
pub mod message;
pub mod codec;

// Re-export commonly used types at the crate root for convenience.
pub use types::{
    hash_to_hex, optional_hash_to_hex, BlockHeight, Hash, ReplicaId,
    DEFAULT_MAX_TRANSACTION_SIZE, HASH_LEN, PROTOCOL_VERSION,
};
pub use error::{ChainError, ChainResult, RecordError};
pub use crypto::double_hash;
pub use merkle::MerkleProof;
pub use transaction::Transaction;
pub use block::{Block, BlockHeader, BlockSummary};
pub use message::{ClientRequest, Message, Reply, TransactionStatus};
