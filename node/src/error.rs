//! Node error types.

use cairn_ledger::{LedgerError, StoreError};
use cairn_primitives::{BlockHeight, ChainError, RecordError, ReplicaId};

/// Mempool bookkeeping failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MempoolError {
    /// Size changed by a different amount than requested. The mempool is
    /// left as it is.
    #[error("mempool inconsistency: requested {requested}, size changed by {actual}")]
    Inconsistent { requested: usize, actual: usize },

    /// Fewer pending transactions than requested.
    #[error("mempool holds {available} transactions, {requested} requested")]
    Insufficient { requested: usize, available: usize },
}

/// Failure reported by the ordering substrate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubstrateError {
    /// No live replica is registered.
    #[error("no replicas registered")]
    NoReplicas,

    /// Replicas disagreed and no reply reached a majority.
    #[error("no reply reached a majority of {replicas} replicas")]
    NoQuorum { replicas: usize },

    /// The addressed replica is not reachable.
    #[error("replica {0} unavailable")]
    Unavailable(ReplicaId),
}

/// Failure of a typed client call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("substrate error: {0}")]
    Substrate(#[from] SubstrateError),

    #[error("undecodable reply: {0}")]
    Decode(#[from] ChainError),

    /// The replica answered with an error reply.
    #[error("replica error: {0}")]
    Replica(String),

    /// Reply of the wrong kind for the request.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}

/// Block-sync failure. Blocks already persisted stay on disk.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("sync i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sync record error: {0}")]
    Record(#[from] RecordError),

    #[error("sync store error: {0}")]
    Store(#[from] StoreError),

    #[error("substrate error: {0}")]
    Substrate(#[from] SubstrateError),

    /// An unordered query returned something unexpected.
    #[error("unexpected query reply: {0}")]
    Query(String),

    /// The reported leader is not a member of the current view.
    #[error("leader {0} is not in the current view")]
    LeaderNotInView(ReplicaId),

    /// This replica is the leader; there is nobody to sync from.
    #[error("local replica {0} is the leader")]
    SelfIsLeader(ReplicaId),

    /// No sync endpoint configured for the replica.
    #[error("no sync address configured for replica {0}")]
    UnknownPeer(ReplicaId),

    /// Height does not fit the 32-bit wire field.
    #[error("height {0} does not fit the sync wire format")]
    HeightOutOfRange(BlockHeight),

    /// `bottom` above `top`.
    #[error("invalid range [{bottom}, {top}]")]
    InvalidRange { bottom: BlockHeight, top: BlockHeight },

    /// Server sent the "no block" marker.
    #[error("server has no block at height {0}")]
    MissingBlock(BlockHeight),

    /// Server sent blocks out of order.
    #[error("expected block at height {expected}, received {found}")]
    UnexpectedHeight {
        expected: BlockHeight,
        found: BlockHeight,
    },
}

/// Top-level error type for node startup.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
