//! Client/peer message envelope and replies.
//!
//! Every command the ordering substrate delivers is one encoded
//! [`Message`]; every answer is one encoded [`Reply`]. The byte layout lives
//! in [`crate::codec`].

use crate::block::{Block, BlockSummary};
use crate::types::{BlockHeight, Hash, ReplicaId};

/// Requests issued by ledger clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    /// Full tip block.
    GetMostRecentBlock,
    /// Header-only projection of the tip block.
    GetMostRecentBlockSummary,
    /// Full block at a height.
    GetBlock(BlockHeight),
    /// Header-only projection of the block at a height.
    GetBlockSummary(BlockHeight),
    /// Height of the tip block.
    GetMostRecentBlockHeight,
    /// Append one encoded transaction to the mempool (ordered delivery only).
    AddTransaction(Vec<u8>),
    /// Append a batch of encoded transactions (ordered delivery only).
    AddTransactions(Vec<Vec<u8>>),
    /// Re-check ledger linkage.
    IsChainValid,
    /// Last observed consensus leader.
    GetLeader,
    /// Where a transaction currently lives.
    TransactionStatus(Hash),
    /// Size of the active replica set.
    NumberNodes,
}

impl ClientRequest {
    /// Returns true for requests that never mutate replica state.
    pub fn is_read_only(&self) -> bool {
        !matches!(self, Self::AddTransaction(_) | Self::AddTransactions(_))
    }
}

/// Top-level envelope delivered through the substrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A client-facing request.
    Client(ClientRequest),
    /// A block proposal broadcast by `sender`.
    NewBlock { sender: ReplicaId, block: Block },
}

/// Location of a transaction as seen by one replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Pending in the mempool.
    InPool,
    /// Committed in the block at this height.
    InBlock(BlockHeight),
    /// Not known to this replica.
    Unknown,
}

/// Answer to a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Block(Block),
    Summary(BlockSummary),
    Height(BlockHeight),
    /// Outcome of a write, a validity check or a proposal vote.
    Bool(bool),
    Leader(ReplicaId),
    Count(u32),
    TxStatus(TransactionStatus),
    /// Requested block does not exist or could not be read.
    NotFound,
    /// Command could not be decoded or served.
    Error(String),
}

impl Reply {
    /// Interpret the reply as an acknowledgement; anything but `Bool(true)`
    /// counts as a rejection.
    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Bool(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_only_classification() {
        assert!(ClientRequest::GetMostRecentBlock.is_read_only());
        assert!(ClientRequest::TransactionStatus([0u8; 20]).is_read_only());
        assert!(!ClientRequest::AddTransaction(vec![1]).is_read_only());
        assert!(!ClientRequest::AddTransactions(vec![]).is_read_only());
    }

    #[test]
    fn test_is_ack() {
        assert!(Reply::Bool(true).is_ack());
        assert!(!Reply::Bool(false).is_ack());
        assert!(!Reply::NotFound.is_ack());
    }
}
