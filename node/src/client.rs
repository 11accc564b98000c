//! Typed client over a [`Substrate`].
//!
//! Writes go through ordered delivery; reads go through unordered delivery
//! and are answered by a single replica.

use std::sync::Arc;

use cairn_primitives::codec::{decode_reply, encode_message, encode_transaction};
use cairn_primitives::{
    Block, BlockHeight, BlockSummary, ClientRequest, Hash, Message, Reply, ReplicaId, Transaction,
    TransactionStatus,
};

use crate::error::ClientError;
use crate::substrate::Substrate;

#[derive(Clone)]
pub struct LedgerClient {
    substrate: Arc<dyn Substrate>,
}

impl LedgerClient {
    pub fn new(substrate: Arc<dyn Substrate>) -> Self {
        Self { substrate }
    }

    fn ordered(&self, request: ClientRequest) -> Result<Reply, ClientError> {
        let reply = self
            .substrate
            .submit_ordered(&encode_message(&Message::Client(request)))?;
        Self::check(decode_reply(&reply)?)
    }

    fn unordered(&self, request: ClientRequest) -> Result<Reply, ClientError> {
        let reply = self
            .substrate
            .submit_unordered(&encode_message(&Message::Client(request)))?;
        Self::check(decode_reply(&reply)?)
    }

    fn check(reply: Reply) -> Result<Reply, ClientError> {
        match reply {
            Reply::Error(msg) => Err(ClientError::Replica(msg)),
            other => Ok(other),
        }
    }

    fn unexpected(reply: Reply) -> ClientError {
        ClientError::UnexpectedReply(format!("{reply:?}"))
    }

    /// Submit one transaction; `true` once every replica queued it.
    pub fn add_transaction(&self, tx: &Transaction) -> Result<bool, ClientError> {
        match self.ordered(ClientRequest::AddTransaction(encode_transaction(tx)))? {
            Reply::Bool(ok) => Ok(ok),
            other => Err(Self::unexpected(other)),
        }
    }

    /// Submit a batch; `true` only if the whole batch was queued.
    pub fn add_transactions(&self, txs: &[Transaction]) -> Result<bool, ClientError> {
        let raw = txs.iter().map(encode_transaction).collect();
        match self.ordered(ClientRequest::AddTransactions(raw))? {
            Reply::Bool(ok) => Ok(ok),
            other => Err(Self::unexpected(other)),
        }
    }

    pub fn most_recent_block(&self) -> Result<Block, ClientError> {
        match self.unordered(ClientRequest::GetMostRecentBlock)? {
            Reply::Block(block) => Ok(block),
            other => Err(Self::unexpected(other)),
        }
    }

    pub fn most_recent_summary(&self) -> Result<BlockSummary, ClientError> {
        match self.unordered(ClientRequest::GetMostRecentBlockSummary)? {
            Reply::Summary(summary) => Ok(summary),
            other => Err(Self::unexpected(other)),
        }
    }

    pub fn block(&self, height: BlockHeight) -> Result<Option<Block>, ClientError> {
        match self.unordered(ClientRequest::GetBlock(height))? {
            Reply::Block(block) => Ok(Some(block)),
            Reply::NotFound => Ok(None),
            other => Err(Self::unexpected(other)),
        }
    }

    pub fn block_summary(&self, height: BlockHeight) -> Result<Option<BlockSummary>, ClientError> {
        match self.unordered(ClientRequest::GetBlockSummary(height))? {
            Reply::Summary(summary) => Ok(Some(summary)),
            Reply::NotFound => Ok(None),
            other => Err(Self::unexpected(other)),
        }
    }

    pub fn height(&self) -> Result<BlockHeight, ClientError> {
        match self.unordered(ClientRequest::GetMostRecentBlockHeight)? {
            Reply::Height(height) => Ok(height),
            other => Err(Self::unexpected(other)),
        }
    }

    pub fn is_chain_valid(&self) -> Result<bool, ClientError> {
        match self.unordered(ClientRequest::IsChainValid)? {
            Reply::Bool(valid) => Ok(valid),
            other => Err(Self::unexpected(other)),
        }
    }

    pub fn leader(&self) -> Result<ReplicaId, ClientError> {
        match self.unordered(ClientRequest::GetLeader)? {
            Reply::Leader(id) => Ok(id),
            other => Err(Self::unexpected(other)),
        }
    }

    pub fn transaction_status(&self, tx_hash: Hash) -> Result<TransactionStatus, ClientError> {
        match self.unordered(ClientRequest::TransactionStatus(tx_hash))? {
            Reply::TxStatus(status) => Ok(status),
            other => Err(Self::unexpected(other)),
        }
    }

    pub fn number_nodes(&self) -> Result<u32, ClientError> {
        match self.unordered(ClientRequest::NumberNodes)? {
            Reply::Count(count) => Ok(count),
            other => Err(Self::unexpected(other)),
        }
    }
}
