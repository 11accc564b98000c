//! Block, header and header-only summary types.
//!
//! A block is immutable once built: its Merkle root is computed from the
//! transaction set before the header exists, and its identity hash is the
//! double hash of the header's fixed-order data. Height and parent hash are
//! taken as given; continuity is the ledger's concern.

use std::collections::BTreeMap;

use crate::crypto::double_hash;
use crate::error::{ChainError, ChainResult};
use crate::merkle::{self, MerkleProof};
use crate::transaction::Transaction;
use crate::types::{BlockHeight, Hash, PROTOCOL_VERSION};

/// Fixed genesis timestamp (2020-01-01T00:00:00Z in epoch millis).
pub const GENESIS_TIMESTAMP: i64 = 1_577_836_800_000;

/// Payload of the single hard-coded genesis transaction.
pub const GENESIS_PAYLOAD: &[u8] = b"cairn genesis";

/// Bytes taken by the two 32-bit counters in the block size accounting.
const COUNTER_BYTES: usize = 2 * 4;

/// Block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Hash of the parent block; `None` (empty sentinel) for genesis.
    pub previous_hash: Option<Hash>,
    /// Protocol version string.
    pub version: String,
    /// Timestamp assigned by the ordering substrate, epoch millis.
    pub timestamp: i64,
    /// Nonce assigned by the ordering substrate.
    pub nonce: Vec<u8>,
    /// Merkle root of the transaction set; `None` for an empty block.
    pub merkle_root: Option<Hash>,
}

impl BlockHeader {
    /// Fixed-order header data: version, timestamp (8 bytes BE), previous
    /// hash, nonce, Merkle root. Sentinels contribute no bytes.
    pub fn data(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        out.extend_from_slice(self.version.as_bytes());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        if let Some(prev) = &self.previous_hash {
            out.extend_from_slice(prev);
        }
        out.extend_from_slice(&self.nonce);
        if let Some(root) = &self.merkle_root {
            out.extend_from_slice(root);
        }
        out
    }

    /// Length of [`data`](Self::data).
    pub fn size(&self) -> usize {
        self.version.len()
            + 8
            + self.previous_hash.map_or(0, |h| h.len())
            + self.nonce.len()
            + self.merkle_root.map_or(0, |h| h.len())
    }

    /// Identity hash of the block carrying this header.
    pub fn hash(&self) -> Hash {
        double_hash(&self.data())
    }
}

/// Full block with its transaction set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    header: BlockHeader,
    transactions: BTreeMap<Hash, Transaction>,
    tx_count: u32,
    height: BlockHeight,
    hash: Hash,
}

impl Block {
    /// Build a block from its parent link, height, transactions and the
    /// substrate-assigned timestamp and nonce.
    ///
    /// Fails on duplicate transactions or if the Merkle root cannot be
    /// computed.
    pub fn new(
        previous_hash: Option<Hash>,
        height: BlockHeight,
        transactions: Vec<Transaction>,
        timestamp: i64,
        nonce: Vec<u8>,
        version: impl Into<String>,
    ) -> ChainResult<Self> {
        let requested = transactions.len();
        let map: BTreeMap<Hash, Transaction> =
            transactions.into_iter().map(|tx| (tx.hash(), tx)).collect();
        if map.len() != requested {
            return Err(ChainError::InvalidBlock(format!(
                "duplicate transactions: {} supplied, {} unique",
                requested,
                map.len()
            )));
        }
        let merkle_root = merkle::merkle_root(&map)?;
        let header = BlockHeader {
            previous_hash,
            version: version.into(),
            timestamp,
            nonce,
            merkle_root,
        };
        Self::assemble(header, map, height)
    }

    /// Reassemble a decoded block, checking the counter and Merkle root
    /// against the transaction set.
    pub fn from_parts(
        header: BlockHeader,
        transactions: BTreeMap<Hash, Transaction>,
        tx_count: u32,
        height: BlockHeight,
    ) -> ChainResult<Self> {
        if tx_count as usize != transactions.len() {
            return Err(ChainError::InvalidBlock(format!(
                "transaction counter {} does not match {} transactions",
                tx_count,
                transactions.len()
            )));
        }
        if merkle::merkle_root(&transactions)? != header.merkle_root {
            return Err(ChainError::InvalidBlock("merkle root mismatch".into()));
        }
        Self::assemble(header, transactions, height)
    }

    fn assemble(
        header: BlockHeader,
        transactions: BTreeMap<Hash, Transaction>,
        height: BlockHeight,
    ) -> ChainResult<Self> {
        let tx_count = u32::try_from(transactions.len())
            .map_err(|_| ChainError::InvalidBlock("too many transactions".into()))?;
        let hash = header.hash();
        Ok(Self {
            header,
            transactions,
            tx_count,
            height,
            hash,
        })
    }

    /// The fixed genesis block: height 0, one hard-coded transaction, fixed
    /// timestamp, empty parent hash and nonce.
    pub fn genesis() -> Self {
        let tx = Transaction::assemble(
            GENESIS_TIMESTAMP,
            GENESIS_PAYLOAD.to_vec(),
            PROTOCOL_VERSION.into(),
            None,
        );
        let mut transactions = BTreeMap::new();
        transactions.insert(tx.hash(), tx.clone());
        let header = BlockHeader {
            previous_hash: None,
            version: PROTOCOL_VERSION.into(),
            timestamp: GENESIS_TIMESTAMP,
            nonce: Vec::new(),
            merkle_root: Some(tx.hash()),
        };
        let hash = header.hash();
        Self {
            header,
            transactions,
            tx_count: 1,
            height: 0,
            hash,
        }
    }

    /// Rebuild this block with a different timestamp and nonce, keeping
    /// parent, height and transactions.
    pub fn restamp(&self, timestamp: i64, nonce: Vec<u8>) -> Self {
        let header = BlockHeader {
            timestamp,
            nonce,
            ..self.header.clone()
        };
        let hash = header.hash();
        Self {
            header,
            transactions: self.transactions.clone(),
            tx_count: self.tx_count,
            height: self.height,
            hash,
        }
    }

    /// Identity hash (double hash of the header data).
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Block header.
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// Height of this block.
    pub fn height(&self) -> BlockHeight {
        self.height
    }

    /// Parent hash, `None` for genesis.
    pub fn previous_hash(&self) -> Option<Hash> {
        self.header.previous_hash
    }

    /// Number of transactions.
    pub fn tx_count(&self) -> u32 {
        self.tx_count
    }

    /// Returns true if this block has no transactions.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Transactions keyed by hash.
    pub fn transactions(&self) -> &BTreeMap<Hash, Transaction> {
        &self.transactions
    }

    /// Transactions in Merkle leaf order (timestamp, then hash).
    pub fn ordered_transactions(&self) -> Vec<Transaction> {
        let mut txs: Vec<Transaction> = self.transactions.values().cloned().collect();
        txs.sort_by_key(Transaction::ordering_key);
        txs
    }

    /// Returns true if the block contains `tx_hash`.
    pub fn contains_transaction(&self, tx_hash: &Hash) -> bool {
        self.transactions.contains_key(tx_hash)
    }

    /// Returns true if both blocks carry exactly the same transaction set.
    pub fn same_transactions(&self, other: &Block) -> bool {
        self.transactions.len() == other.transactions.len()
            && self.transactions.keys().eq(other.transactions.keys())
    }

    /// Total size: header data, two 32-bit counters, and every transaction.
    pub fn size(&self) -> usize {
        self.header.size()
            + COUNTER_BYTES
            + self.transactions.values().map(Transaction::size).sum::<usize>()
    }

    /// Membership proof for `tx_hash` against this block's Merkle root.
    pub fn prove_transaction(&self, tx_hash: &Hash) -> Option<MerkleProof> {
        merkle::prove(&self.transactions, tx_hash).ok().flatten()
    }

    /// Header-only projection.
    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            header: self.header.clone(),
            tx_count: self.tx_count,
            height: self.height,
            size: self.size() as u64,
        }
    }
}

/// Header-only projection of a block: no transaction payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    /// Header of the summarized block.
    pub header: BlockHeader,
    /// Number of transactions in the block.
    pub tx_count: u32,
    /// Height of the block.
    pub height: BlockHeight,
    /// Total block size in bytes.
    pub size: u64,
}

impl BlockSummary {
    /// Identity hash of the summarized block.
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }
}
