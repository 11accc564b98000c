//! Deterministic binary encoding shared by disk files and the sync stream.
//!
//! All numeric values are big-endian.
//!
//! Encoding format:
//! - Fixed-size fields (u8, u32, u64, i64) are written directly
//! - Variable-length fields (bytes, strings) are length-prefixed (u32)
//! - Optional digests are length-prefixed byte strings: empty for the
//!   sentinel, `HASH_LEN` bytes otherwise
//! - Repeated fields are count-prefixed (u32) then concatenated
//!
//! A framed record is `[u32 length][u8 FORMAT_VERSION][body]`, where the
//! length counts the version byte and the body. A record whose length is
//! zero is the "no block" marker used by the sync server.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use bytes::BufMut;

use crate::block::{Block, BlockHeader, BlockSummary};
use crate::error::{ChainError, ChainResult, RecordError};
use crate::message::{ClientRequest, Message, Reply, TransactionStatus};
use crate::transaction::Transaction;
use crate::types::{Hash, HASH_LEN};

/// Current record format version.
pub const FORMAT_VERSION: u8 = 1;

/// Upper bound on a single framed record accepted from a stream.
pub const MAX_RECORD_LEN: usize = 256 * 1024 * 1024;

/// A cursor for reading bytes during decoding.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn finish(&self) -> ChainResult<()> {
        if self.remaining() != 0 {
            return Err(ChainError::SerializationError(format!(
                "{} trailing bytes",
                self.remaining()
            )));
        }
        Ok(())
    }

    fn read_bytes(&mut self, n: usize) -> ChainResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(ChainError::SerializationError("unexpected end of data".into()));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> ChainResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u32(&mut self) -> ChainResult<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self) -> ChainResult<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.read_bytes(8)?);
        Ok(u64::from_be_bytes(buf))
    }

    fn read_i64(&mut self) -> ChainResult<i64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.read_bytes(8)?);
        Ok(i64::from_be_bytes(buf))
    }

    fn read_bool(&mut self) -> ChainResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ChainError::SerializationError("invalid bool value".into())),
        }
    }

    fn read_hash(&mut self) -> ChainResult<Hash> {
        let mut hash = [0u8; HASH_LEN];
        hash.copy_from_slice(self.read_bytes(HASH_LEN)?);
        Ok(hash)
    }

    fn read_optional_hash(&mut self) -> ChainResult<Option<Hash>> {
        match self.read_u32()? as usize {
            0 => Ok(None),
            HASH_LEN => Ok(Some(self.read_hash()?)),
            other => Err(ChainError::SerializationError(format!(
                "invalid digest length {other}"
            ))),
        }
    }

    fn read_var_bytes(&mut self) -> ChainResult<Vec<u8>> {
        let len = self.read_u32()? as usize;
        Ok(self.read_bytes(len)?.to_vec())
    }

    fn read_string(&mut self) -> ChainResult<String> {
        String::from_utf8(self.read_var_bytes()?)
            .map_err(|_| ChainError::SerializationError("invalid UTF-8".into()))
    }

    fn read_count(&mut self) -> ChainResult<usize> {
        let count = self.read_u32()? as usize;
        // every element takes at least four bytes
        if count > self.remaining() / 4 + 1 {
            return Err(ChainError::SerializationError(format!(
                "count {count} exceeds remaining data"
            )));
        }
        Ok(count)
    }
}

// ── Encoding helpers ──

fn write_optional_hash(buf: &mut Vec<u8>, h: &Option<Hash>) {
    match h {
        None => buf.put_u32(0),
        Some(hash) => {
            buf.put_u32(HASH_LEN as u32);
            buf.put_slice(hash);
        }
    }
}

fn write_var_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    buf.put_u32(data.len() as u32);
    buf.put_slice(data);
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_var_bytes(buf, s.as_bytes());
}

// ── Transaction encoding ──

/// Encode a transaction body.
pub fn encode_transaction(tx: &Transaction) -> Vec<u8> {
    let mut buf = Vec::with_capacity(encoded_transaction_len(tx));
    write_transaction(&mut buf, tx);
    buf
}

fn write_transaction(buf: &mut Vec<u8>, tx: &Transaction) {
    write_string(buf, tx.version());
    buf.put_i64(tx.timestamp());
    write_var_bytes(buf, tx.payload());
    match tx.signature() {
        None => buf.put_u8(0),
        Some(sig) => {
            buf.put_u8(1);
            write_var_bytes(buf, sig);
        }
    }
}

/// Length of [`encode_transaction`] output without encoding.
pub fn encoded_transaction_len(tx: &Transaction) -> usize {
    4 + tx.version().len()
        + 8
        + 4
        + tx.payload().len()
        + 1
        + tx.signature().map_or(0, |sig| 4 + sig.len())
}

/// Decode a transaction body, enforcing `max_size`.
pub fn decode_transaction(data: &[u8], max_size: usize) -> ChainResult<Transaction> {
    let mut r = Reader::new(data);
    let tx = read_transaction(&mut r, max_size)?;
    r.finish()?;
    Ok(tx)
}

fn read_transaction(r: &mut Reader<'_>, max_size: usize) -> ChainResult<Transaction> {
    let version = r.read_string()?;
    let timestamp = r.read_i64()?;
    let payload = r.read_var_bytes()?;
    let signature = if r.read_bool()? {
        Some(r.read_var_bytes()?)
    } else {
        None
    };
    Transaction::new(timestamp, payload, version, signature, max_size)
}

/// Encode a list of transactions (mempool snapshot).
pub fn encode_transactions(txs: &[Transaction]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.put_u32(txs.len() as u32);
    for tx in txs {
        write_transaction(&mut buf, tx);
    }
    buf
}

/// Decode a list produced by [`encode_transactions`].
pub fn decode_transactions(data: &[u8], max_size: usize) -> ChainResult<Vec<Transaction>> {
    let mut r = Reader::new(data);
    let count = r.read_count()?;
    let mut txs = Vec::with_capacity(count);
    for _ in 0..count {
        txs.push(read_transaction(&mut r, max_size)?);
    }
    r.finish()?;
    Ok(txs)
}

// ── Block encoding ──

fn write_header(buf: &mut Vec<u8>, header: &BlockHeader) {
    write_optional_hash(buf, &header.previous_hash);
    write_string(buf, &header.version);
    buf.put_i64(header.timestamp);
    write_var_bytes(buf, &header.nonce);
    write_optional_hash(buf, &header.merkle_root);
}

fn read_header(r: &mut Reader<'_>) -> ChainResult<BlockHeader> {
    Ok(BlockHeader {
        previous_hash: r.read_optional_hash()?,
        version: r.read_string()?,
        timestamp: r.read_i64()?,
        nonce: r.read_var_bytes()?,
        merkle_root: r.read_optional_hash()?,
    })
}

fn write_block(buf: &mut Vec<u8>, block: &Block) {
    write_header(buf, block.header());
    buf.put_u64(block.height());
    buf.put_u32(block.tx_count());
    for tx in block.ordered_transactions() {
        write_transaction(buf, &tx);
    }
}

fn read_block(r: &mut Reader<'_>) -> ChainResult<Block> {
    let header = read_header(r)?;
    let height = r.read_u64()?;
    let tx_count = r.read_u32()?;
    if tx_count as usize > r.remaining() {
        return Err(ChainError::SerializationError(format!(
            "transaction count {tx_count} exceeds remaining data"
        )));
    }
    let mut transactions = BTreeMap::new();
    for _ in 0..tx_count {
        let tx = read_transaction(r, usize::MAX)?;
        if transactions.insert(tx.hash(), tx).is_some() {
            return Err(ChainError::InvalidBlock("duplicate transaction".into()));
        }
    }
    Block::from_parts(header, transactions, tx_count, height)
}

/// Encode a block body (unframed).
pub fn encode_block(block: &Block) -> Vec<u8> {
    let mut buf = Vec::with_capacity(block.size() + 64);
    write_block(&mut buf, block);
    buf
}

/// Decode a block body (unframed).
pub fn decode_block(data: &[u8]) -> ChainResult<Block> {
    let mut r = Reader::new(data);
    let block = read_block(&mut r)?;
    r.finish()?;
    Ok(block)
}

// ── Framed block records ──

/// Encode a block as a self-framing record.
pub fn encode_block_record(block: &Block) -> Vec<u8> {
    let body = encode_block(block);
    let mut buf = Vec::with_capacity(4 + 1 + body.len());
    buf.put_u32((1 + body.len()) as u32);
    buf.put_u8(FORMAT_VERSION);
    buf.put_slice(&body);
    buf
}

/// Decode a complete framed block record (e.g. a block file's contents).
pub fn decode_block_record(data: &[u8]) -> ChainResult<Block> {
    let mut r = Reader::new(data);
    let len = r.read_u32()? as usize;
    if len == 0 {
        return Err(ChainError::SerializationError("empty block record".into()));
    }
    let framed = r.read_bytes(len)?;
    r.finish()?;
    decode_record_body(framed)
}

fn decode_record_body(framed: &[u8]) -> ChainResult<Block> {
    let (version, body) = framed
        .split_first()
        .ok_or_else(|| ChainError::SerializationError("empty block record".into()))?;
    if *version != FORMAT_VERSION {
        return Err(ChainError::UnsupportedVersion {
            expected: FORMAT_VERSION,
            got: *version,
        });
    }
    decode_block(body)
}

/// Write a framed block record to a stream.
pub fn write_block_record<W: Write>(writer: &mut W, block: &Block) -> std::io::Result<()> {
    writer.write_all(&encode_block_record(block))
}

/// Write the "no block" marker to a stream.
pub fn write_empty_record<W: Write>(writer: &mut W) -> std::io::Result<()> {
    writer.write_all(&0u32.to_be_bytes())
}

/// Read one framed block record from a stream.
///
/// Returns `Ok(None)` for the "no block" marker.
pub fn read_block_record<R: Read>(reader: &mut R) -> Result<Option<Block>, RecordError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 {
        return Ok(None);
    }
    if len > MAX_RECORD_LEN {
        return Err(RecordError::TooLarge {
            len,
            max: MAX_RECORD_LEN,
        });
    }
    let mut framed = vec![0u8; len];
    reader.read_exact(&mut framed)?;
    Ok(Some(decode_record_body(&framed)?))
}

// ── Summary encoding ──

fn write_summary(buf: &mut Vec<u8>, summary: &BlockSummary) {
    write_header(buf, &summary.header);
    buf.put_u32(summary.tx_count);
    buf.put_u64(summary.height);
    buf.put_u64(summary.size);
}

fn read_summary(r: &mut Reader<'_>) -> ChainResult<BlockSummary> {
    Ok(BlockSummary {
        header: read_header(r)?,
        tx_count: r.read_u32()?,
        height: r.read_u64()?,
        size: r.read_u64()?,
    })
}

// ── Message envelope encoding ──

const MSG_CLIENT: u8 = 0x01;
const MSG_NEW_BLOCK: u8 = 0x02;

const REQ_GET_MOST_RECENT_BLOCK: u8 = 0x01;
const REQ_GET_MOST_RECENT_BLOCK_SUMMARY: u8 = 0x02;
const REQ_GET_BLOCK: u8 = 0x03;
const REQ_GET_BLOCK_SUMMARY: u8 = 0x04;
const REQ_GET_MOST_RECENT_BLOCK_HEIGHT: u8 = 0x05;
const REQ_ADD_TRANSACTION: u8 = 0x06;
const REQ_ADD_TRANSACTIONS: u8 = 0x07;
const REQ_IS_CHAIN_VALID: u8 = 0x08;
const REQ_GET_LEADER: u8 = 0x09;
const REQ_TRANSACTION_STATUS: u8 = 0x0a;
const REQ_NUMBER_NODES: u8 = 0x0b;

/// Encode a message envelope.
pub fn encode_message(msg: &Message) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    match msg {
        Message::Client(req) => {
            buf.put_u8(MSG_CLIENT);
            write_request(&mut buf, req);
        }
        Message::NewBlock { sender, block } => {
            buf.put_u8(MSG_NEW_BLOCK);
            buf.put_u32(*sender);
            write_var_bytes(&mut buf, &encode_block(block));
        }
    }
    buf
}

/// Decode a message envelope.
pub fn decode_message(data: &[u8]) -> ChainResult<Message> {
    let mut r = Reader::new(data);
    let msg = match r.read_u8()? {
        MSG_CLIENT => Message::Client(read_request(&mut r)?),
        MSG_NEW_BLOCK => {
            let sender = r.read_u32()?;
            let block = decode_block(&r.read_var_bytes()?)?;
            Message::NewBlock { sender, block }
        }
        other => {
            return Err(ChainError::SerializationError(format!(
                "unknown message type: 0x{other:02x}"
            )))
        }
    };
    r.finish()?;
    Ok(msg)
}

fn write_request(buf: &mut Vec<u8>, req: &ClientRequest) {
    match req {
        ClientRequest::GetMostRecentBlock => buf.put_u8(REQ_GET_MOST_RECENT_BLOCK),
        ClientRequest::GetMostRecentBlockSummary => buf.put_u8(REQ_GET_MOST_RECENT_BLOCK_SUMMARY),
        ClientRequest::GetBlock(height) => {
            buf.put_u8(REQ_GET_BLOCK);
            buf.put_u64(*height);
        }
        ClientRequest::GetBlockSummary(height) => {
            buf.put_u8(REQ_GET_BLOCK_SUMMARY);
            buf.put_u64(*height);
        }
        ClientRequest::GetMostRecentBlockHeight => buf.put_u8(REQ_GET_MOST_RECENT_BLOCK_HEIGHT),
        ClientRequest::AddTransaction(tx) => {
            buf.put_u8(REQ_ADD_TRANSACTION);
            write_var_bytes(buf, tx);
        }
        ClientRequest::AddTransactions(txs) => {
            buf.put_u8(REQ_ADD_TRANSACTIONS);
            buf.put_u32(txs.len() as u32);
            for tx in txs {
                write_var_bytes(buf, tx);
            }
        }
        ClientRequest::IsChainValid => buf.put_u8(REQ_IS_CHAIN_VALID),
        ClientRequest::GetLeader => buf.put_u8(REQ_GET_LEADER),
        ClientRequest::TransactionStatus(hash) => {
            buf.put_u8(REQ_TRANSACTION_STATUS);
            buf.put_slice(hash);
        }
        ClientRequest::NumberNodes => buf.put_u8(REQ_NUMBER_NODES),
    }
}

fn read_request(r: &mut Reader<'_>) -> ChainResult<ClientRequest> {
    Ok(match r.read_u8()? {
        REQ_GET_MOST_RECENT_BLOCK => ClientRequest::GetMostRecentBlock,
        REQ_GET_MOST_RECENT_BLOCK_SUMMARY => ClientRequest::GetMostRecentBlockSummary,
        REQ_GET_BLOCK => ClientRequest::GetBlock(r.read_u64()?),
        REQ_GET_BLOCK_SUMMARY => ClientRequest::GetBlockSummary(r.read_u64()?),
        REQ_GET_MOST_RECENT_BLOCK_HEIGHT => ClientRequest::GetMostRecentBlockHeight,
        REQ_ADD_TRANSACTION => ClientRequest::AddTransaction(r.read_var_bytes()?),
        REQ_ADD_TRANSACTIONS => {
            let count = r.read_count()?;
            let mut txs = Vec::with_capacity(count);
            for _ in 0..count {
                txs.push(r.read_var_bytes()?);
            }
            ClientRequest::AddTransactions(txs)
        }
        REQ_IS_CHAIN_VALID => ClientRequest::IsChainValid,
        REQ_GET_LEADER => ClientRequest::GetLeader,
        REQ_TRANSACTION_STATUS => ClientRequest::TransactionStatus(r.read_hash()?),
        REQ_NUMBER_NODES => ClientRequest::NumberNodes,
        other => {
            return Err(ChainError::SerializationError(format!(
                "unknown request type: 0x{other:02x}"
            )))
        }
    })
}

// ── Reply encoding ──

const REPLY_BLOCK: u8 = 0x01;
const REPLY_SUMMARY: u8 = 0x02;
const REPLY_HEIGHT: u8 = 0x03;
const REPLY_BOOL: u8 = 0x04;
const REPLY_LEADER: u8 = 0x05;
const REPLY_COUNT: u8 = 0x06;
const REPLY_TX_STATUS: u8 = 0x07;
const REPLY_NOT_FOUND: u8 = 0x08;
const REPLY_ERROR: u8 = 0x09;

const STATUS_IN_POOL: u8 = 0x01;
const STATUS_IN_BLOCK: u8 = 0x02;
const STATUS_UNKNOWN: u8 = 0x03;

/// Encode a reply.
pub fn encode_reply(reply: &Reply) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32);
    match reply {
        Reply::Block(block) => {
            buf.put_u8(REPLY_BLOCK);
            write_block(&mut buf, block);
        }
        Reply::Summary(summary) => {
            buf.put_u8(REPLY_SUMMARY);
            write_summary(&mut buf, summary);
        }
        Reply::Height(height) => {
            buf.put_u8(REPLY_HEIGHT);
            buf.put_u64(*height);
        }
        Reply::Bool(value) => {
            buf.put_u8(REPLY_BOOL);
            buf.put_u8(u8::from(*value));
        }
        Reply::Leader(id) => {
            buf.put_u8(REPLY_LEADER);
            buf.put_u32(*id);
        }
        Reply::Count(count) => {
            buf.put_u8(REPLY_COUNT);
            buf.put_u32(*count);
        }
        Reply::TxStatus(status) => {
            buf.put_u8(REPLY_TX_STATUS);
            match status {
                TransactionStatus::InPool => buf.put_u8(STATUS_IN_POOL),
                TransactionStatus::InBlock(height) => {
                    buf.put_u8(STATUS_IN_BLOCK);
                    buf.put_u64(*height);
                }
                TransactionStatus::Unknown => buf.put_u8(STATUS_UNKNOWN),
            }
        }
        Reply::NotFound => buf.put_u8(REPLY_NOT_FOUND),
        Reply::Error(msg) => {
            buf.put_u8(REPLY_ERROR);
            write_string(&mut buf, msg);
        }
    }
    buf
}

/// Decode a reply.
pub fn decode_reply(data: &[u8]) -> ChainResult<Reply> {
    let mut r = Reader::new(data);
    let reply = match r.read_u8()? {
        REPLY_BLOCK => Reply::Block(read_block(&mut r)?),
        REPLY_SUMMARY => Reply::Summary(read_summary(&mut r)?),
        REPLY_HEIGHT => Reply::Height(r.read_u64()?),
        REPLY_BOOL => Reply::Bool(r.read_bool()?),
        REPLY_LEADER => Reply::Leader(r.read_u32()?),
        REPLY_COUNT => Reply::Count(r.read_u32()?),
        REPLY_TX_STATUS => Reply::TxStatus(match r.read_u8()? {
            STATUS_IN_POOL => TransactionStatus::InPool,
            STATUS_IN_BLOCK => TransactionStatus::InBlock(r.read_u64()?),
            STATUS_UNKNOWN => TransactionStatus::Unknown,
            other => {
                return Err(ChainError::SerializationError(format!(
                    "unknown transaction status: 0x{other:02x}"
                )))
            }
        }),
        REPLY_NOT_FOUND => Reply::NotFound,
        REPLY_ERROR => Reply::Error(r.read_string()?),
        other => {
            return Err(ChainError::SerializationError(format!(
                "unknown reply type: 0x{other:02x}"
            )))
        }
    };
    r.finish()?;
    Ok(reply)
}
