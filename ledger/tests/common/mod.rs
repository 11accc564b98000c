//! Shared test helpers for ledger integration tests.

#![allow(dead_code)]

use cairn_ledger::{Ledger, LedgerConfig};
use cairn_primitives::{Block, Transaction, PROTOCOL_VERSION};
use tempfile::TempDir;

/// Fresh ledger in its own temporary directory.
pub fn fresh_ledger() -> (TempDir, Ledger) {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::open(&LedgerConfig::with_directory(dir.path())).unwrap();
    (dir, ledger)
}

/// Fresh ledger with a specific memory budget.
pub fn ledger_with_budget(budget: usize) -> (TempDir, Ledger) {
    let dir = tempfile::tempdir().unwrap();
    let config = LedgerConfig {
        memory_budget: budget,
        ..LedgerConfig::with_directory(dir.path())
    };
    let ledger = Ledger::open(&config).unwrap();
    (dir, ledger)
}

/// Unsigned transaction with a deterministic payload.
pub fn make_tx(ts: i64, payload_len: usize) -> Transaction {
    let payload: Vec<u8> = (0..payload_len).map(|i| (i as i64 + ts) as u8).collect();
    Transaction::new(ts, payload, PROTOCOL_VERSION, None, 64 * 1024).unwrap()
}

/// Block directly above `parent` carrying `tx_count` transactions.
pub fn next_block(parent: &Block, tx_count: usize, payload_len: usize) -> Block {
    let base = (parent.height() as i64 + 1) * 1_000;
    let txs = (0..tx_count).map(|i| make_tx(base + i as i64, payload_len)).collect();
    Block::new(
        Some(parent.hash()),
        parent.height() + 1,
        txs,
        base,
        (parent.height() + 1).to_be_bytes().to_vec(),
        PROTOCOL_VERSION,
    )
    .unwrap()
}

/// Extend `ledger` by `count` blocks; returns the blocks added.
pub fn extend(ledger: &mut Ledger, count: usize, tx_count: usize, payload_len: usize) -> Vec<Block> {
    let mut added = Vec::with_capacity(count);
    for _ in 0..count {
        let block = next_block(ledger.most_recent_block(), tx_count, payload_len);
        assert!(ledger.add_block(block.clone()));
        added.push(block);
    }
    added
}
