//! Memory-bounded window over the block store.
//!
//! ## Invariants
//!
//! - the cache is never empty once construction succeeds
//! - cached heights are strictly descending with no gaps (index 0 = tip)
//! - `size_in_memory` equals the summed size of cached blocks
//! - `size_in_memory <= memory_budget` unless exactly one block is cached
//!
//! Every block ever accepted is on disk, so evicted blocks (genesis
//! included) stay retrievable through [`Ledger::get_block`].

use std::collections::VecDeque;

use cairn_primitives::{hash_to_hex, Block, BlockHeight, Hash};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::store::BlockStore;

/// The local replica's view of the chain.
#[derive(Debug)]
pub struct Ledger {
    store: BlockStore,
    cache: VecDeque<Block>,
    size_in_memory: usize,
    memory_budget: usize,
}

impl Ledger {
    /// Open the ledger described by `config`.
    ///
    /// Loads block files from the highest height downward until the memory
    /// budget would be exceeded; the tip is always loaded. If the directory
    /// holds no block files, the genesis block is created and persisted.
    pub fn open(config: &LedgerConfig) -> LedgerResult<Self> {
        let store = BlockStore::open(config)?;
        let (cache, size_in_memory) = load_window(&store, config.memory_budget)?;
        let ledger = Self {
            store,
            cache,
            size_in_memory,
            memory_budget: config.memory_budget,
        };
        tracing::info!(
            target: "ledger",
            tip = ledger.tip_height(),
            cached = ledger.cache.len(),
            bytes = ledger.size_in_memory,
            "ledger opened"
        );
        Ok(ledger)
    }

    /// Block store backing this ledger.
    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    /// The tip block.
    pub fn most_recent_block(&self) -> &Block {
        // non-empty by construction
        &self.cache[0]
    }

    /// Height of the tip block.
    pub fn tip_height(&self) -> BlockHeight {
        self.most_recent_block().height()
    }

    /// Block at `height`, from the cache or read through from disk.
    ///
    /// `None` if `height` is above the tip or the file is missing or
    /// corrupt.
    pub fn get_block(&self, height: BlockHeight) -> Option<Block> {
        if height > self.tip_height() {
            return None;
        }
        if let Some(block) = self.cache.iter().find(|b| b.height() == height) {
            return Some(block.clone());
        }
        match self.store.read_block(height) {
            Ok(block) => Some(block),
            Err(e) => {
                tracing::warn!(target: "ledger", height, error = %e, "block read failed");
                None
            }
        }
    }

    /// Append `block` above the tip.
    ///
    /// Rejected (returns `false`, ledger unchanged) if its height is not
    /// above the tip or if persisting it fails. A block that does not
    /// directly follow the tip restarts the in-memory window at that block.
    pub fn add_block(&mut self, block: Block) -> bool {
        let tip = self.tip_height();
        if block.height() <= tip {
            tracing::debug!(
                target: "ledger",
                height = block.height(),
                tip,
                "rejecting block at or below tip"
            );
            return false;
        }
        if let Err(e) = self.store.write_block(&block) {
            tracing::error!(target: "ledger", height = block.height(), error = %e, "failed to persist block");
            return false;
        }
        if block.height() != tip + 1 {
            tracing::warn!(
                target: "ledger",
                height = block.height(),
                tip,
                "block does not follow tip, restarting cache window"
            );
            self.cache.clear();
            self.size_in_memory = 0;
        }
        tracing::info!(
            target: "ledger",
            height = block.height(),
            hash = %hash_to_hex(&block.hash()),
            txs = block.tx_count(),
            "block committed"
        );
        self.size_in_memory += block.size();
        self.cache.push_front(block);
        self.evict();
        true
    }

    fn evict(&mut self) {
        while self.size_in_memory > self.memory_budget && self.cache.len() > 1 {
            if let Some(evicted) = self.cache.pop_back() {
                self.size_in_memory -= evicted.size();
                tracing::debug!(target: "ledger", height = evicted.height(), "evicted block from cache");
            }
        }
    }

    /// Walk from the tip down to genesis checking every parent link.
    ///
    /// A missing or unreadable block breaks the chain.
    pub fn is_chain_valid(&self) -> bool {
        let mut current = self.most_recent_block().clone();
        while current.height() > 0 {
            let parent_height = current.height() - 1;
            let Some(parent) = self.get_block(parent_height) else {
                tracing::warn!(target: "ledger", height = parent_height, "chain broken: block missing");
                return false;
            };
            if current.previous_hash() != Some(parent.hash()) {
                tracing::warn!(
                    target: "ledger",
                    height = current.height(),
                    "chain broken: previous hash mismatch"
                );
                return false;
            }
            current = parent;
        }
        true
    }

    /// Rebuild the cache from disk.
    ///
    /// On failure the previous cache is kept.
    pub fn reload_blocks_from_disk(&mut self) -> LedgerResult<()> {
        let (cache, size_in_memory) = load_window(&self.store, self.memory_budget)?;
        self.cache = cache;
        self.size_in_memory = size_in_memory;
        tracing::info!(
            target: "ledger",
            tip = self.tip_height(),
            cached = self.cache.len(),
            "ledger reloaded from disk"
        );
        Ok(())
    }

    /// Height of the committed block holding `tx_hash`, scanning from the
    /// tip backward.
    pub fn find_transaction(&self, tx_hash: &Hash) -> Option<BlockHeight> {
        let mut height = self.tip_height();
        loop {
            let block = self.get_block(height)?;
            if block.contains_transaction(tx_hash) {
                return Some(height);
            }
            if height == 0 {
                return None;
            }
            height -= 1;
        }
    }

    /// Summed size of cached blocks.
    pub fn size_in_memory(&self) -> usize {
        self.size_in_memory
    }

    /// Configured byte budget.
    pub fn memory_budget(&self) -> usize {
        self.memory_budget
    }

    /// Number of cached blocks.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Cached blocks, tip first.
    pub fn cached_blocks(&self) -> impl Iterator<Item = &Block> {
        self.cache.iter()
    }
}

fn load_window(store: &BlockStore, budget: usize) -> LedgerResult<(VecDeque<Block>, usize)> {
    let heights = store.list_heights()?;
    if heights.is_empty() {
        let genesis = Block::genesis();
        store.write_block(&genesis).map_err(LedgerError::Genesis)?;
        tracing::info!(target: "ledger", hash = %hash_to_hex(&genesis.hash()), "created genesis block");
        let size = genesis.size();
        return Ok((VecDeque::from([genesis]), size));
    }

    let mut cache: VecDeque<Block> = VecDeque::new();
    let mut size = 0usize;
    for &height in heights.iter().rev() {
        if let Some(lowest) = cache.back() {
            if height + 1 != lowest.height() {
                tracing::debug!(target: "ledger", height, "gap in block files, stopping load");
                break;
            }
        }
        let block = match store.read_block(height) {
            Ok(block) => block,
            Err(e) if cache.is_empty() => {
                tracing::warn!(target: "ledger", height, error = %e, "skipping unreadable tip file");
                continue;
            }
            Err(e) => {
                tracing::warn!(target: "ledger", height, error = %e, "unreadable block file, stopping load");
                break;
            }
        };
        if !cache.is_empty() && size + block.size() > budget {
            break;
        }
        size += block.size();
        cache.push_back(block);
    }

    if cache.is_empty() {
        return Err(LedgerError::NoReadableBlock(store.directory().to_path_buf()));
    }
    Ok((cache, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_primitives::{Transaction, PROTOCOL_VERSION};

    fn child(parent: &Block, seed: u8) -> Block {
        let tx = Transaction::new(i64::from(seed), vec![seed; 16], PROTOCOL_VERSION, None, 1024).unwrap();
        Block::new(Some(parent.hash()), parent.height() + 1, vec![tx], 1_000, vec![seed], PROTOCOL_VERSION)
            .unwrap()
    }

    #[test]
    fn test_open_empty_dir_creates_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(&LedgerConfig::with_directory(dir.path())).unwrap();
        assert_eq!(ledger.tip_height(), 0);
        assert_eq!(ledger.most_recent_block().hash(), Block::genesis().hash());
        assert!(dir.path().join("block_0.blk").is_file());
        assert_eq!(ledger.size_in_memory(), Block::genesis().size());
    }

    #[test]
    fn test_gap_restarts_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::open(&LedgerConfig::with_directory(dir.path())).unwrap();
        let one = child(ledger.most_recent_block(), 1);
        let two = child(&one, 2);
        let three = child(&two, 3);
        assert!(ledger.add_block(one));
        assert!(ledger.add_block(three.clone()));
        assert_eq!(ledger.cached_len(), 1);
        assert_eq!(ledger.size_in_memory(), three.size());
        assert!(!ledger.is_chain_valid());
    }

    #[test]
    fn test_unreadable_tip_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = LedgerConfig::with_directory(dir.path());
        {
            let mut ledger = Ledger::open(&config).unwrap();
            let one = child(ledger.most_recent_block(), 1);
            assert!(ledger.add_block(one));
        }
        std::fs::write(dir.path().join("block_1.blk"), b"garbage").unwrap();
        let ledger = Ledger::open(&config).unwrap();
        assert_eq!(ledger.tip_height(), 0);
    }

    #[test]
    fn test_only_unreadable_files_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("block_0.blk"), b"garbage").unwrap();
        let err = Ledger::open(&LedgerConfig::with_directory(dir.path())).unwrap_err();
        assert!(matches!(err, LedgerError::NoReadableBlock(_)));
    }
}
