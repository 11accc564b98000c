//! Pending-transaction queue.
//!
//! FIFO by arrival. Requeued transactions (from a rejected proposal) are
//! merged back and the queue is re-sorted oldest-first by timestamp; the
//! sort is stable, so equal timestamps keep arrival order. A transaction
//! whose hash is already pending is never queued twice.
//!
//! Every mutation that promises a count checks the actual size delta and
//! reports a mismatch instead of hiding it. The queue itself is not
//! synchronized; the replica guards it with its pool lock.

use std::collections::{HashSet, VecDeque};

use cairn_primitives::{codec, ChainResult, Hash, Transaction};

use crate::error::MempoolError;

#[derive(Debug, Default, Clone)]
pub struct Mempool {
    queue: VecDeque<Transaction>,
    index: HashSet<Hash>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a mempool from a transaction list, dropping duplicates.
    pub fn from_transactions(txs: Vec<Transaction>) -> Self {
        let mut pool = Self::new();
        for tx in txs {
            pool.push(tx);
        }
        pool
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn contains(&self, tx_hash: &Hash) -> bool {
        self.index.contains(tx_hash)
    }

    fn push(&mut self, tx: Transaction) -> bool {
        if self.index.insert(tx.hash()) {
            self.queue.push_back(tx);
            true
        } else {
            false
        }
    }

    /// Append one transaction.
    pub fn add(&mut self, tx: Transaction) -> Result<(), MempoolError> {
        self.add_batch(vec![tx]).map(|_| ())
    }

    /// Append a batch in order. Fails if the size grew by anything other
    /// than the batch length; the transactions that were accepted stay.
    pub fn add_batch(&mut self, txs: Vec<Transaction>) -> Result<usize, MempoolError> {
        let requested = txs.len();
        let before = self.len();
        for tx in txs {
            self.push(tx);
        }
        let actual = self.len() - before;
        if actual != requested {
            return Err(MempoolError::Inconsistent { requested, actual });
        }
        Ok(actual)
    }

    /// Remove and return the `n` oldest transactions.
    pub fn take_oldest(&mut self, n: usize) -> Result<Vec<Transaction>, MempoolError> {
        if n > self.len() {
            return Err(MempoolError::Insufficient {
                requested: n,
                available: self.len(),
            });
        }
        let before = self.len();
        let taken: Vec<Transaction> = self.queue.drain(..n).collect();
        for tx in &taken {
            self.index.remove(&tx.hash());
        }
        let actual = before - self.len();
        if actual != n || taken.len() != n {
            return Err(MempoolError::Inconsistent { requested: n, actual });
        }
        Ok(taken)
    }

    /// Return transactions from a failed proposal and re-sort by timestamp.
    ///
    /// Returns how many were actually re-queued (already-pending hashes are
    /// skipped).
    pub fn requeue(&mut self, txs: Vec<Transaction>) -> usize {
        let mut added = 0;
        for tx in txs {
            if self.push(tx) {
                added += 1;
            }
        }
        self.queue.make_contiguous().sort_by_key(Transaction::timestamp);
        added
    }

    /// Pending transactions, oldest first.
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.queue.iter()
    }

    /// Serialized snapshot for checkpoint/state transfer.
    pub fn encode_snapshot(&self) -> Vec<u8> {
        let txs: Vec<Transaction> = self.queue.iter().cloned().collect();
        codec::encode_transactions(&txs)
    }

    /// Restore from [`encode_snapshot`](Self::encode_snapshot) output.
    pub fn decode_snapshot(data: &[u8], max_tx_size: usize) -> ChainResult<Self> {
        Ok(Self::from_transactions(codec::decode_transactions(data, max_tx_size)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_primitives::PROTOCOL_VERSION;

    fn tx(ts: i64) -> Transaction {
        Transaction::new(ts, ts.to_be_bytes().to_vec(), PROTOCOL_VERSION, None, 1024).unwrap()
    }

    #[test]
    fn test_fifo_take() {
        let mut pool = Mempool::new();
        pool.add_batch((1..=150).map(tx).collect()).unwrap();
        let taken = pool.take_oldest(100).unwrap();
        assert_eq!(taken.len(), 100);
        assert_eq!(taken.first().unwrap().timestamp(), 1);
        assert_eq!(taken.last().unwrap().timestamp(), 100);
        assert_eq!(pool.len(), 50);
        assert_eq!(pool.transactions().next().unwrap().timestamp(), 101);
        assert!(!pool.contains(&tx(1).hash()));
        assert!(pool.contains(&tx(150).hash()));
    }

    #[test]
    fn test_take_more_than_available() {
        let mut pool = Mempool::new();
        pool.add(tx(1)).unwrap();
        assert_eq!(
            pool.take_oldest(2),
            Err(MempoolError::Insufficient { requested: 2, available: 1 })
        );
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_duplicate_reports_inconsistency() {
        let mut pool = Mempool::new();
        pool.add(tx(1)).unwrap();
        let err = pool.add_batch(vec![tx(1), tx(2)]).unwrap_err();
        assert_eq!(err, MempoolError::Inconsistent { requested: 2, actual: 1 });
        // accepted part stays
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_requeue_sorts_oldest_first() {
        let mut pool = Mempool::new();
        pool.add_batch((1..=10).map(tx).collect()).unwrap();
        let taken = pool.take_oldest(5).unwrap();
        pool.add(tx(11)).unwrap();
        assert_eq!(pool.requeue(taken), 5);
        let order: Vec<i64> = pool.transactions().map(Transaction::timestamp).collect();
        assert_eq!(order, (1..=11).collect::<Vec<_>>());
    }

    #[test]
    fn test_requeue_skips_pending() {
        let mut pool = Mempool::new();
        pool.add(tx(3)).unwrap();
        assert_eq!(pool.requeue(vec![tx(3), tx(4)]), 1);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_snapshot_restores_order() {
        let mut pool = Mempool::new();
        pool.add_batch(vec![tx(5), tx(2), tx(9)]).unwrap();
        let restored = Mempool::decode_snapshot(&pool.encode_snapshot(), 1024).unwrap();
        let order: Vec<i64> = restored.transactions().map(Transaction::timestamp).collect();
        assert_eq!(order, vec![5, 2, 9]);
        assert!(restored.contains(&tx(9).hash()));
    }
}
