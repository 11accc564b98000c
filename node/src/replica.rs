//! The replica: command dispatch, block proposal and snapshot hooks.
//!
//! ## Proposal exchange
//!
//! 1. The replica that believes it leads takes the oldest `batch_size`
//!    transactions from its mempool, builds a candidate on its tip with a
//!    placeholder timestamp and nonce, records it as pending, and submits a
//!    `NewBlock` envelope through ordered delivery.
//! 2. Every replica receives the envelope with the round's metadata and
//!    restamps the block with the agreed timestamp and nonce, so all of
//!    them see identical block bytes.
//! 3. The proposer's own copy replaces its pending candidate. A follower
//!    builds a candidate from its own mempool and commits the proposal only
//!    if the transaction sets agree; otherwise it returns its candidate's
//!    transactions to the mempool and votes no. A proposal matching the
//!    tip is a replay and is acknowledged without touching the mempool.
//! 4. On a majority yes the proposer commits its stamped candidate; on
//!    anything else it requeues the transactions and retries next tick.
//!
//! Which replica leads is tracked from delivered metadata and is advisory:
//! it only decides who attempts a proposal. A proposal whose sender is not
//! the leader of the delivering round is refused by everyone.
//!
//! ## Locking
//!
//! The pool lock (mempool + pending candidate) is always taken before the
//! ledger lock. No lock is held across a substrate call.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use cairn_ledger::{BlockStore, Ledger};
use cairn_primitives::codec::{decode_message, decode_reply, decode_transaction, encode_message, encode_reply};
use cairn_primitives::{
    hash_to_hex, Block, BlockHeight, ClientRequest, Hash, Message, Reply, ReplicaId, Transaction,
    TransactionStatus,
};
use parking_lot::Mutex;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::mempool::Mempool;
use crate::substrate::{Application, CommandMetadata, Substrate};
use crate::sync::SyncClient;
use crate::task::BackgroundTask;

/// Result of one proposal tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalOutcome {
    /// This replica does not believe it leads.
    NotLeader,
    /// A candidate is already in flight.
    CandidatePending,
    /// Not enough pending transactions for a batch.
    Waiting { pending: usize },
    /// The candidate was agreed and committed.
    Committed { height: BlockHeight, tx_count: u32 },
    /// The candidate was refused; its transactions went back to the mempool.
    Rejected { requeued: usize },
}

#[derive(Debug)]
struct Candidate {
    block: Block,
    /// Carries the agreed timestamp and nonce.
    stamped: bool,
}

#[derive(Debug, Default)]
struct PoolState {
    mempool: Mempool,
    pending: Option<Candidate>,
}

/// Application half of one replica: mempool, ledger and proposal state.
pub struct ChainReplica {
    config: NodeConfig,
    substrate: Arc<dyn Substrate>,
    ledger: Arc<Mutex<Ledger>>,
    store: BlockStore,
    pool: Mutex<PoolState>,
    last_leader: AtomicU32,
    catch_up: Mutex<Option<BackgroundTask>>,
}

impl ChainReplica {
    /// Open the ledger and build a replica over `substrate`.
    pub fn new(config: NodeConfig, substrate: Arc<dyn Substrate>) -> Result<Self, NodeError> {
        config.validate()?;
        let ledger = Ledger::open(&config.ledger)?;
        let store = ledger.store().clone();
        let leader = substrate.current_leader();
        tracing::info!(
            target: "replica",
            id = substrate.self_id(),
            leader,
            tip = ledger.tip_height(),
            "replica ready"
        );
        Ok(Self {
            config,
            substrate,
            ledger: Arc::new(Mutex::new(ledger)),
            store,
            pool: Mutex::new(PoolState::default()),
            last_leader: AtomicU32::new(leader),
            catch_up: Mutex::new(None),
        })
    }

    pub fn id(&self) -> ReplicaId {
        self.substrate.self_id()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Shared handle to the ledger.
    pub fn ledger(&self) -> &Arc<Mutex<Ledger>> {
        &self.ledger
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn substrate(&self) -> &Arc<dyn Substrate> {
        &self.substrate
    }

    /// Sync client bound to this replica's store and peers.
    pub fn sync_client(&self) -> SyncClient {
        SyncClient::new(Arc::clone(&self.substrate), self.store.clone(), &self.config.sync)
    }

    /// Clone of the tip block.
    pub fn tip(&self) -> Block {
        self.ledger.lock().most_recent_block().clone()
    }

    pub fn last_leader(&self) -> ReplicaId {
        self.last_leader.load(Ordering::SeqCst)
    }

    /// Record the leader reported by a delivered command.
    pub fn observe_leader(&self, leader: ReplicaId) {
        let previous = self.last_leader.swap(leader, Ordering::SeqCst);
        if previous != leader {
            tracing::info!(target: "replica", id = self.id(), previous, leader, "leader changed");
        }
    }

    pub fn is_leader(&self) -> bool {
        self.last_leader() == self.id()
    }

    pub fn mempool_len(&self) -> usize {
        self.pool.lock().mempool.len()
    }

    pub fn mempool_contains(&self, tx_hash: &Hash) -> bool {
        self.pool.lock().mempool.contains(tx_hash)
    }

    pub fn has_pending_candidate(&self) -> bool {
        self.pool.lock().pending.is_some()
    }

    // ── Proposal pipeline ──

    /// Run one proposal tick.
    pub fn propose_once(&self) -> ProposalOutcome {
        let self_id = self.id();
        if !self.is_leader() {
            return ProposalOutcome::NotLeader;
        }

        let block = {
            let mut pool = self.pool.lock();
            if pool.pending.is_some() {
                return ProposalOutcome::CandidatePending;
            }
            let batch = self.config.proposal.batch_size;
            if pool.mempool.len() < batch {
                return ProposalOutcome::Waiting {
                    pending: pool.mempool.len(),
                };
            }
            let txs = match pool.mempool.take_oldest(batch) {
                Ok(txs) => txs,
                Err(e) => {
                    tracing::error!(target: "replica", error = %e, "failed to take proposal batch");
                    return ProposalOutcome::Waiting {
                        pending: pool.mempool.len(),
                    };
                }
            };
            let ledger = self.ledger.lock();
            let Some(block) = self.build_candidate(ledger.most_recent_block(), &mut pool.mempool, txs) else {
                return ProposalOutcome::Rejected { requeued: batch };
            };
            pool.pending = Some(Candidate {
                block: block.clone(),
                stamped: false,
            });
            block
        };

        tracing::debug!(
            target: "replica",
            id = self_id,
            height = block.height(),
            txs = block.tx_count(),
            "proposing block"
        );
        let envelope = encode_message(&Message::NewBlock {
            sender: self_id,
            block,
        });
        let accepted = match self.substrate.submit_ordered(&envelope) {
            Ok(reply) => matches!(decode_reply(&reply), Ok(r) if r.is_ack()),
            Err(e) => {
                tracing::warn!(target: "replica", id = self_id, error = %e, "proposal submission failed");
                false
            }
        };

        let mut pool = self.pool.lock();
        let Some(candidate) = pool.pending.take() else {
            // settled by a concurrent proposal exchange
            return ProposalOutcome::Rejected { requeued: 0 };
        };
        if accepted && candidate.stamped {
            let height = candidate.block.height();
            let tx_count = candidate.block.tx_count();
            let txs = candidate.block.ordered_transactions();
            if self.ledger.lock().add_block(candidate.block) {
                return ProposalOutcome::Committed { height, tx_count };
            }
            tracing::warn!(target: "replica", id = self_id, height, "agreed block not committed locally");
            let requeued = pool.mempool.requeue(txs);
            return ProposalOutcome::Rejected { requeued };
        }
        if accepted {
            tracing::warn!(target: "replica", id = self_id, "proposal agreed but own copy never delivered");
        }
        let requeued = pool.mempool.requeue(candidate.block.ordered_transactions());
        tracing::info!(target: "replica", id = self_id, requeued, "proposal rejected");
        ProposalOutcome::Rejected { requeued }
    }

    /// Build a candidate above `tip`. On failure the transactions go back
    /// to the mempool.
    fn build_candidate(&self, tip: &Block, mempool: &mut Mempool, txs: Vec<Transaction>) -> Option<Block> {
        match Block::new(
            Some(tip.hash()),
            tip.height() + 1,
            txs.clone(),
            0,
            Vec::new(),
            self.config.protocol_version.as_str(),
        ) {
            Ok(block) => Some(block),
            Err(e) => {
                tracing::error!(target: "replica", error = %e, "candidate construction failed");
                mempool.requeue(txs);
                None
            }
        }
    }

    // ── Command dispatch ──

    fn dispatch(&self, command: &[u8], meta: &CommandMetadata, ordered: bool) -> Reply {
        self.observe_leader(meta.leader);
        let message = match decode_message(command) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(target: "replica", error = %e, "undecodable command");
                return Reply::Error(e.to_string());
            }
        };
        match message {
            Message::Client(request) => self.handle_client(request, ordered),
            Message::NewBlock { sender, block } if ordered => self.on_new_block(sender, block, meta),
            Message::NewBlock { sender, .. } => {
                tracing::warn!(target: "replica", sender, "ignoring unordered block proposal");
                Reply::Bool(false)
            }
        }
    }

    fn handle_client(&self, request: ClientRequest, ordered: bool) -> Reply {
        if !ordered && !request.is_read_only() {
            tracing::warn!(target: "replica", "ignoring transaction submitted without ordering");
            return Reply::Bool(false);
        }
        match request {
            ClientRequest::GetMostRecentBlock => Reply::Block(self.tip()),
            ClientRequest::GetMostRecentBlockSummary => Reply::Summary(self.tip().summary()),
            ClientRequest::GetBlock(height) => {
                self.ledger.lock().get_block(height).map_or(Reply::NotFound, Reply::Block)
            }
            ClientRequest::GetBlockSummary(height) => self
                .ledger
                .lock()
                .get_block(height)
                .map_or(Reply::NotFound, |b| Reply::Summary(b.summary())),
            ClientRequest::GetMostRecentBlockHeight => Reply::Height(self.ledger.lock().tip_height()),
            ClientRequest::AddTransaction(raw) => self.add_transactions(vec![raw]),
            ClientRequest::AddTransactions(raw) => self.add_transactions(raw),
            ClientRequest::IsChainValid => Reply::Bool(self.ledger.lock().is_chain_valid()),
            ClientRequest::GetLeader => Reply::Leader(self.last_leader()),
            ClientRequest::TransactionStatus(hash) => Reply::TxStatus(self.transaction_status(&hash)),
            ClientRequest::NumberNodes => {
                Reply::Count(u32::try_from(self.substrate.current_view_size()).unwrap_or(u32::MAX))
            }
        }
    }

    fn add_transactions(&self, raw: Vec<Vec<u8>>) -> Reply {
        let mut txs = Vec::with_capacity(raw.len());
        for bytes in &raw {
            match decode_transaction(bytes, self.config.max_transaction_size) {
                Ok(tx) => txs.push(tx),
                Err(e) => {
                    tracing::warn!(target: "replica", error = %e, "rejecting transaction");
                    return Reply::Bool(false);
                }
            }
        }
        let mut pool = self.pool.lock();
        match pool.mempool.add_batch(txs) {
            Ok(added) => {
                tracing::debug!(target: "replica", added, pending = pool.mempool.len(), "transactions queued");
                Reply::Bool(true)
            }
            Err(e) => {
                tracing::error!(target: "replica", error = %e, "mempool add failed");
                Reply::Bool(false)
            }
        }
    }

    fn transaction_status(&self, tx_hash: &Hash) -> TransactionStatus {
        {
            let pool = self.pool.lock();
            let in_flight = pool
                .pending
                .as_ref()
                .is_some_and(|c| c.block.contains_transaction(tx_hash));
            if in_flight || pool.mempool.contains(tx_hash) {
                return TransactionStatus::InPool;
            }
        }
        match self.ledger.lock().find_transaction(tx_hash) {
            Some(height) => TransactionStatus::InBlock(height),
            None => TransactionStatus::Unknown,
        }
    }

    fn on_new_block(&self, sender: ReplicaId, block: Block, meta: &CommandMetadata) -> Reply {
        if sender != meta.leader {
            tracing::warn!(target: "replica", sender, leader = meta.leader, "proposal from non-leader refused");
            return Reply::Bool(false);
        }
        let mut pool = self.pool.lock();
        if sender == self.id() {
            let block = block.restamp(meta.timestamp, meta.nonce.clone());
            pool.pending = Some(Candidate { block, stamped: true });
            return Reply::Bool(true);
        }

        let mut ledger = self.ledger.lock();
        // compared before restamping: a replay arrives with a different stamp
        let tip = ledger.most_recent_block();
        if tip.height() == block.height()
            && tip.previous_hash() == block.previous_hash()
            && tip.same_transactions(&block)
        {
            tracing::debug!(target: "replica", sender, height = block.height(), "proposal already applied");
            return Reply::Bool(true);
        }
        let block = block.restamp(meta.timestamp, meta.nonce.clone());

        if pool.pending.is_none() {
            let n = self.config.proposal.batch_size.min(pool.mempool.len());
            if n > 0 {
                match pool.mempool.take_oldest(n) {
                    Ok(txs) => {
                        let own = self.build_candidate(ledger.most_recent_block(), &mut pool.mempool, txs);
                        pool.pending = own.map(|block| Candidate { block, stamped: false });
                    }
                    Err(e) => tracing::error!(target: "replica", error = %e, "failed to take candidate batch"),
                }
            }
        }

        let Some(candidate) = pool.pending.take() else {
            tracing::info!(target: "replica", sender, height = block.height(), "no local candidate to match proposal");
            return Reply::Bool(false);
        };
        let matches = candidate.block.height() == block.height()
            && candidate.block.previous_hash() == block.previous_hash()
            && candidate.block.same_transactions(&block);
        if matches {
            let height = block.height();
            let hash = block.hash();
            if ledger.add_block(block) {
                tracing::debug!(target: "replica", sender, height, hash = %hash_to_hex(&hash), "accepted proposal");
                return Reply::Bool(true);
            }
        } else {
            tracing::info!(target: "replica", sender, height = block.height(), "proposal does not match local candidate");
        }
        pool.mempool.requeue(candidate.block.ordered_transactions());
        Reply::Bool(false)
    }

    // ── Catch-up ──

    /// Start a one-shot background sync of every block above the local tip,
    /// followed by a ledger reload. No-op while a previous one still runs.
    pub fn start_catch_up(&self) {
        let mut slot = self.catch_up.lock();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            tracing::debug!(target: "replica", "catch-up already running");
            return;
        }
        let client = self.sync_client();
        let ledger = Arc::clone(&self.ledger);
        let bottom = ledger.lock().tip_height() + 1;
        let spawned = BackgroundTask::spawn_once("catch-up", move || match client.sync_from_leader(bottom) {
            Ok(0) => {}
            Ok(received) => {
                if let Err(e) = ledger.lock().reload_blocks_from_disk() {
                    tracing::warn!(target: "replica", error = %e, "reload after catch-up failed");
                } else {
                    tracing::info!(target: "replica", received, "caught up");
                }
            }
            Err(e) => tracing::warn!(target: "replica", error = %e, "catch-up sync failed"),
        });
        match spawned {
            Ok(task) => *slot = Some(task),
            Err(e) => tracing::error!(target: "replica", error = %e, "failed to spawn catch-up"),
        }
    }

    /// Join any running catch-up task.
    pub fn shutdown(&self) {
        if let Some(mut task) = self.catch_up.lock().take() {
            task.stop();
        }
    }
}

impl Application for ChainReplica {
    fn execute_ordered(&self, command: &[u8], meta: &CommandMetadata) -> Vec<u8> {
        encode_reply(&self.dispatch(command, meta, true))
    }

    fn execute_unordered(&self, command: &[u8], meta: &CommandMetadata) -> Vec<u8> {
        encode_reply(&self.dispatch(command, meta, false))
    }

    fn snapshot(&self) -> Vec<u8> {
        self.pool.lock().mempool.encode_snapshot()
    }

    fn install_snapshot(&self, snapshot: &[u8]) {
        match Mempool::decode_snapshot(snapshot, self.config.max_transaction_size) {
            Ok(mempool) => {
                let mut pool = self.pool.lock();
                tracing::info!(target: "replica", pending = mempool.len(), "installing snapshot");
                pool.mempool = mempool;
                pool.pending = None;
            }
            Err(e) => {
                tracing::error!(target: "replica", error = %e, "undecodable snapshot");
                return;
            }
        }
        if let Err(e) = self.ledger.lock().reload_blocks_from_disk() {
            tracing::warn!(target: "replica", error = %e, "reload after snapshot failed");
        }
        self.start_catch_up();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::LocalNetwork;
    use cairn_primitives::codec::encode_transaction;
    use cairn_primitives::PROTOCOL_VERSION;

    fn config_in(dir: &std::path::Path, batch: usize) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.ledger.directory = dir.to_path_buf();
        config.proposal.batch_size = batch;
        config
    }

    fn tx(ts: i64) -> Transaction {
        Transaction::new(ts, format!("tx-{ts}").into_bytes(), PROTOCOL_VERSION, None, 1024).unwrap()
    }

    fn meta(leader: ReplicaId) -> CommandMetadata {
        CommandMetadata {
            timestamp: 1_700_000_000_000,
            nonce: vec![1],
            leader,
        }
    }

    fn add_command(txs: &[Transaction]) -> Vec<u8> {
        encode_message(&Message::Client(ClientRequest::AddTransactions(
            txs.iter().map(encode_transaction).collect(),
        )))
    }

    fn solo(batch: usize) -> (tempfile::TempDir, Arc<LocalNetwork>, Arc<ChainReplica>) {
        let dir = tempfile::tempdir().unwrap();
        let net = LocalNetwork::new(0);
        let replica = Arc::new(ChainReplica::new(config_in(dir.path(), batch), net.endpoint(0)).unwrap());
        net.register(0, &replica);
        (dir, net, replica)
    }

    fn reply_of(bytes: Vec<u8>) -> Reply {
        decode_reply(&bytes).unwrap()
    }

    #[test]
    fn test_unordered_add_ignored() {
        let (_dir, _net, replica) = solo(10);
        let reply = reply_of(replica.execute_unordered(&add_command(&[tx(1)]), &meta(0)));
        assert_eq!(reply, Reply::Bool(false));
        assert_eq!(replica.mempool_len(), 0);
    }

    #[test]
    fn test_ordered_add_queues() {
        let (_dir, _net, replica) = solo(10);
        let reply = reply_of(replica.execute_ordered(&add_command(&[tx(1), tx(2)]), &meta(0)));
        assert_eq!(reply, Reply::Bool(true));
        assert_eq!(replica.mempool_len(), 2);
    }

    #[test]
    fn test_oversized_transaction_leaves_mempool_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let net = LocalNetwork::new(0);
        let mut config = config_in(dir.path(), 10);
        config.max_transaction_size = 128;
        let replica = Arc::new(ChainReplica::new(config, net.endpoint(0)).unwrap());
        replica.execute_ordered(&add_command(&[tx(1)]), &meta(0));

        let big = Transaction::new(2, vec![0u8; 512], PROTOCOL_VERSION, None, 4096).unwrap();
        let reply = reply_of(replica.execute_ordered(&add_command(&[tx(3), big]), &meta(0)));
        assert_eq!(reply, Reply::Bool(false));
        assert_eq!(replica.mempool_len(), 1);
    }

    #[test]
    fn test_duplicate_add_reports_failure() {
        let (_dir, _net, replica) = solo(10);
        replica.execute_ordered(&add_command(&[tx(1)]), &meta(0));
        let reply = reply_of(replica.execute_ordered(&add_command(&[tx(1), tx(2)]), &meta(0)));
        assert_eq!(reply, Reply::Bool(false));
        assert_eq!(replica.mempool_len(), 2);
    }

    #[test]
    fn test_batch_of_100_from_150() {
        let (_dir, net, replica) = solo(100);
        let txs: Vec<Transaction> = (1..=150).map(tx).collect();
        net.endpoint(0).submit_ordered(&add_command(&txs)).unwrap();

        let outcome = replica.propose_once();
        assert_eq!(outcome, ProposalOutcome::Committed { height: 1, tx_count: 100 });
        assert_eq!(replica.mempool_len(), 50);
        let tip = replica.tip();
        assert_eq!(tip.tx_count(), 100);
        for t in &txs[..100] {
            assert!(tip.contains_transaction(&t.hash()));
        }
        for t in &txs[100..] {
            assert!(replica.mempool_contains(&t.hash()));
        }
        assert!(!replica.has_pending_candidate());
    }

    #[test]
    fn test_committed_block_carries_agreed_stamp() {
        let (_dir, net, replica) = solo(2);
        net.endpoint(0).submit_ordered(&add_command(&[tx(1), tx(2)])).unwrap();
        replica.propose_once();
        let tip = replica.tip();
        assert_ne!(tip.header().timestamp, 0);
        assert!(!tip.header().nonce.is_empty());
        assert_eq!(tip.previous_hash(), Some(Block::genesis().hash()));
    }

    #[test]
    fn test_waits_for_full_batch() {
        let (_dir, net, replica) = solo(5);
        net.endpoint(0).submit_ordered(&add_command(&[tx(1), tx(2)])).unwrap();
        assert_eq!(replica.propose_once(), ProposalOutcome::Waiting { pending: 2 });
    }

    #[test]
    fn test_follower_does_not_propose() {
        let (_dir, _net, replica) = solo(1);
        replica.observe_leader(4);
        assert_eq!(replica.propose_once(), ProposalOutcome::NotLeader);
    }

    #[test]
    fn test_proposal_from_non_leader_refused() {
        let (_dir, _net, replica) = solo(1);
        let block = Block::new(Some(Block::genesis().hash()), 1, vec![tx(1)], 0, Vec::new(), PROTOCOL_VERSION)
            .unwrap();
        let cmd = encode_message(&Message::NewBlock { sender: 3, block });
        assert_eq!(reply_of(replica.execute_ordered(&cmd, &meta(0))), Reply::Bool(false));
        assert_eq!(replica.tip().height(), 0);
    }

    #[test]
    fn test_replayed_proposal_accepted_as_applied() {
        let dir = tempfile::tempdir().unwrap();
        let net = LocalNetwork::new(0);
        let follower = ChainReplica::new(config_in(dir.path(), 2), net.endpoint(1)).unwrap();
        follower.execute_ordered(&add_command(&[tx(1), tx(2), tx(3), tx(4)]), &meta(0));

        let block = Block::new(Some(Block::genesis().hash()), 1, vec![tx(1), tx(2)], 0, Vec::new(), PROTOCOL_VERSION)
            .unwrap();
        let cmd = encode_message(&Message::NewBlock { sender: 0, block });
        let round = |timestamp: i64| CommandMetadata {
            timestamp,
            nonce: timestamp.to_be_bytes().to_vec(),
            leader: 0,
        };

        assert_eq!(reply_of(follower.execute_ordered(&cmd, &round(100))), Reply::Bool(true));
        let committed = follower.tip();
        assert_eq!(reply_of(follower.execute_ordered(&cmd, &round(101))), Reply::Bool(true));

        assert_eq!(follower.tip(), committed);
        assert_eq!(committed.header().timestamp, 100);
        assert_eq!(follower.mempool_len(), 2);
        assert!(follower.mempool_contains(&tx(3).hash()));
        assert!(!follower.has_pending_candidate());
    }

    #[test]
    fn test_transaction_status() {
        let (_dir, net, replica) = solo(1);
        let ep = net.endpoint(0);
        ep.submit_ordered(&add_command(&[tx(1)])).unwrap();
        let status = |t: &Transaction| {
            let cmd = encode_message(&Message::Client(ClientRequest::TransactionStatus(t.hash())));
            reply_of(ep.submit_unordered(&cmd).unwrap())
        };
        assert_eq!(status(&tx(1)), Reply::TxStatus(TransactionStatus::InPool));
        replica.propose_once();
        assert_eq!(status(&tx(1)), Reply::TxStatus(TransactionStatus::InBlock(1)));
        assert_eq!(status(&tx(9)), Reply::TxStatus(TransactionStatus::Unknown));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (_dir, net, replica) = solo(10);
        net.endpoint(0).submit_ordered(&add_command(&[tx(1), tx(2), tx(3)])).unwrap();

        let dir2 = tempfile::tempdir().unwrap();
        let other = ChainReplica::new(config_in(dir2.path(), 10), net.endpoint(0)).unwrap();
        other.install_snapshot(&replica.snapshot());
        other.shutdown();
        assert_eq!(other.mempool_len(), 3);
        assert!(other.mempool_contains(&tx(2).hash()));
    }

    #[test]
    fn test_undecodable_command() {
        let (_dir, _net, replica) = solo(1);
        assert!(matches!(reply_of(replica.execute_ordered(&[0xff], &meta(0))), Reply::Error(_)));
    }
}
