//! Shared test helpers for node integration tests.
//!
//! Provides deterministic transactions, pre-built block stores and
//! multi-replica clusters over a `LocalNetwork`.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use cairn_ledger::{BlockStore, LedgerConfig};
use cairn_node::{ChainReplica, LedgerClient, LocalNetwork, NodeConfig, SyncServer};
use cairn_primitives::{Block, ReplicaId, Transaction, PROTOCOL_VERSION};
use tempfile::TempDir;

// ── Transactions ──

/// Unsigned transaction whose payload names its timestamp.
pub fn make_tx(ts: i64) -> Transaction {
    Transaction::new(ts, format!("payload-{ts}").into_bytes(), PROTOCOL_VERSION, None, 64 * 1024)
        .unwrap()
}

/// Transactions with timestamps `from..=to`.
pub fn make_txs(from: i64, to: i64) -> Vec<Transaction> {
    (from..=to).map(make_tx).collect()
}

// ── Stores ──

/// Store in `dir` holding a linked chain of heights `0..len`.
pub fn store_with_chain(dir: &Path, len: u64) -> (BlockStore, Vec<Block>) {
    let store = BlockStore::open(&LedgerConfig::with_directory(dir)).unwrap();
    let mut blocks = vec![Block::genesis()];
    store.write_block(&blocks[0]).unwrap();
    for h in 1..len {
        let parent = &blocks[blocks.len() - 1];
        let txs = vec![make_tx(h as i64 * 10), make_tx(h as i64 * 10 + 1)];
        let block = Block::new(Some(parent.hash()), h, txs, 1_000 + h as i64, h.to_be_bytes().to_vec(), PROTOCOL_VERSION)
            .unwrap();
        store.write_block(&block).unwrap();
        blocks.push(block);
    }
    (store, blocks)
}

// ── Clusters ──

pub struct Member {
    pub id: ReplicaId,
    pub dir: TempDir,
    pub replica: Arc<ChainReplica>,
    pub server: SyncServer,
}

pub struct Cluster {
    pub network: Arc<LocalNetwork>,
    pub members: Vec<Member>,
}

impl Cluster {
    /// `size` replicas registered on one network with replica 0 leading.
    /// Every replica runs a sync server and knows every peer's address.
    pub fn new(size: u32, batch_size: usize) -> Self {
        let network = LocalNetwork::new(0);
        let dirs: Vec<TempDir> = (0..size).map(|_| tempfile::tempdir().unwrap()).collect();

        // bind servers first so every config can list every peer
        let servers: Vec<SyncServer> = dirs
            .iter()
            .map(|dir| {
                let store = BlockStore::open(&LedgerConfig::with_directory(dir.path())).unwrap();
                SyncServer::bind("127.0.0.1:0", store, None).unwrap()
            })
            .collect();
        let peers: std::collections::BTreeMap<ReplicaId, String> = servers
            .iter()
            .enumerate()
            .map(|(id, server)| (id as ReplicaId, server.local_addr().to_string()))
            .collect();

        let members = dirs
            .into_iter()
            .zip(servers)
            .enumerate()
            .map(|(id, (dir, server))| {
                let id = id as ReplicaId;
                let mut config = NodeConfig::default();
                config.ledger.directory = dir.path().to_path_buf();
                config.proposal.batch_size = batch_size;
                config.sync.peers = peers.clone();
                let replica = Arc::new(ChainReplica::new(config, network.endpoint(id)).unwrap());
                network.register(id, &replica);
                Member { id, dir, replica, server }
            })
            .collect();

        Self { network, members }
    }

    pub fn replica(&self, id: ReplicaId) -> &Arc<ChainReplica> {
        &self.members[id as usize].replica
    }

    pub fn client(&self, id: ReplicaId) -> LedgerClient {
        LedgerClient::new(self.network.endpoint(id))
    }

    pub fn tips(&self) -> Vec<(u64, [u8; 20])> {
        self.members
            .iter()
            .map(|m| {
                let tip = m.replica.tip();
                (tip.height(), tip.hash())
            })
            .collect()
    }
}
