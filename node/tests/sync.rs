//! Block sync over TCP and validator repair.

mod common;

use std::sync::Arc;

use cairn_ledger::{BlockStore, LedgerConfig};
use cairn_node::sync::fetch_blocks;
use cairn_node::{
    ChainReplica, ChainValidator, LocalNetwork, NodeConfig, ProposalOutcome, SyncError, SyncServer,
    ValidationOutcome,
};
use cairn_primitives::{Block, PROTOCOL_VERSION};
use common::{make_tx, make_txs, store_with_chain, Cluster};

#[test]
fn test_fetch_range_from_server() {
    let source = tempfile::tempdir().unwrap();
    let (store, blocks) = store_with_chain(source.path(), 11);
    let server = SyncServer::bind("127.0.0.1:0", store, None).unwrap();

    let target = tempfile::tempdir().unwrap();
    let local = BlockStore::open(&LedgerConfig::with_directory(target.path())).unwrap();
    let addr = server.local_addr().to_string();
    let received = fetch_blocks(&addr, &local, 0, 5, None).unwrap();

    assert_eq!(received, 6);
    assert_eq!(local.list_heights().unwrap(), vec![0, 1, 2, 3, 4, 5]);
    for block in &blocks[..6] {
        assert_eq!(local.read_block(block.height()).unwrap().hash(), block.hash());
    }
    assert!(!local.contains(6));
}

#[test]
fn test_server_handles_sequential_clients() {
    let source = tempfile::tempdir().unwrap();
    let (store, _) = store_with_chain(source.path(), 4);
    let server = SyncServer::bind("127.0.0.1:0", store, None).unwrap();
    let addr = server.local_addr().to_string();

    for _ in 0..3 {
        let target = tempfile::tempdir().unwrap();
        let local = BlockStore::open(&LedgerConfig::with_directory(target.path())).unwrap();
        assert_eq!(fetch_blocks(&addr, &local, 1, 3, None).unwrap(), 3);
    }
}

#[test]
fn test_fetch_beyond_server_tip_fails() {
    let source = tempfile::tempdir().unwrap();
    let (store, _) = store_with_chain(source.path(), 3);
    let server = SyncServer::bind("127.0.0.1:0", store, None).unwrap();

    let target = tempfile::tempdir().unwrap();
    let local = BlockStore::open(&LedgerConfig::with_directory(target.path())).unwrap();
    let err = fetch_blocks(&server.local_addr().to_string(), &local, 0, 8, None).unwrap_err();
    assert!(matches!(err, SyncError::MissingBlock(8)));
    assert!(local.list_heights().unwrap().is_empty());
}

#[test]
fn test_fetch_rejects_inverted_range() {
    let target = tempfile::tempdir().unwrap();
    let local = BlockStore::open(&LedgerConfig::with_directory(target.path())).unwrap();
    let err = fetch_blocks("127.0.0.1:1", &local, 4, 2, None).unwrap_err();
    assert!(matches!(err, SyncError::InvalidRange { bottom: 4, top: 2 }));
}

#[test]
fn test_server_shutdown_is_idempotent() {
    let source = tempfile::tempdir().unwrap();
    let (store, _) = store_with_chain(source.path(), 1);
    let mut server = SyncServer::bind("127.0.0.1:0", store, None).unwrap();
    server.shutdown();
    server.shutdown();
}

#[test]
fn test_leader_cannot_sync_from_itself() {
    let cluster = Cluster::new(3, 2);
    let err = cluster.replica(0).sync_client().sync_from_leader(0).unwrap_err();
    assert!(matches!(err, SyncError::SelfIsLeader(0)));
}

#[test]
fn test_sync_requires_leader_address() {
    let network = LocalNetwork::new(0);
    let dirs = [tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap()];
    let replicas: Vec<Arc<ChainReplica>> = dirs
        .iter()
        .enumerate()
        .map(|(id, dir)| {
            let mut config = NodeConfig::default();
            config.ledger.directory = dir.path().to_path_buf();
            let replica = Arc::new(ChainReplica::new(config, network.endpoint(id as u32)).unwrap());
            network.register(id as u32, &replica);
            replica
        })
        .collect();

    let err = replicas[1].sync_client().sync_from_leader(0).unwrap_err();
    assert!(matches!(err, SyncError::UnknownPeer(0)));
}

#[test]
fn test_sync_from_leader_up_to_date() {
    let cluster = Cluster::new(3, 2);
    let received = cluster.replica(1).sync_client().sync_from_leader(1).unwrap();
    assert_eq!(received, 0);
}

#[test]
fn test_validator_repairs_corrupted_follower() {
    let cluster = Cluster::new(3, 2);
    cluster.client(0).add_transactions(&make_txs(1, 4)).unwrap();
    for height in 1..=2 {
        assert_eq!(
            cluster.replica(0).propose_once(),
            ProposalOutcome::Committed { height, tx_count: 2 }
        );
    }

    let follower = cluster.replica(2);
    let forged = Block::new(Some([9u8; 20]), 2, vec![make_tx(77)], 5, vec![1], PROTOCOL_VERSION).unwrap();
    follower.store().write_block(&forged).unwrap();
    follower.ledger().lock().reload_blocks_from_disk().unwrap();
    assert!(!follower.ledger().lock().is_chain_valid());

    let validator = ChainValidator::new(Arc::clone(follower.ledger()), follower.sync_client());
    assert_eq!(validator.check_once(), ValidationOutcome::Repaired);
    assert_eq!(validator.check_once(), ValidationOutcome::Valid);

    let tips = cluster.tips();
    assert_eq!(tips[2], tips[0]);
}

#[test]
fn test_validator_reports_unrepairable_chain() {
    let cluster = Cluster::new(3, 2);
    cluster.client(0).add_transactions(&make_txs(1, 2)).unwrap();
    cluster.replica(0).propose_once();

    // corrupt the leader itself: there is nobody to repair from
    let leader = cluster.replica(0);
    let forged = Block::new(Some([3u8; 20]), 1, vec![make_tx(50)], 5, vec![1], PROTOCOL_VERSION).unwrap();
    leader.store().write_block(&forged).unwrap();
    leader.ledger().lock().reload_blocks_from_disk().unwrap();

    let validator = ChainValidator::new(Arc::clone(leader.ledger()), leader.sync_client());
    assert_eq!(validator.check_once(), ValidationOutcome::Broken);
}
