//! Replica process wiring.
//!
//! [`Node::start`] builds the replica and starts its background work:
//! the sync server, the proposal loop, the validator loop, and (if
//! configured) a one-shot startup sync. [`Node::shutdown`] stops them in
//! reverse order.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::replica::{ChainReplica, ProposalOutcome};
use crate::substrate::Substrate;
use crate::sync::SyncServer;
use crate::task::BackgroundTask;
use crate::validator::{ChainValidator, ValidationOutcome};

/// A running replica with its sync server and background loops.
pub struct Node {
    replica: Arc<ChainReplica>,
    sync_server: Option<SyncServer>,
    proposer: Option<BackgroundTask>,
    validator: Option<BackgroundTask>,
}

impl Node {
    /// Start a replica over `substrate`.
    ///
    /// The caller still registers [`Node::replica`] with the substrate as
    /// the application receiving delivered commands.
    pub fn start(config: NodeConfig, substrate: Arc<dyn Substrate>) -> Result<Self, NodeError> {
        let replica = Arc::new(ChainReplica::new(config, substrate)?);
        let config = replica.config().clone();

        let sync_server = SyncServer::bind(
            &config.sync.listen_addr,
            replica.store().clone(),
            config.sync.io_timeout(),
        )?;

        let proposing = Arc::clone(&replica);
        let proposer = BackgroundTask::spawn_periodic("proposer", config.proposal.interval(), move || {
            if let ProposalOutcome::Committed { height, tx_count } = proposing.propose_once() {
                tracing::info!(target: "node", height, tx_count, "proposed block committed");
            }
        })?;

        let checker = ChainValidator::new(Arc::clone(replica.ledger()), replica.sync_client());
        let validator = BackgroundTask::spawn_periodic("validator", config.validator.interval(), move || {
            if checker.check_once() == ValidationOutcome::Broken {
                tracing::error!(target: "node", "chain still invalid after recovery");
            }
        })?;

        if config.sync.startup_sync {
            replica.start_catch_up();
        }

        tracing::info!(
            target: "node",
            id = replica.id(),
            sync_addr = %sync_server.local_addr(),
            "node started"
        );
        Ok(Self {
            replica,
            sync_server: Some(sync_server),
            proposer: Some(proposer),
            validator: Some(validator),
        })
    }

    pub fn replica(&self) -> &Arc<ChainReplica> {
        &self.replica
    }

    /// Address the sync server is bound to.
    pub fn sync_addr(&self) -> Option<SocketAddr> {
        self.sync_server.as_ref().map(SyncServer::local_addr)
    }

    /// Stop background work and join every thread. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(mut task) = self.validator.take() {
            task.stop();
        }
        if let Some(mut task) = self.proposer.take() {
            task.stop();
        }
        self.replica.shutdown();
        if let Some(mut server) = self.sync_server.take() {
            server.shutdown();
        }
        tracing::info!(target: "node", id = self.replica.id(), "node stopped");
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shutdown();
    }
}
