//! Ordering substrate capability interface.
//!
//! The replica never talks to a consensus library directly. It consumes
//! the client-side [`Substrate`] trait (submit commands, ask who leads) and
//! exposes the server-side [`Application`] trait (execute delivered
//! commands, snapshot and restore). Any total-order broadcast service can
//! sit behind these two traits.
//!
//! - In production: an adapter over the BFT library
//! - In tests and single-process deployments: [`LocalNetwork`]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use cairn_primitives::block::GENESIS_TIMESTAMP;
use cairn_primitives::ReplicaId;
use parking_lot::Mutex;

use crate::error::SubstrateError;

/// Per-command data assigned by the substrate's agreement round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMetadata {
    /// Agreed timestamp, epoch millis.
    pub timestamp: i64,
    /// Agreed nonce.
    pub nonce: Vec<u8>,
    /// Leader of the round that ordered this command.
    pub leader: ReplicaId,
}

/// Client-side view of the substrate.
pub trait Substrate: Send + Sync {
    /// Submit a command for agreed, totally ordered delivery to every
    /// replica; returns the agreed reply.
    fn submit_ordered(&self, command: &[u8]) -> Result<Vec<u8>, SubstrateError>;

    /// Submit a command answered locally by one replica without agreement.
    fn submit_unordered(&self, command: &[u8]) -> Result<Vec<u8>, SubstrateError>;

    /// Leader of the current view.
    fn current_leader(&self) -> ReplicaId;

    /// Id of the local replica.
    fn self_id(&self) -> ReplicaId;

    /// Members of the current view.
    fn current_view(&self) -> Vec<ReplicaId>;

    fn current_view_size(&self) -> usize {
        self.current_view().len()
    }
}

/// Server-side hooks the substrate invokes on the replica.
pub trait Application: Send + Sync {
    /// Execute a command delivered through agreed ordering.
    fn execute_ordered(&self, command: &[u8], meta: &CommandMetadata) -> Vec<u8>;

    /// Execute a command delivered without agreement.
    fn execute_unordered(&self, command: &[u8], meta: &CommandMetadata) -> Vec<u8>;

    /// Application state for checkpoint/state transfer.
    fn snapshot(&self) -> Vec<u8>;

    /// Replace application state from a checkpoint.
    fn install_snapshot(&self, snapshot: &[u8]);
}

// ── LocalNetwork: in-process substrate ──

struct NetworkState {
    replicas: BTreeMap<ReplicaId, Weak<dyn Application>>,
    leader: ReplicaId,
    clock: i64,
    sequence: u64,
}

impl NetworkState {
    fn live(&self) -> Vec<(ReplicaId, Arc<dyn Application>)> {
        self.replicas
            .iter()
            .filter_map(|(id, weak)| weak.upgrade().map(|app| (*id, app)))
            .collect()
    }
}

/// Deterministic in-process substrate.
///
/// Ordered commands are delivered one at a time, in submission order, to
/// every registered replica. Each gets a logical timestamp that increases
/// by one per command and a nonce holding the big-endian sequence number.
/// The reply returned to the submitter is the one a strict majority of
/// replicas produced. Unordered commands run on the current leader only.
///
/// Replicas are held weakly; dropping a replica removes it from delivery.
pub struct LocalNetwork {
    state: Mutex<NetworkState>,
    delivery: Mutex<()>,
}

impl LocalNetwork {
    pub fn new(leader: ReplicaId) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(NetworkState {
                replicas: BTreeMap::new(),
                leader,
                clock: GENESIS_TIMESTAMP,
                sequence: 0,
            }),
            delivery: Mutex::new(()),
        })
    }

    /// Client handle acting as replica `id`.
    pub fn endpoint(self: &Arc<Self>, id: ReplicaId) -> Arc<LocalEndpoint> {
        Arc::new(LocalEndpoint {
            network: Arc::clone(self),
            id,
        })
    }

    /// Add `app` to the delivery set as replica `id`.
    pub fn register<A: Application + 'static>(&self, id: ReplicaId, app: &Arc<A>) {
        let weak: Weak<dyn Application> = Arc::downgrade(app) as Weak<dyn Application>;
        self.state.lock().replicas.insert(id, weak);
    }

    /// Remove replica `id` from the delivery set.
    pub fn deregister(&self, id: ReplicaId) {
        self.state.lock().replicas.remove(&id);
    }

    pub fn set_leader(&self, id: ReplicaId) {
        self.state.lock().leader = id;
    }

    pub fn leader(&self) -> ReplicaId {
        self.state.lock().leader
    }

    /// Ids of live registered replicas.
    pub fn view(&self) -> Vec<ReplicaId> {
        self.state.lock().live().into_iter().map(|(id, _)| id).collect()
    }

    /// Copy the application snapshot of `from` into `to`.
    pub fn transfer_state(&self, from: ReplicaId, to: ReplicaId) -> Result<(), SubstrateError> {
        let (source, target) = {
            let state = self.state.lock();
            let find = |id: ReplicaId| {
                state
                    .replicas
                    .get(&id)
                    .and_then(Weak::upgrade)
                    .ok_or(SubstrateError::Unavailable(id))
            };
            (find(from)?, find(to)?)
        };
        target.install_snapshot(&source.snapshot());
        Ok(())
    }

    fn order(&self, command: &[u8]) -> Result<Vec<u8>, SubstrateError> {
        let _turn = self.delivery.lock();
        let (meta, targets) = {
            let mut state = self.state.lock();
            state.clock += 1;
            state.sequence += 1;
            let meta = CommandMetadata {
                timestamp: state.clock,
                nonce: state.sequence.to_be_bytes().to_vec(),
                leader: state.leader,
            };
            (meta, state.live())
        };
        if targets.is_empty() {
            return Err(SubstrateError::NoReplicas);
        }

        let mut tally: HashMap<Vec<u8>, usize> = HashMap::new();
        for (_, app) in &targets {
            *tally.entry(app.execute_ordered(command, &meta)).or_insert(0) += 1;
        }
        tally
            .into_iter()
            .find(|(_, votes)| *votes * 2 > targets.len())
            .map(|(reply, _)| reply)
            .ok_or(SubstrateError::NoQuorum {
                replicas: targets.len(),
            })
    }

    fn query_leader(&self, command: &[u8]) -> Result<Vec<u8>, SubstrateError> {
        let (meta, app) = {
            let state = self.state.lock();
            let app = state
                .replicas
                .get(&state.leader)
                .and_then(Weak::upgrade)
                .ok_or(SubstrateError::Unavailable(state.leader))?;
            let meta = CommandMetadata {
                timestamp: state.clock,
                nonce: Vec::new(),
                leader: state.leader,
            };
            (meta, app)
        };
        Ok(app.execute_unordered(command, &meta))
    }
}

/// A replica's client handle onto a [`LocalNetwork`].
pub struct LocalEndpoint {
    network: Arc<LocalNetwork>,
    id: ReplicaId,
}

impl LocalEndpoint {
    pub fn network(&self) -> &Arc<LocalNetwork> {
        &self.network
    }
}

impl Substrate for LocalEndpoint {
    fn submit_ordered(&self, command: &[u8]) -> Result<Vec<u8>, SubstrateError> {
        self.network.order(command)
    }

    fn submit_unordered(&self, command: &[u8]) -> Result<Vec<u8>, SubstrateError> {
        self.network.query_leader(command)
    }

    fn current_leader(&self) -> ReplicaId {
        self.network.leader()
    }

    fn self_id(&self) -> ReplicaId {
        self.id
    }

    fn current_view(&self) -> Vec<ReplicaId> {
        self.network.view()
    }
}
