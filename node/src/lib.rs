//! `cairn-node`: a Cairn ledger replica.
//!
//! The replica runs as the application layer of a total-order broadcast
//! substrate. Delivered commands mutate the mempool and ledger; a
//! leader-only proposal loop turns mempool batches into agreed blocks; a
//! validator loop re-checks chain linkage and repairs it through block
//! sync.
//!
//! ## Architecture
//!
//! - [`substrate`]: capability traits consumed from the ordering service,
//!   plus [`substrate::LocalNetwork`], an in-process implementation
//! - [`mempool::Mempool`]: pending-transaction queue
//! - [`replica::ChainReplica`]: command dispatch, proposal pipeline,
//!   snapshot hooks
//! - [`validator::ChainValidator`]: chain self-check and repair
//! - [`sync`]: block-range transfer client and server
//! - [`task::BackgroundTask`]: cancellable background threads
//! - [`node::Node`]: wires the above into a running replica
//! - [`client::LedgerClient`]: typed requests over a substrate
//!
//! Embedding processes call [`telemetry::init_tracing`] once at startup to
//! install the JSON log subscriber; the library itself only emits events.

pub mod error;
pub mod config;
pub mod telemetry;
pub mod substrate;
pub mod mempool;
pub mod task;
pub mod sync;
pub mod replica;
pub mod validator;
pub mod client;
pub mod node;

pub use client::LedgerClient;
pub use config::{NodeConfig, ProposalConfig, SyncConfig, ValidatorConfig};
pub use error::{ClientError, MempoolError, NodeError, SubstrateError, SyncError};
pub use mempool::Mempool;
pub use node::Node;
pub use replica::{ChainReplica, ProposalOutcome};
pub use substrate::{Application, CommandMetadata, LocalEndpoint, LocalNetwork, Substrate};
pub use sync::{SyncClient, SyncServer};
pub use task::BackgroundTask;
pub use validator::{ChainValidator, ValidationOutcome};
