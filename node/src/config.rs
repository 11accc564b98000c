//! Node configuration.
//!
//! Plain serde structs; any format the embedding process prefers can feed
//! them. Every field has a default.

use std::collections::BTreeMap;
use std::time::Duration;

use cairn_ledger::LedgerConfig;
use cairn_primitives::{ReplicaId, DEFAULT_MAX_TRANSACTION_SIZE, PROTOCOL_VERSION};
use serde::{Deserialize, Serialize};

use crate::error::NodeError;

/// Leader-side block proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProposalConfig {
    /// Transactions per proposed block.
    /// Default: 100.
    pub batch_size: usize,

    /// Pause between proposal ticks, in milliseconds.
    /// Default: 500.
    pub interval_ms: u64,
}

impl ProposalConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            interval_ms: 500,
        }
    }
}

/// Periodic chain self-check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Pause between checks, in milliseconds.
    /// Default: 5000.
    pub interval_ms: u64,
}

impl ValidatorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self { interval_ms: 5000 }
    }
}

/// Block-sync endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Address the sync server binds.
    pub listen_addr: String,

    /// Sync endpoint of every replica, keyed by replica id.
    pub peers: BTreeMap<ReplicaId, String>,

    /// Socket read/write timeout in milliseconds; `None` blocks forever.
    pub io_timeout_ms: Option<u64>,

    /// Run one sync pass against the leader when the node starts.
    pub startup_sync: bool,
}

impl SyncConfig {
    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:0".into(),
            peers: BTreeMap::new(),
            io_timeout_ms: None,
            startup_sync: false,
        }
    }
}

/// Full replica configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub ledger: LedgerConfig,
    pub proposal: ProposalConfig,
    pub validator: ValidatorConfig,
    pub sync: SyncConfig,

    /// Maximum serialized transaction size in bytes.
    /// Default: 64 KiB.
    pub max_transaction_size: usize,

    /// Version string stamped into proposed blocks.
    pub protocol_version: String,
}

impl NodeConfig {
    /// Reject settings the node cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.proposal.batch_size == 0 {
            return Err(NodeError::InvalidConfig("proposal.batch_size must be positive".into()));
        }
        if self.proposal.interval_ms == 0 {
            return Err(NodeError::InvalidConfig("proposal.interval_ms must be positive".into()));
        }
        if self.validator.interval_ms == 0 {
            return Err(NodeError::InvalidConfig("validator.interval_ms must be positive".into()));
        }
        if self.ledger.memory_budget == 0 {
            return Err(NodeError::InvalidConfig("ledger.memory_budget must be positive".into()));
        }
        if self.max_transaction_size == 0 {
            return Err(NodeError::InvalidConfig("max_transaction_size must be positive".into()));
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            proposal: ProposalConfig::default(),
            validator: ValidatorConfig::default(),
            sync: SyncConfig::default(),
            max_transaction_size: DEFAULT_MAX_TRANSACTION_SIZE,
            protocol_version: PROTOCOL_VERSION.into(),
        }
    }
}
