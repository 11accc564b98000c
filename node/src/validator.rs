//! Periodic chain self-check and repair.
//!
//! Each check walks the ledger's parent links. A broken chain triggers a
//! full-range sync from the leader followed by a reload from disk; the
//! next check shows whether that repaired it.

use std::sync::Arc;

use cairn_ledger::Ledger;
use parking_lot::Mutex;

use crate::sync::SyncClient;

/// Result of one validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Chain linkage holds.
    Valid,
    /// Chain was broken and is valid after sync and reload.
    Repaired,
    /// Chain was broken and is still broken.
    Broken,
}

/// Checks chain linkage and repairs it by syncing from the leader.
pub struct ChainValidator {
    ledger: Arc<Mutex<Ledger>>,
    sync: SyncClient,
}

impl ChainValidator {
    pub fn new(ledger: Arc<Mutex<Ledger>>, sync: SyncClient) -> Self {
        Self { ledger, sync }
    }

    /// Run one check, repairing if needed.
    pub fn check_once(&self) -> ValidationOutcome {
        // lock released before syncing: the sync path queries the leader,
        // which may be this replica
        let valid = self.ledger.lock().is_chain_valid();
        if valid {
            return ValidationOutcome::Valid;
        }

        tracing::warn!(target: "validator", "chain invalid, syncing from leader");
        match self.sync.sync_from_leader(0) {
            Ok(received) => tracing::info!(target: "validator", received, "recovery sync finished"),
            Err(e) => tracing::warn!(target: "validator", error = %e, "recovery sync failed"),
        }

        let mut ledger = self.ledger.lock();
        if let Err(e) = ledger.reload_blocks_from_disk() {
            tracing::error!(target: "validator", error = %e, "reload failed");
            return ValidationOutcome::Broken;
        }
        if ledger.is_chain_valid() {
            tracing::info!(target: "validator", tip = ledger.tip_height(), "chain repaired");
            ValidationOutcome::Repaired
        } else {
            ValidationOutcome::Broken
        }
    }
}
