//! `cairn-ledger`: the replicated chain as seen by one replica.
//!
//! Two layers:
//!
//! - [`store::BlockStore`]: one file per block under a configured
//!   directory, named `{base_name}_{height}.{extension}`, each holding a
//!   single framed block record
//! - [`ledger::Ledger`]: an in-memory window of the most recent blocks
//!   (tip first) over the store, bounded by a byte budget, enforcing the
//!   height-ordering and chain-linkage invariants
//!
//! The ledger is an explicitly constructed value; callers that share it
//! across threads wrap it in a lock.

pub mod config;
pub mod error;
pub mod store;
pub mod ledger;

pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult, StoreError, StoreResult};
pub use ledger::Ledger;
pub use store::BlockStore;
