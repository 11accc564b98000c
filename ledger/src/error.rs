//! Ledger error types.

use std::path::PathBuf;

use cairn_primitives::{BlockHeight, ChainError};

/// Failure of a single block-file operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File exists but its contents do not decode to a block.
    #[error("block file for height {height} is corrupt: {source}")]
    Decode {
        height: BlockHeight,
        #[source]
        source: ChainError,
    },

    /// File decoded to a block whose height disagrees with its name.
    #[error("block file for height {expected} holds height {found}")]
    HeightMismatch {
        expected: BlockHeight,
        found: BlockHeight,
    },
}

/// Result alias for block-store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure to build or rebuild the in-memory ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No block files existed and the genesis block could not be persisted.
    #[error("failed to persist genesis block: {0}")]
    Genesis(#[source] StoreError),

    /// Block files exist but none of them could be loaded.
    #[error("no readable block in {0}")]
    NoReadableBlock(PathBuf),
}

/// Result alias for ledger construction and reload.
pub type LedgerResult<T> = Result<T, LedgerError>;
