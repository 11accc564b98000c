//! Ledger configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where block files live and how much of the chain stays in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Directory holding one file per block.
    pub directory: PathBuf,

    /// File name prefix; files are `{base_name}_{height}.{extension}`.
    pub base_name: String,

    /// File name extension, without the dot.
    pub extension: String,

    /// Byte budget for cached blocks.
    /// Default: 64 MiB.
    pub memory_budget: usize,
}

impl LedgerConfig {
    /// Default configuration rooted at `directory`.
    pub fn with_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("blocks"),
            base_name: "block".into(),
            extension: "blk".into(),
            memory_budget: 64 * 1024 * 1024,
        }
    }
}
