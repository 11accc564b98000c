//! One-file-per-block durable storage.
//!
//! Each file holds exactly one framed block record (see
//! [`cairn_primitives::codec`]). Writes go to a uniquely named temporary
//! file in the same directory and are renamed into place, so a reader sees
//! either the old file or the complete new one, and concurrent writers of
//! one height never share a temporary path.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use cairn_primitives::codec::{decode_block_record, encode_block_record};
use cairn_primitives::{Block, BlockHeight};

use crate::config::LedgerConfig;
use crate::error::{StoreError, StoreResult};

/// Handle to a block-file directory.
///
/// Cheap to clone; clones address the same directory.
#[derive(Debug, Clone)]
pub struct BlockStore {
    directory: PathBuf,
    base_name: String,
    extension: String,
}

impl BlockStore {
    /// Open (creating if needed) the directory named by `config`.
    pub fn open(config: &LedgerConfig) -> StoreResult<Self> {
        fs::create_dir_all(&config.directory).map_err(|source| StoreError::Io {
            path: config.directory.clone(),
            source,
        })?;
        Ok(Self {
            directory: config.directory.clone(),
            base_name: config.base_name.clone(),
            extension: config.extension.clone(),
        })
    }

    /// Directory holding the block files.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File path for the block at `height`.
    pub fn path_for(&self, height: BlockHeight) -> PathBuf {
        self.directory
            .join(format!("{}_{}.{}", self.base_name, height, self.extension))
    }

    /// Returns true if a file exists for `height`.
    pub fn contains(&self, height: BlockHeight) -> bool {
        self.path_for(height).is_file()
    }

    /// Persist `block` under its own height, replacing any existing file.
    pub fn write_block(&self, block: &Block) -> StoreResult<()> {
        let path = self.path_for(block.height());
        let io_err = |source: std::io::Error| StoreError::Io {
            path: path.clone(),
            source,
        };
        let mut tmp = NamedTempFile::new_in(&self.directory).map_err(io_err)?;
        tmp.write_all(&encode_block_record(block)).map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;
        tracing::debug!(
            target: "ledger",
            height = block.height(),
            path = %path.display(),
            "block persisted"
        );
        Ok(())
    }

    /// Read and decode the block stored for `height`.
    pub fn read_block(&self, height: BlockHeight) -> StoreResult<Block> {
        let path = self.path_for(height);
        let data = fs::read(&path).map_err(|source| StoreError::Io { path, source })?;
        let block =
            decode_block_record(&data).map_err(|source| StoreError::Decode { height, source })?;
        if block.height() != height {
            return Err(StoreError::HeightMismatch {
                expected: height,
                found: block.height(),
            });
        }
        Ok(block)
    }

    /// Heights for which a block file exists, ascending.
    ///
    /// Files whose names do not match `{base_name}_{height}.{extension}`
    /// are ignored.
    pub fn list_heights(&self) -> StoreResult<Vec<BlockHeight>> {
        let entries = fs::read_dir(&self.directory).map_err(|source| StoreError::Io {
            path: self.directory.clone(),
            source,
        })?;
        let mut heights = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.directory.clone(),
                source,
            })?;
            if let Some(height) = entry.file_name().to_str().and_then(|n| self.parse_height(n)) {
                heights.push(height);
            }
        }
        heights.sort_unstable();
        Ok(heights)
    }

    fn parse_height(&self, file_name: &str) -> Option<BlockHeight> {
        let rest = file_name.strip_prefix(self.base_name.as_str())?.strip_prefix('_')?;
        let digits = rest.strip_suffix(self.extension.as_str())?.strip_suffix('.')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}
