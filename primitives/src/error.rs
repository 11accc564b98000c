//! Error types for the Cairn data model.
//!
//! Covers the validation and integrity classes of failures: oversized
//! transactions, Merkle computation failures, malformed encodings and
//! structurally invalid blocks. None of them are fatal; callers drop the
//! offending object and keep running.

/// Data-model error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// Transaction exceeds the configured maximum serialized size.
    #[error("transaction too large: size={size}, max={max}")]
    TransactionTooLarge { size: usize, max: usize },

    /// Merkle root could not be computed from the supplied transactions.
    #[error("merkle computation failed: {0}")]
    MerkleError(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Encoded record carries a format version this build does not know.
    #[error("unsupported format version: expected {expected}, got {got}")]
    UnsupportedVersion { expected: u8, got: u8 },

    /// Block failed a structural check.
    #[error("invalid block: {0}")]
    InvalidBlock(String),
}

/// Convenience result type for the data model.
pub type ChainResult<T> = Result<T, ChainError>;

/// Failure while reading or writing a framed record on a byte stream.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Underlying stream failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Record bytes arrived but did not decode.
    #[error("decode error: {0}")]
    Decode(#[from] ChainError),

    /// Length prefix exceeds the accepted maximum.
    #[error("record too large: {len} bytes (max {max})")]
    TooLarge { len: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_large_display() {
        let err = ChainError::TransactionTooLarge { size: 2048, max: 1024 };
        let s = err.to_string();
        assert!(s.contains("2048"));
        assert!(s.contains("1024"));
    }

    #[test]
    fn test_unsupported_version_display() {
        let err = ChainError::UnsupportedVersion { expected: 1, got: 9 };
        assert_eq!(err.to_string(), "unsupported format version: expected 1, got 9");
    }
}
