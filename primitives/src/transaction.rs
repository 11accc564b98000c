//! Transactions: immutable, size-bounded, optionally signed opaque payloads.
//!
//! ## Identity bytes (big-endian)
//!
//! ```text
//! [version: UTF-8 bytes]
//! [timestamp: 8 bytes BE, epoch millis]
//! [payload: opaque bytes]
//! [signature: bytes, only when present]
//! ```
//!
//! The identity hash is `double_hash` over exactly these bytes. The
//! serialized size checked against the configured maximum is the length of
//! the framed codec encoding (see [`crate::codec::encode_transaction`]).

use crate::codec;
use crate::crypto::{double_hash, sign_ed25519, verify_ed25519};
use crate::error::{ChainError, ChainResult};
use crate::types::Hash;

/// An opaque, immutable transaction.
///
/// Fields are private: a `Transaction` can only be obtained through a
/// constructor that enforces the size bound, so every live instance is
/// within the limit it was built against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    timestamp: i64,
    payload: Vec<u8>,
    version: String,
    signature: Option<Vec<u8>>,
    hash: Hash,
    size: usize,
}

impl Transaction {
    /// Build a transaction, rejecting it if its serialized size exceeds
    /// `max_size`.
    pub fn new(
        timestamp: i64,
        payload: Vec<u8>,
        version: impl Into<String>,
        signature: Option<Vec<u8>>,
        max_size: usize,
    ) -> ChainResult<Self> {
        let tx = Self::assemble(timestamp, payload, version.into(), signature);
        if tx.size > max_size {
            return Err(ChainError::TransactionTooLarge {
                size: tx.size,
                max: max_size,
            });
        }
        Ok(tx)
    }

    /// Build and sign a transaction; the signature covers the payload bytes.
    pub fn signed(
        timestamp: i64,
        payload: Vec<u8>,
        version: impl Into<String>,
        signing_key: &ed25519_dalek::SigningKey,
        max_size: usize,
    ) -> ChainResult<Self> {
        let signature = sign_ed25519(&payload, signing_key).to_vec();
        Self::new(timestamp, payload, version, Some(signature), max_size)
    }

    /// Unbounded construction for internally defined transactions (genesis).
    pub(crate) fn assemble(
        timestamp: i64,
        payload: Vec<u8>,
        version: String,
        signature: Option<Vec<u8>>,
    ) -> Self {
        let mut tx = Self {
            timestamp,
            payload,
            version,
            signature,
            hash: [0u8; crate::types::HASH_LEN],
            size: 0,
        };
        tx.hash = double_hash(&tx.bytes());
        tx.size = codec::encoded_transaction_len(&tx);
        tx
    }

    /// Creation time in epoch milliseconds.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Opaque payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Protocol version string.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Signature bytes, if the transaction is signed.
    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    /// Identity hash.
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Fixed-order identity bytes: version, timestamp, payload, signature.
    pub fn bytes(&self) -> Vec<u8> {
        let sig_len = self.signature.as_ref().map_or(0, Vec::len);
        let mut out = Vec::with_capacity(self.version.len() + 8 + self.payload.len() + sig_len);
        out.extend_from_slice(self.version.as_bytes());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.payload);
        if let Some(sig) = &self.signature {
            out.extend_from_slice(sig);
        }
        out
    }

    /// Verify the signature against `public_key`.
    ///
    /// Unsigned transactions never verify.
    pub fn verify_signature(&self, public_key: &[u8]) -> bool {
        match &self.signature {
            Some(sig) => verify_ed25519(&self.payload, sig, public_key),
            None => false,
        }
    }

    /// Merkle ordering key: timestamp first, hash as tie-break.
    pub fn ordering_key(&self) -> (i64, Hash) {
        (self.timestamp, self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keypair;
    use crate::types::{DEFAULT_MAX_TRANSACTION_SIZE, PROTOCOL_VERSION};

    fn tx(ts: i64, payload: &[u8]) -> Transaction {
        Transaction::new(ts, payload.to_vec(), PROTOCOL_VERSION, None, DEFAULT_MAX_TRANSACTION_SIZE)
            .unwrap()
    }

    #[test]
    fn test_bytes_layout() {
        let t = tx(0x0102030405060708, b"abc");
        let mut expected = Vec::new();
        expected.extend_from_slice(PROTOCOL_VERSION.as_bytes());
        expected.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        expected.extend_from_slice(b"abc");
        assert_eq!(t.bytes(), expected);
        assert_eq!(t.hash(), double_hash(&expected));
    }

    #[test]
    fn test_signature_included_in_identity() {
        let unsigned = tx(5, b"payload");
        let signed = Transaction::new(
            5,
            b"payload".to_vec(),
            PROTOCOL_VERSION,
            Some(vec![9u8; 64]),
            DEFAULT_MAX_TRANSACTION_SIZE,
        )
        .unwrap();
        assert_ne!(unsigned.hash(), signed.hash());
        assert!(signed.size() > unsigned.size());
    }

    #[test]
    fn test_oversized_rejected() {
        let err = Transaction::new(1, vec![0u8; 256], PROTOCOL_VERSION, None, 128).unwrap_err();
        assert!(matches!(err, ChainError::TransactionTooLarge { max: 128, .. }));
    }

    #[test]
    fn test_size_at_limit_accepted() {
        let probe = tx(1, &[7u8; 100]);
        let exact = Transaction::new(1, vec![7u8; 100], PROTOCOL_VERSION, None, probe.size());
        assert!(exact.is_ok());
        let below = Transaction::new(1, vec![7u8; 100], PROTOCOL_VERSION, None, probe.size() - 1);
        assert!(below.is_err());
    }

    #[test]
    fn test_signed_verifies() {
        let (vk, sk) = generate_keypair();
        let t = Transaction::signed(10, b"pay".to_vec(), PROTOCOL_VERSION, &sk, 1024).unwrap();
        assert!(t.verify_signature(vk.as_bytes()));

        let (other, _) = generate_keypair();
        assert!(!t.verify_signature(other.as_bytes()));
    }

    #[test]
    fn test_unsigned_never_verifies() {
        let (vk, _sk) = generate_keypair();
        assert!(!tx(1, b"x").verify_signature(vk.as_bytes()));
    }
}
