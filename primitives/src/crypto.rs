//! Cryptographic operations for the Cairn ledger.
//!
//! - Double hash `RIPEMD160(SHA3-512(x))` for every content identity
//!   (transactions, block headers, Merkle nodes)
//! - Ed25519 for optional transaction signatures
//!
//! All operations are deterministic; verification never panics and fails
//! closed on malformed key or signature material.

use crate::types::{Hash, HASH_LEN};
use ripemd::Ripemd160;
use sha3::{Digest, Sha3_512};

/// Length of an Ed25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of an Ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Compute the double hash `RIPEMD160(SHA3-512(data))`.
///
/// Same input bytes always yield the same 20-byte digest.
pub fn double_hash(data: &[u8]) -> Hash {
    let inner = Sha3_512::digest(data);
    let outer = Ripemd160::digest(inner);
    let mut hash = [0u8; HASH_LEN];
    hash.copy_from_slice(&outer);
    hash
}

/// Double hash of the concatenation of two digests (Merkle parent node).
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut data = [0u8; 2 * HASH_LEN];
    data[..HASH_LEN].copy_from_slice(left);
    data[HASH_LEN..].copy_from_slice(right);
    double_hash(&data)
}

/// Verify an Ed25519 signature over `message`.
///
/// Returns `false` for wrong-length inputs, invalid public keys and bad
/// signatures alike.
pub fn verify_ed25519(message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    let Ok(pk_bytes) = <[u8; PUBLIC_KEY_LEN]>::try_from(public_key) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; SIGNATURE_LEN]>::try_from(signature) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&pk_bytes) else {
        return false;
    };
    let sig = Signature::from_bytes(&sig_bytes);
    verifying_key.verify(message, &sig).is_ok()
}

/// Sign a message with an Ed25519 private key.
pub fn sign_ed25519(message: &[u8], secret_key: &ed25519_dalek::SigningKey) -> [u8; SIGNATURE_LEN] {
    use ed25519_dalek::Signer;
    secret_key.sign(message).to_bytes()
}

/// Generate an Ed25519 keypair from OS randomness.
#[cfg(feature = "keygen")]
pub fn generate_keypair() -> (ed25519_dalek::VerifyingKey, ed25519_dalek::SigningKey) {
    use ed25519_dalek::SigningKey;
    let mut rng = rand::rngs::OsRng;
    let signing_key = SigningKey::generate(&mut rng);
    let verifying_key = signing_key.verifying_key();
    (verifying_key, signing_key)
}
