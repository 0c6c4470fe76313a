//! Arbor identity system.
//!
//! Node identity is a secp256k1 keypair. The node key is the 32-byte x-only
//! public key encoding; its lexicographic order decides the root election.

mod local;
mod node_key;

use sha2::{Digest, Sha256};
use thiserror::Error;

pub use local::Identity;
pub use node_key::{NodeKey, NODE_KEY_SIZE};

/// Errors that can occur in identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(#[from] secp256k1::Error),

    #[error("invalid node key length: expected 32, got {0}")]
    InvalidKeyLength(usize),

    #[error("node key is not a valid curve point")]
    InvalidPublicKey,

    #[error("invalid hex encoding: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Compute SHA-256 hash of data.
pub(crate) fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Encode bytes as lowercase hex string.
pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
