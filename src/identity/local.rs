//! Local node identity with signing capability.

use secp256k1::{Keypair, Secp256k1, SecretKey};
use std::fmt;

use super::{sha256, IdentityError, NodeKey};

/// An Arbor node identity: a secp256k1 keypair plus the derived node key.
///
/// The identity signs root announcement hops; everything the protocol
/// compares or transmits is the 32-byte `NodeKey`.
pub struct Identity {
    keypair: Keypair,
    node_key: NodeKey,
}

impl Identity {
    /// Create a new random identity.
    pub fn generate() -> Self {
        let mut secret_bytes = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut secret_bytes);
        let secret_key = SecretKey::from_slice(&secret_bytes)
            .expect("32 random bytes is a valid secret key");
        Self::from_secret_key(secret_key)
    }

    /// Create an identity from a secret key.
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &secret_key);
        let (pubkey, _parity) = keypair.x_only_public_key();
        Self {
            keypair,
            node_key: NodeKey::from_pubkey(&pubkey),
        }
    }

    /// Create an identity from secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, IdentityError> {
        let secret_key = SecretKey::from_slice(bytes)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Create an identity from a hex-encoded secret key.
    pub fn from_secret_hex(s: &str) -> Result<Self, IdentityError> {
        let decoded = hex::decode(s.trim())?;
        let secret_key = SecretKey::from_slice(&decoded)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Return this node's key.
    pub fn node_key(&self) -> &NodeKey {
        &self.node_key
    }

    /// Sign arbitrary data with this identity's secret key.
    ///
    /// The signature is schnorr over SHA-256(data).
    pub fn sign(&self, data: &[u8]) -> secp256k1::schnorr::Signature {
        let secp = Secp256k1::new();
        let digest = sha256(data);
        secp.sign_schnorr(&digest, &self.keypair)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("node_key", &self.node_key)
            .finish_non_exhaustive()
    }
}
