//! 32-byte node key: the canonical x-only public key encoding.

use secp256k1::XOnlyPublicKey;
use std::fmt;

use super::{hex_encode, IdentityError};

/// Size of a node key in bytes.
pub const NODE_KEY_SIZE: usize = 32;

/// A node's public identity key in canonical x-only encoding.
///
/// The derived `Ord` is lexicographic over the canonical bytes; the root
/// election picks the highest-ordered key reachable in the component, so
/// this ordering is protocol-visible and must never change.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey([u8; NODE_KEY_SIZE]);

impl NodeKey {
    /// Create a NodeKey from a 32-byte array.
    pub fn from_bytes(bytes: [u8; NODE_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create a NodeKey from a slice.
    pub fn from_slice(slice: &[u8]) -> Result<Self, IdentityError> {
        if slice.len() != NODE_KEY_SIZE {
            return Err(IdentityError::InvalidKeyLength(slice.len()));
        }
        let mut bytes = [0u8; NODE_KEY_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Create a NodeKey from an x-only public key.
    pub fn from_pubkey(pubkey: &XOnlyPublicKey) -> Self {
        Self(pubkey.serialize())
    }

    /// Parse back into an x-only public key for signature verification.
    ///
    /// Fails if the bytes are not a valid curve point.
    pub fn to_pubkey(&self) -> Result<XOnlyPublicKey, IdentityError> {
        XOnlyPublicKey::from_slice(&self.0).map_err(|_| IdentityError::InvalidPublicKey)
    }

    /// Return the raw bytes.
    pub fn as_bytes(&self) -> &[u8; NODE_KEY_SIZE] {
        &self.0
    }

    /// Return the bytes as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeKey({})", hex_encode(&self.0[..8]))
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex_encode(&self.0))
    }
}

impl AsRef<[u8]> for NodeKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_lexicographic() {
        let low = NodeKey::from_bytes([0x01; 32]);
        let mut high_bytes = [0x01; 32];
        high_bytes[0] = 0x02;
        let high = NodeKey::from_bytes(high_bytes);

        assert!(high > low);

        // A later byte breaks the tie
        let mut a = [0x05; 32];
        let mut b = [0x05; 32];
        a[31] = 0x00;
        b[31] = 0x01;
        assert!(NodeKey::from_bytes(b) > NodeKey::from_bytes(a));
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(matches!(
            NodeKey::from_slice(&[0u8; 31]),
            Err(IdentityError::InvalidKeyLength(31))
        ));
        assert!(NodeKey::from_slice(&[0u8; 32]).is_ok());
    }

    #[test]
    fn test_pubkey_round_trip() {
        let identity = crate::Identity::generate();
        let key = identity.node_key();
        let pubkey = key.to_pubkey().unwrap();
        assert_eq!(NodeKey::from_pubkey(&pubkey), *key);
    }
}
