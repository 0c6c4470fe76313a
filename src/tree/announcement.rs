//! Signed root announcements: the spanning tree control message.

use secp256k1::schnorr::Signature;
use secp256k1::Secp256k1;

use super::{Coordinates, Port, TreeError};
use crate::identity::{sha256, Identity, NodeKey};
use crate::proto::varint;

/// One hop in an announcement's signature chain.
///
/// `port` is the local port number the signer assigned to the link the
/// announcement was sent over; the signature covers the whole chain built
/// so far, which makes the path from the root unforgeable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HopSignature {
    /// The signing node's key.
    pub key: NodeKey,
    /// The signer's local port toward the receiver. Never 0.
    pub port: Port,
    /// Schnorr signature over the chain prefix plus this hop.
    pub signature: Signature,
}

impl HopSignature {
    /// Append this hop's wire encoding (key, port varint, signature).
    pub(crate) fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.key.as_bytes());
        varint::write_u64(buf, self.port);
        buf.extend_from_slice(self.signature.as_ref());
    }
}

/// A root announcement: the advertised path from the root to the sender.
///
/// The first signature is the root's own; each forwarding node appends one
/// more. An empty chain only ever exists locally, as the synthetic
/// announcement of a node acting as its own root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootAnnouncement {
    /// The claimed root key.
    pub root: NodeKey,
    /// The root's sequence number for this announcement epoch.
    pub sequence: u64,
    /// The signature chain from the root to the direct sender.
    pub signatures: Vec<HopSignature>,
}

impl RootAnnouncement {
    /// Synthetic announcement for a node acting as its own root.
    pub fn root_candidate(root: NodeKey, sequence: u64) -> Self {
        Self {
            root,
            sequence,
            signatures: Vec::new(),
        }
    }

    /// The receiver's coordinates: every hop port in chain order.
    ///
    /// The final hop is the port the direct sender assigned to the link
    /// this announcement arrived on, so the full path addresses the
    /// *receiver*, not the sender.
    pub fn coords(&self) -> Coordinates {
        Coordinates::new(self.signatures.iter().map(|sig| sig.port).collect())
    }

    /// The sender's claimed coordinates: the hop ports minus the final hop.
    pub fn peer_coords(&self) -> Coordinates {
        let ports = &self.signatures[..self.signatures.len().saturating_sub(1)];
        Coordinates::new(ports.iter().map(|sig| sig.port).collect())
    }

    /// Whether the chain already carries `key`'s signature.
    ///
    /// Used both to refuse adopting a descendant as parent and to avoid
    /// re-signing an announcement that already went through us.
    pub fn is_loop_or_child_of(&self, key: &NodeKey) -> bool {
        self.signatures.iter().any(|sig| sig.key == *key)
    }

    /// The bytes covered by the signature at `upto`: the announcement
    /// prefix (root, sequence) plus all prior hops.
    fn chain_prefix(&self, upto: usize) -> Vec<u8> {
        let mut buf = Vec::with_capacity(40 + upto * 104);
        buf.extend_from_slice(self.root.as_bytes());
        varint::write_u64(&mut buf, self.sequence);
        for sig in &self.signatures[..upto] {
            sig.write(&mut buf);
        }
        buf
    }

    /// Append a hop signed by `identity` for the given local port.
    ///
    /// Leaves `root` and `sequence` untouched; signing with port 0 is
    /// refused since 0 addresses the local endpoint.
    pub fn sign_hop(&mut self, identity: &Identity, port: Port) -> Result<(), TreeError> {
        if port == 0 {
            return Err(TreeError::ZeroHop);
        }
        let key = *identity.node_key();
        let mut buf = self.chain_prefix(self.signatures.len());
        buf.extend_from_slice(key.as_bytes());
        varint::write_u64(&mut buf, port);
        let signature = identity.sign(&buf);
        self.signatures.push(HopSignature {
            key,
            port,
            signature,
        });
        Ok(())
    }

    /// Verify the whole signature chain.
    ///
    /// Checks that the first signer is the claimed root, that no hop is 0,
    /// and that every schnorr signature covers its chain prefix. An empty
    /// chain verifies trivially (it only occurs on the synthetic self-root
    /// announcement, which is never transmitted as-is).
    pub fn verify(&self) -> Result<(), TreeError> {
        let secp = Secp256k1::verification_only();
        for (index, sig) in self.signatures.iter().enumerate() {
            if index == 0 && sig.key != self.root {
                return Err(TreeError::RootSignerMismatch);
            }
            if sig.port == 0 {
                return Err(TreeError::ZeroHop);
            }
            let pubkey = sig
                .key
                .to_pubkey()
                .map_err(|_| TreeError::InvalidSignature(index))?;
            let mut buf = self.chain_prefix(index);
            buf.extend_from_slice(sig.key.as_bytes());
            varint::write_u64(&mut buf, sig.port);
            let digest = sha256(&buf);
            secp.verify_schnorr(&sig.signature, &digest, &pubkey)
                .map_err(|_| TreeError::InvalidSignature(index))?;
        }
        Ok(())
    }
}
