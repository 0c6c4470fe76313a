//! Wire codec for root announcements (tree announcement frame payload).
//!
//! Layout, binding for interoperability:
//!
//! ```text
//! root key           : 32 bytes
//! sequence           : varint
//! signature count    : varint
//! repeated per hop:
//!   signer key       : 32 bytes
//!   hop port         : varint
//!   signature        : 64 bytes
//! ```
//!
//! The hop signature covers the payload prefix up to and including its own
//! signer key and hop port, so the codec and the signer must agree on this
//! layout byte for byte.

use secp256k1::schnorr::Signature;

use super::{varint, ProtocolError};
use crate::identity::NODE_KEY_SIZE;
use crate::tree::{HopSignature, RootAnnouncement};
use crate::NodeKey;

/// Size of a schnorr signature on the wire.
pub const SIGNATURE_SIZE: usize = 64;

impl RootAnnouncement {
    /// Serialize to a tree announcement frame payload.
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf =
            Vec::with_capacity(NODE_KEY_SIZE + 2 * varint::MAX_VARINT_LEN + self.signatures.len() * 104);
        buf.extend_from_slice(self.root.as_bytes());
        varint::write_u64(&mut buf, self.sequence);
        varint::write_u64(&mut buf, self.signatures.len() as u64);
        for sig in &self.signatures {
            sig.write(&mut buf);
        }
        buf
    }

    /// Deserialize from a tree announcement frame payload.
    ///
    /// The payload must contain exactly one announcement; trailing bytes
    /// are rejected so that `unmarshal(marshal(a)) == a` is an exact
    /// inverse on valid inputs.
    pub fn unmarshal(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut pos = 0;

        let root = take_key(payload, &mut pos)?;

        let (sequence, n) = varint::read_u64(&payload[pos..])?;
        pos += n;
        let (count, n) = varint::read_u64(&payload[pos..])?;
        pos += n;

        // Each hop is at least key + 1-byte port + signature long; an
        // absurd count is rejected before any allocation.
        let min_hop = NODE_KEY_SIZE + 1 + SIGNATURE_SIZE;
        if (count as usize).saturating_mul(min_hop) > payload.len() - pos {
            return Err(ProtocolError::MessageTooShort {
                expected: pos.saturating_add((count as usize).saturating_mul(min_hop)),
                got: payload.len(),
            });
        }

        let mut signatures = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let key = take_key(payload, &mut pos)?;
            let (port, n) = varint::read_u64(&payload[pos..])?;
            pos += n;
            let signature = take_signature(payload, &mut pos)?;
            signatures.push(HopSignature {
                key,
                port,
                signature,
            });
        }

        if pos != payload.len() {
            return Err(ProtocolError::TrailingBytes(payload.len() - pos));
        }

        Ok(Self {
            root,
            sequence,
            signatures,
        })
    }
}

fn take_key(payload: &[u8], pos: &mut usize) -> Result<NodeKey, ProtocolError> {
    let end = *pos + NODE_KEY_SIZE;
    if payload.len() < end {
        return Err(ProtocolError::MessageTooShort {
            expected: end,
            got: payload.len(),
        });
    }
    let key = NodeKey::from_slice(&payload[*pos..end]).map_err(|_| ProtocolError::InvalidKey)?;
    *pos = end;
    Ok(key)
}

fn take_signature(payload: &[u8], pos: &mut usize) -> Result<Signature, ProtocolError> {
    let end = *pos + SIGNATURE_SIZE;
    if payload.len() < end {
        return Err(ProtocolError::MessageTooShort {
            expected: end,
            got: payload.len(),
        });
    }
    let signature = Signature::from_slice(&payload[*pos..end])
        .map_err(|_| ProtocolError::InvalidSignature)?;
    *pos = end;
    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Identity;

    fn signed_announcement(hops: usize) -> RootAnnouncement {
        let root = Identity::generate();
        let mut ann = RootAnnouncement::root_candidate(*root.node_key(), 42);
        ann.sign_hop(&root, 3).unwrap();
        for _ in 1..hops {
            let id = Identity::generate();
            ann.sign_hop(&id, 1).unwrap();
        }
        ann
    }

    #[test]
    fn test_round_trip_self_root() {
        let ann = signed_announcement(1);
        let decoded = RootAnnouncement::unmarshal(&ann.marshal()).unwrap();
        assert_eq!(decoded, ann);
        assert!(decoded.verify().is_ok());
    }

    #[test]
    fn test_round_trip_deep_chain() {
        let ann = signed_announcement(4);
        let bytes = ann.marshal();
        let decoded = RootAnnouncement::unmarshal(&bytes).unwrap();
        assert_eq!(decoded, ann);
        assert_eq!(decoded.coords().len(), 4);
        assert!(decoded.verify().is_ok());
    }

    #[test]
    fn test_unmarshal_truncated() {
        let bytes = signed_announcement(2).marshal();
        for cut in [0, 10, 33, bytes.len() - 1] {
            assert!(RootAnnouncement::unmarshal(&bytes[..cut]).is_err());
        }
    }

    #[test]
    fn test_unmarshal_trailing_bytes() {
        let mut bytes = signed_announcement(1).marshal();
        bytes.push(0x00);
        assert!(matches!(
            RootAnnouncement::unmarshal(&bytes),
            Err(ProtocolError::TrailingBytes(1))
        ));
    }

    #[test]
    fn test_unmarshal_absurd_count() {
        let ann = signed_announcement(1);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(ann.root.as_bytes());
        varint::write_u64(&mut bytes, ann.sequence);
        varint::write_u64(&mut bytes, u64::MAX); // claims 2^64-1 hops
        assert!(matches!(
            RootAnnouncement::unmarshal(&bytes),
            Err(ProtocolError::MessageTooShort { .. })
        ));
    }

    #[test]
    fn test_tampered_payload_fails_chain_verify() {
        let ann = signed_announcement(2);
        let mut bytes = ann.marshal();
        // Flip a bit inside the first hop's signer key: the payload still
        // decodes, but the signature chain must not verify.
        bytes[NODE_KEY_SIZE + 2] ^= 0x01;
        let decoded = RootAnnouncement::unmarshal(&bytes).unwrap();
        assert!(decoded.verify().is_err());
    }
}
