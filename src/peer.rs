//! Peer slots: connected remote nodes keyed by local port number.

use std::fmt;

use tokio::sync::mpsc;
use tracing::debug;

use crate::proto::Frame;
use crate::tree::Port;
use crate::NodeKey;

/// A connected remote node.
///
/// Created when the transport reports a new connection and destroyed on
/// disconnect. Only the tree actor mutates a peer; the transport holds the
/// receiving half of the outbound queue.
pub struct Peer {
    /// Local port number for this slot. Never 0.
    port: Port,
    /// The remote node's verified key.
    key: NodeKey,
    /// Whether the link is usable. Inactive peers are skipped by the
    /// parent selector and the next-hop resolver.
    active: bool,
    /// Transport URI the connection came from.
    uri: String,
    /// Routing zone label supplied by the transport.
    zone: String,
    /// Outbound protocol queue toward this peer.
    queue: mpsc::Sender<Frame>,
}

impl Peer {
    pub(crate) fn new(
        port: Port,
        key: NodeKey,
        uri: String,
        zone: String,
        queue: mpsc::Sender<Frame>,
    ) -> Self {
        Self {
            port,
            key,
            active: true,
            uri,
            zone,
            queue,
        }
    }

    /// Local port number for this slot.
    pub fn port(&self) -> Port {
        self.port
    }

    /// The remote node's key.
    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    /// Whether the link is currently usable.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Transport URI of the connection.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Routing zone label.
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Enqueue a frame toward this peer without blocking.
    ///
    /// A full or closed queue drops the frame: announcements are
    /// self-healing and regenerate on the maintenance timer.
    pub(crate) fn push(&self, frame: Frame) -> bool {
        match self.queue.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(port = self.port, "outbound queue full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(port = self.port, "outbound queue closed, dropping frame");
                false
            }
        }
    }

    /// Snapshot this peer for the `peers()` query.
    pub(crate) fn info(&self) -> PeerInfo {
        PeerInfo {
            port: self.port,
            key: self.key,
            uri: self.uri.clone(),
            zone: self.zone.clone(),
            active: self.active,
        }
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("port", &self.port)
            .field("key", &self.key)
            .field("active", &self.active)
            .field("uri", &self.uri)
            .finish()
    }
}

/// Snapshot of a peer slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerInfo {
    pub port: Port,
    pub key: NodeKey,
    pub uri: String,
    pub zone: String,
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Identity;

    #[test]
    fn test_push_drops_when_full() {
        let identity = Identity::generate();
        let (tx, mut rx) = mpsc::channel(1);
        let peer = Peer::new(1, *identity.node_key(), "test://".into(), String::new(), tx);

        assert!(peer.push(Frame::tree_announcement(vec![1])));
        assert!(!peer.push(Frame::tree_announcement(vec![2])));

        let queued = rx.try_recv().unwrap();
        assert_eq!(queued.payload, vec![1]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_push_drops_when_closed() {
        let identity = Identity::generate();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let peer = Peer::new(2, *identity.node_key(), "test://".into(), String::new(), tx);
        assert!(!peer.push(Frame::tree_announcement(vec![])));
    }
}
