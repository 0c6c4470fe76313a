//! Router events delivered to subscribed sinks.

use crate::tree::{Coordinates, Port};
use crate::NodeKey;

/// An observable change in the router's tree state.
///
/// Events are best-effort: a subscriber that falls away is dropped. The
/// snake layer treats `ParentChanged` as its signal to re-bootstrap paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A peer slot was registered.
    PeerAdded { port: Port, key: NodeKey },
    /// A peer slot was removed.
    PeerRemoved { port: Port, key: NodeKey },
    /// The chosen parent changed; `None` means this node became root.
    ParentChanged { parent: Option<NodeKey> },
    /// The observed root key changed.
    RootChanged { root: NodeKey },
    /// This node's tree coordinates changed.
    CoordsChanged { coords: Coordinates },
}
