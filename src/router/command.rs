//! Actor mailbox messages.

use tokio::sync::{mpsc, oneshot};

use super::{Event, NodeState, RouterError};
use crate::peer::PeerInfo;
use crate::proto::{Destination, Frame, FrameType, NextHop};
use crate::tree::{Coordinates, Port};
use crate::NodeKey;

/// A message posted to the tree actor.
///
/// Queries carry a oneshot reply channel; awaiting it gives callers the
/// block-until-executed-on-actor semantics for snapshots.
pub(crate) enum Command {
    /// The transport reports a new connection on `port`.
    PeerConnected {
        port: Port,
        key: NodeKey,
        uri: String,
        zone: String,
        reply: oneshot::Sender<Result<mpsc::Receiver<Frame>, RouterError>>,
    },
    /// The transport reports a disconnect.
    PeerDisconnected { port: Port },
    /// The transport reports a link state change on an existing slot.
    PeerActive { port: Port, active: bool },
    /// An inbound frame arrived on `port`.
    Frame { port: Port, frame: Frame },
    /// The reparent hysteresis timer fired.
    ReparentWait,
    /// Query: current tree coordinates.
    Coords { reply: oneshot::Sender<Coordinates> },
    /// Query: peer table snapshot.
    Peers { reply: oneshot::Sender<Vec<PeerInfo>> },
    /// Query: next hop for a routed frame.
    NextHop {
        from: Option<Destination>,
        frame_type: FrameType,
        dest: Destination,
        reply: oneshot::Sender<Option<NextHop>>,
    },
    /// Query: full node state snapshot.
    NodeState { reply: oneshot::Sender<NodeState> },
    /// Register an event sink; replies with the state at subscribe time.
    Subscribe {
        sink: mpsc::UnboundedSender<Event>,
        reply: oneshot::Sender<NodeState>,
    },
    /// Stop the actor.
    Shutdown { reply: oneshot::Sender<()> },
}
