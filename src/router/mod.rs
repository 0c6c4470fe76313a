//! The Arbor router: public handle over the tree actor.
//!
//! All tree state is owned by a single actor task; the `Router` handle
//! posts messages into its mailbox. Queries round-trip through the mailbox
//! and return snapshots, so a returned value reflects every message sent
//! before it.

mod command;
mod events;
mod state;

use std::collections::BTreeMap;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::config::Config;
use crate::peer::PeerInfo;
use crate::proto::{Destination, Frame, FrameType, NextHop};
use crate::tree::{Coordinates, Port, RootAnnouncement};
use crate::{Identity, NodeKey};

use command::Command;
pub use events::Event;

/// Mailbox depth for the tree actor.
const COMMAND_QUEUE_DEPTH: usize = 256;

/// Errors surfaced by the router handle.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("router has stopped")]
    Stopped,

    #[error("port {0} is already in use")]
    PortInUse(Port),

    #[error("invalid peer port {0}")]
    InvalidPort(Port),
}

/// Snapshot of a node's routing state.
#[derive(Clone, Debug)]
pub struct NodeState {
    /// This node's key.
    pub key: NodeKey,
    /// Connected peers: local port to remote key.
    pub connections: BTreeMap<Port, NodeKey>,
    /// The current parent's key, if any.
    pub parent: Option<NodeKey>,
    /// This node's tree coordinates.
    pub coords: Coordinates,
    /// The announcement this node currently propagates.
    pub root_announcement: RootAnnouncement,
    /// Unix nanoseconds when the root announcement was received; 0 when
    /// the node is propagating its own synthetic self-root announcement.
    pub announcement_time: u64,
}

/// Handle to a running router instance.
///
/// Cheap to clone; every clone posts to the same actor. Must be created
/// inside a tokio runtime.
#[derive(Clone)]
pub struct Router {
    command_tx: mpsc::Sender<Command>,
}

impl Router {
    /// Spawn the tree actor and return a handle to it.
    pub fn new(identity: Identity, config: &Config) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let state = state::State::new(identity, config.node.tree.clone(), command_tx.clone());
        tokio::spawn(state.run(command_rx));
        Self { command_tx }
    }

    /// Register a new peer connection on a local port.
    ///
    /// Returns the receiving half of the peer's outbound protocol queue;
    /// the transport drains it onto the wire.
    pub async fn peer_connected(
        &self,
        port: Port,
        key: NodeKey,
        uri: impl Into<String>,
        zone: impl Into<String>,
    ) -> Result<mpsc::Receiver<Frame>, RouterError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(Command::PeerConnected {
                port,
                key,
                uri: uri.into(),
                zone: zone.into(),
                reply,
            })
            .await
            .map_err(|_| RouterError::Stopped)?;
        rx.await.map_err(|_| RouterError::Stopped)?
    }

    /// Remove a peer after the transport reports a disconnect.
    pub async fn peer_disconnected(&self, port: Port) -> Result<(), RouterError> {
        self.command_tx
            .send(Command::PeerDisconnected { port })
            .await
            .map_err(|_| RouterError::Stopped)
    }

    /// Report a transport link state change for an existing peer.
    ///
    /// An inactive peer keeps its slot and stored announcement but is
    /// treated as absent by the election and the next-hop resolver until
    /// the link recovers.
    pub async fn peer_active(&self, port: Port, active: bool) -> Result<(), RouterError> {
        self.command_tx
            .send(Command::PeerActive { port, active })
            .await
            .map_err(|_| RouterError::Stopped)
    }

    /// Deliver an inbound frame that arrived on `port`.
    pub async fn deliver_frame(&self, port: Port, frame: Frame) -> Result<(), RouterError> {
        self.command_tx
            .send(Command::Frame { port, frame })
            .await
            .map_err(|_| RouterError::Stopped)
    }

    /// Current tree coordinates.
    pub async fn coords(&self) -> Result<Coordinates, RouterError> {
        self.query(|reply| Command::Coords { reply }).await
    }

    /// Snapshot of the peer table.
    pub async fn peers(&self) -> Result<Vec<PeerInfo>, RouterError> {
        self.query(|reply| Command::Peers { reply }).await
    }

    /// Resolve the next hop for a routed frame.
    ///
    /// `from` is the overlay address the frame came from, if any. Returns
    /// `NextHop::Local` for traffic addressed to this node, the chosen
    /// peer's address to forward to, or `None` to drop.
    pub async fn next_hop(
        &self,
        from: Option<Destination>,
        frame_type: FrameType,
        dest: Destination,
    ) -> Result<Option<NextHop>, RouterError> {
        self.query(|reply| Command::NextHop {
            from,
            frame_type,
            dest,
            reply,
        })
        .await
    }

    /// Full node state snapshot.
    pub async fn node_state(&self) -> Result<NodeState, RouterError> {
        self.query(|reply| Command::NodeState { reply }).await
    }

    /// Register an event sink and get the state as of subscription.
    pub async fn subscribe(
        &self,
        sink: mpsc::UnboundedSender<Event>,
    ) -> Result<NodeState, RouterError> {
        self.query(|reply| Command::Subscribe { sink, reply }).await
    }

    /// Stop the actor. Pending timers become no-ops.
    pub async fn shutdown(&self) -> Result<(), RouterError> {
        self.query(|reply| Command::Shutdown { reply }).await
    }

    async fn query<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RouterError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(make(reply))
            .await
            .map_err(|_| RouterError::Stopped)?;
        rx.await.map_err(|_| RouterError::Stopped)
    }
}
