//! The tree actor: spanning tree state and its serialized handlers.
//!
//! All mutable routing state lives here and is only touched from the actor
//! task, which processes one mailbox message at a time. Handlers never
//! block: outbound frames are enqueued to per-peer queues and timers fire
//! by posting messages back to the mailbox.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::command::Command;
use super::{Event, NodeState, RouterError};
use crate::config::TreeConfig;
use crate::peer::{Peer, PeerInfo};
use crate::proto::{Destination, Frame, FrameType, NextHop};
use crate::tree::{Coordinates, Port, RootAnnouncement, TreeError};
use crate::{Identity, NodeKey};

/// The last accepted announcement from a peer.
pub(crate) struct StoredAnnouncement {
    pub(crate) announcement: RootAnnouncement,
    /// Drives the staleness check in the parent selector.
    pub(crate) receive_time: Instant,
    /// Wall-clock receive time, reported in state snapshots.
    pub(crate) received_at: SystemTime,
    /// Node-local monotonic accept counter; earlier arrival of the same
    /// root update implies the lower-latency path to the root.
    pub(crate) receive_order: u64,
}

/// Resolver outcome in terms of local ports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HopPort {
    Local,
    Peer(Port),
}

/// Spanning tree state, owned by the actor task.
pub(crate) struct State {
    identity: Identity,
    tree_config: TreeConfig,
    /// Connected peers, keyed by local port number (sparse).
    peers: HashMap<Port, Peer>,
    /// Last accepted announcement per peer port.
    announcements: HashMap<Port, StoredAnnouncement>,
    /// The peer whose announcement we follow toward the root. `None`
    /// means we are acting as root.
    parent: Option<Port>,
    /// Our own announcement sequence, bumped each time we announce as root.
    sequence: u64,
    /// Monotonic accept counter feeding `receive_order`.
    ordering: u64,
    /// True during the hysteresis window after the parent regressed.
    /// While waiting, `parent` is `None`.
    waiting: bool,
    subscribers: Vec<mpsc::UnboundedSender<Event>>,
    /// Handle for timers to post back into the mailbox.
    command_tx: mpsc::Sender<Command>,
    /// Next maintenance deadline; reset on every maintenance run.
    maintain_at: tokio::time::Instant,
    shutdown: bool,
}

impl State {
    pub(crate) fn new(
        identity: Identity,
        tree_config: TreeConfig,
        command_tx: mpsc::Sender<Command>,
    ) -> Self {
        let maintain_at = tokio::time::Instant::now() + tree_config.announcement_interval();
        Self {
            identity,
            tree_config,
            peers: HashMap::new(),
            announcements: HashMap::new(),
            parent: None,
            sequence: 0,
            ordering: 0,
            waiting: false,
            subscribers: Vec::new(),
            command_tx,
            maintain_at,
            shutdown: false,
        }
    }

    /// Actor loop: drain the mailbox, interleaved with the maintenance
    /// deadline. Exits on shutdown or when every handle is gone.
    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        loop {
            let maintain_at = self.maintain_at;
            tokio::select! {
                _ = tokio::time::sleep_until(maintain_at) => {
                    self.maintain_tree();
                }
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
            }
            if self.shutdown {
                break;
            }
        }
        debug!("tree actor stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::PeerConnected {
                port,
                key,
                uri,
                zone,
                reply,
            } => {
                let _ = reply.send(self.peer_connected(port, key, uri, zone));
            }
            Command::PeerDisconnected { port } => {
                let before = self.tree_position();
                self.peer_disconnected(port);
                self.emit_tree_deltas(before);
            }
            Command::PeerActive { port, active } => {
                self.peer_active(port, active);
            }
            Command::Frame { port, frame } => {
                let before = self.tree_position();
                self.handle_frame(port, frame);
                self.emit_tree_deltas(before);
            }
            Command::ReparentWait => {
                let before = self.tree_position();
                self.reparent_wait_expired();
                self.emit_tree_deltas(before);
            }
            Command::Coords { reply } => {
                let _ = reply.send(self.coords());
            }
            Command::Peers { reply } => {
                let mut infos: Vec<PeerInfo> = self.peers.values().map(Peer::info).collect();
                infos.sort_by_key(|info| info.port);
                let _ = reply.send(infos);
            }
            Command::NextHop {
                from,
                frame_type,
                dest,
                reply,
            } => {
                let _ = reply.send(self.next_hop(from, frame_type, &dest));
            }
            Command::NodeState { reply } => {
                let _ = reply.send(self.node_state());
            }
            Command::Subscribe { sink, reply } => {
                self.subscribers.push(sink);
                let _ = reply.send(self.node_state());
            }
            Command::Shutdown { reply } => {
                info!("tree actor shutting down");
                self.shutdown = true;
                let _ = reply.send(());
            }
        }
    }

    // === Peer lifecycle ===

    fn peer_connected(
        &mut self,
        port: Port,
        key: NodeKey,
        uri: String,
        zone: String,
    ) -> Result<mpsc::Receiver<Frame>, RouterError> {
        if port == 0 {
            return Err(RouterError::InvalidPort(port));
        }
        if self.peers.contains_key(&port) {
            return Err(RouterError::PortInUse(port));
        }
        let (queue, rx) = mpsc::channel(self.tree_config.peer_queue_capacity);
        self.peers.insert(port, Peer::new(port, key, uri, zone, queue));
        info!(port, peer = %key, "peer connected");
        self.emit(Event::PeerAdded { port, key });

        // Seed the new peer with our current root announcement.
        let ann = self.root_announcement();
        self.send_tree_announcement_to_peer(&ann, port);
        Ok(rx)
    }

    fn peer_disconnected(&mut self, port: Port) {
        let Some(peer) = self.peers.remove(&port) else {
            return;
        };
        self.announcements.remove(&port);
        let key = *peer.key();
        info!(port, peer = %key, "peer disconnected");
        self.emit(Event::PeerRemoved { port, key });

        if self.parent == Some(port) {
            // The parent is gone: elect a replacement or become root.
            self.select_new_parent();
        }
        self.check_invariants();
    }

    /// Transport-reported link state change.
    ///
    /// The slot and its stored announcement survive a flap; the election
    /// and the resolver skip an inactive peer until the link recovers.
    /// A frame racing in between the flap and the disconnect finds the
    /// flag down and is dropped.
    fn peer_active(&mut self, port: Port, active: bool) {
        match self.peers.get_mut(&port) {
            Some(peer) => {
                peer.set_active(active);
                debug!(port, active, "peer link state changed");
            }
            None => {
                debug!(port, "link state change for unknown peer");
            }
        }
    }

    // === Announcement handling ===

    fn handle_frame(&mut self, port: Port, frame: Frame) {
        match frame.frame_type {
            FrameType::TreeAnnouncement => {
                if let Err(err) = self.handle_tree_announcement(port, &frame) {
                    debug!(port, error = %err, "dropping tree announcement");
                }
                self.check_invariants();
            }
            other => {
                debug!(port, frame_type = %other, "no protocol handler for frame type");
            }
        }
    }

    /// Validate and ingest a root announcement from a peer.
    ///
    /// Any validation failure drops the frame without touching state; the
    /// peer is never disconnected for a bad announcement.
    fn handle_tree_announcement(&mut self, port: Port, frame: &Frame) -> Result<(), TreeError> {
        let peer_key = match self.peers.get(&port) {
            Some(peer) if peer.is_active() => *peer.key(),
            _ => return Err(TreeError::UnknownPeer(port)),
        };

        let new_update = RootAnnouncement::unmarshal(&frame.payload)?;

        if new_update.signatures.is_empty() {
            return Err(TreeError::NoSignatures);
        }
        let last_index = new_update.signatures.len() - 1;
        let mut seen: HashSet<NodeKey> = HashSet::with_capacity(new_update.signatures.len());
        for (index, sig) in new_update.signatures.iter().enumerate() {
            if index == 0 && sig.key != new_update.root {
                return Err(TreeError::RootSignerMismatch);
            }
            if sig.port == 0 {
                return Err(TreeError::ZeroHop);
            }
            if index == last_index && sig.key != peer_key {
                return Err(TreeError::SenderMismatch);
            }
            if !seen.insert(sig.key) {
                return Err(TreeError::RoutingLoop);
            }
        }
        new_update.verify()?;

        if let Some(existing) = self.announcements.get(&port) {
            if new_update.root == existing.announcement.root
                && new_update.sequence < existing.announcement.sequence
            {
                return Err(TreeError::SequenceReplay);
            }
        }

        // Classification compares against the root view from before this
        // update is stored.
        let last_root = self.root_announcement();
        let root_delta = new_update.root.cmp(&last_root.root);
        let new_sequence = new_update.sequence;

        self.ordering += 1;
        self.announcements.insert(
            port,
            StoredAnnouncement {
                announcement: new_update,
                receive_time: Instant::now(),
                received_at: SystemTime::now(),
                receive_order: self.ordering,
            },
        );

        if self.parent == Some(port) {
            if self.waiting {
                return Err(TreeError::ParentWhileWaiting);
            }
            if root_delta == Ordering::Less
                || (root_delta == Ordering::Equal && new_sequence <= last_root.sequence)
            {
                // The parent regressed: claim root ourselves and hold off
                // re-electing for the hysteresis window.
                info!(port, "parent regressed, becoming root pending re-election");
                self.waiting = true;
                self.become_root();
                self.schedule_reparent_wait();
            } else {
                // Strict improvement from the parent: pass it on.
                self.send_tree_announcements();
            }
        } else if root_delta == Ordering::Less && !self.waiting {
            // The peer's root is weaker than ours: teach it our root
            // rather than re-evaluating anything.
            self.send_tree_announcement_to_peer(&last_root, port);
            return Ok(());
        }

        if !self.waiting {
            self.select_new_parent();
        }
        Ok(())
    }

    /// Hysteresis window expired: re-run the election.
    fn reparent_wait_expired(&mut self) {
        if self.shutdown || !self.waiting {
            // A late timer after the window already closed is a no-op.
            return;
        }
        self.waiting = false;
        self.select_new_parent();
        self.check_invariants();
    }

    fn schedule_reparent_wait(&self) {
        let tx = self.command_tx.clone();
        let wait = self.tree_config.reparent_wait();
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let _ = tx.send(Command::ReparentWait).await;
        });
    }

    // === Election ===

    /// Scan the announcement store for the best parent candidate.
    ///
    /// Preference: strongest root key, then highest sequence, then
    /// earliest receive order. Returns true only if the parent changed.
    fn select_new_parent(&mut self) -> bool {
        let root = self.root_announcement();
        let self_key = *self.identity.node_key();
        let mut best_key = root.root;
        let mut best_seq = root.sequence;
        if best_key < self_key {
            // Never accept a root weaker than what we would claim alone.
            best_key = self_key;
            best_seq = 0;
        }
        let mut best_order = u64::MAX;
        let mut best_port: Option<Port> = None;
        let timeout = self.tree_config.announcement_timeout();

        for (port, stored) in &self.announcements {
            let Some(peer) = self.peers.get(port) else {
                continue;
            };
            if !peer.is_active() {
                continue;
            }
            if stored.receive_time.elapsed() >= timeout {
                continue;
            }
            let ann = &stored.announcement;
            if ann.is_loop_or_child_of(&self_key) {
                // Never adopt our own descendant as parent.
                continue;
            }
            let accept = match ann.root.cmp(&best_key) {
                Ordering::Greater => true,
                Ordering::Less => false,
                Ordering::Equal => match ann.sequence.cmp(&best_seq) {
                    Ordering::Greater => true,
                    Ordering::Less => false,
                    // Same epoch: the earliest arrival implies the lower
                    // latency path to the root.
                    Ordering::Equal => stored.receive_order < best_order,
                },
            };
            if accept {
                best_key = ann.root;
                best_seq = ann.sequence;
                best_order = stored.receive_order;
                best_port = Some(*port);
            }
        }

        if let Some(port) = best_port {
            if self.parent != Some(port) {
                self.set_parent(Some(port));
                info!(port, root = %best_key, "selected new parent");
                self.send_tree_announcements();
                return true;
            }
            return false;
        }

        // No suitable peer: claim root and let a peer correct us if it
        // matters.
        self.become_root();
        false
    }

    fn become_root(&mut self) {
        if self.parent.is_none() {
            return;
        }
        info!("becoming root");
        self.set_parent(None);
        self.maintain_tree();
    }

    fn set_parent(&mut self, parent: Option<Port>) {
        if self.parent == parent {
            return;
        }
        self.parent = parent;
        let parent_key = parent
            .and_then(|port| self.peers.get(&port))
            .map(|peer| *peer.key());
        self.emit(Event::ParentChanged { parent: parent_key });
    }

    // === Maintenance & broadcast ===

    /// Periodic tree maintenance. While acting as root, refresh the epoch
    /// and re-announce. Always reschedules itself.
    fn maintain_tree(&mut self) {
        if self.shutdown {
            return;
        }
        if self.parent.is_none() {
            self.sequence += 1;
            self.send_tree_announcements();
        }
        self.maintain_at = tokio::time::Instant::now() + self.tree_config.announcement_interval();
    }

    /// The announcement we would currently propagate: the parent's stored
    /// announcement, or a synthetic self-root one.
    fn root_announcement(&self) -> RootAnnouncement {
        match self.stored_root() {
            Some(stored) => stored.announcement.clone(),
            None => RootAnnouncement::root_candidate(*self.identity.node_key(), self.sequence),
        }
    }

    fn stored_root(&self) -> Option<&StoredAnnouncement> {
        self.parent.and_then(|port| self.announcements.get(&port))
    }

    fn coords(&self) -> Coordinates {
        match self.stored_root() {
            Some(stored) => stored.announcement.coords(),
            None => Coordinates::root(),
        }
    }

    fn send_tree_announcements(&mut self) {
        let ann = self.root_announcement();
        let ports: Vec<Port> = self
            .peers
            .values()
            .filter(|peer| peer.is_active())
            .map(Peer::port)
            .collect();
        for port in ports {
            self.send_tree_announcement_to_peer(&ann, port);
        }
    }

    /// Sign the announcement for one peer's port and enqueue it.
    fn send_tree_announcement_to_peer(&self, ann: &RootAnnouncement, port: Port) {
        let Some(peer) = self.peers.get(&port) else {
            return;
        };
        if !peer.is_active() {
            return;
        }
        if ann.is_loop_or_child_of(self.identity.node_key()) {
            // Our signature is already in the chain; receivers would
            // discard it as a loop anyway.
            return;
        }
        let mut copy = ann.clone();
        if let Err(err) = copy.sign_hop(&self.identity, port) {
            error!(port, error = %err, "failed to sign tree announcement");
            return;
        }
        if !peer.push(Frame::tree_announcement(copy.marshal())) {
            debug!(port, "dropped tree announcement for peer");
        }
    }

    // === Next-hop resolution ===

    /// Resolve the next hop for a routed frame.
    ///
    /// `from` is the address the frame arrived from, if any; the only
    /// anti-backtracking rule is skipping that peer. Key-routed
    /// destinations belong to the snake layer and resolve to `None` here.
    fn next_hop(
        &self,
        from: Option<Destination>,
        _frame_type: FrameType,
        dest: &Destination,
    ) -> Option<NextHop> {
        let from_port = match &from {
            Some(addr) => match self.lookup_peer_for_addr(addr) {
                Some(port) => Some(port),
                None => {
                    debug!("could not find peer info for previous peer");
                    return None;
                }
            },
            None => None,
        };

        let coords = match dest {
            Destination::Coords(coords) => coords,
            Destination::Key(_) => {
                debug!("key-routed destination is not resolved by the tree");
                return None;
            }
        };

        match self.next_hops_tree(from_port, coords)? {
            HopPort::Local => Some(NextHop::Local),
            HopPort::Peer(port) => {
                let stored = self.announcements.get(&port)?;
                Some(NextHop::Forward(Destination::Coords(
                    stored.announcement.peer_coords(),
                )))
            }
        }
    }

    /// Pick the peer that takes the frame strictly closer to `dest`.
    fn next_hops_tree(&self, from: Option<Port>, dest: &Coordinates) -> Option<HopPort> {
        let our_root = self.root_announcement();
        let our_coords = our_root.coords();

        if *dest == our_coords {
            return Some(HopPort::Local);
        }
        let our_dist = our_coords.distance_to(dest);
        if our_dist == 0 {
            // Impossible to get closer; the traffic is for us.
            return Some(HopPort::Local);
        }

        let mut best_dist = our_dist;
        let mut best_port: Option<Port> = None;
        for (port, stored) in &self.announcements {
            let Some(peer) = self.peers.get(port) else {
                continue;
            };
            if !peer.is_active() {
                continue;
            }
            if from == Some(*port) {
                continue;
            }
            let ann = &stored.announcement;
            // Coordinates are only comparable within one epoch.
            if ann.root != our_root.root || ann.sequence != our_root.sequence {
                continue;
            }
            let peer_coords = ann.peer_coords();
            let peer_dist = peer_coords.distance_to(dest);
            if peer_dist == 0 || peer_coords == *dest {
                // The peer is the destination itself.
                return Some(HopPort::Peer(*port));
            }
            if peer_dist < best_dist {
                best_dist = peer_dist;
                best_port = Some(*port);
            }
        }

        best_port.map(HopPort::Peer)
    }

    /// Find the peer slot a frame address refers to.
    fn lookup_peer_for_addr(&self, addr: &Destination) -> Option<Port> {
        match addr {
            Destination::Key(key) => self
                .peers
                .values()
                .find(|peer| peer.key() == key && peer.is_active())
                .map(Peer::port),
            Destination::Coords(coords) => self
                .announcements
                .iter()
                .filter(|(port, _)| {
                    self.peers
                        .get(*port)
                        .is_some_and(|peer| peer.is_active())
                })
                .find(|(_, stored)| stored.announcement.peer_coords() == *coords)
                .map(|(port, _)| *port),
        }
    }

    // === Snapshots & events ===

    fn node_state(&self) -> NodeState {
        let mut connections = BTreeMap::new();
        for (port, peer) in &self.peers {
            connections.insert(*port, *peer.key());
        }
        let parent = self
            .parent
            .and_then(|port| self.peers.get(&port))
            .map(|peer| *peer.key());
        let (root_announcement, announcement_time) = match self.stored_root() {
            Some(stored) => (stored.announcement.clone(), unix_nanos(stored.received_at)),
            None => (
                RootAnnouncement::root_candidate(*self.identity.node_key(), self.sequence),
                0,
            ),
        };
        NodeState {
            key: *self.identity.node_key(),
            connections,
            parent,
            coords: root_announcement.coords(),
            root_announcement,
            announcement_time,
        }
    }

    fn tree_position(&self) -> (NodeKey, Coordinates) {
        match self.stored_root() {
            Some(stored) => (stored.announcement.root, stored.announcement.coords()),
            None => (*self.identity.node_key(), Coordinates::root()),
        }
    }

    fn emit_tree_deltas(&mut self, before: (NodeKey, Coordinates)) {
        let (root, coords) = self.tree_position();
        if root != before.0 {
            self.emit(Event::RootChanged { root });
        }
        if coords != before.1 {
            self.emit(Event::CoordsChanged { coords });
        }
    }

    fn emit(&mut self, event: Event) {
        self.subscribers.retain(|sink| sink.send(event.clone()).is_ok());
    }

    /// Invariant checks between actor steps. Violations abort in debug
    /// builds and log in release builds.
    fn check_invariants(&self) {
        let parent_ok = match self.parent {
            None => true,
            Some(port) => {
                self.peers.contains_key(&port) && self.announcements.contains_key(&port)
            }
        };
        debug_assert!(parent_ok, "parent must be a known peer with an announcement");
        debug_assert!(
            !self.waiting || self.parent.is_none(),
            "must be parentless while waiting to re-parent"
        );
        if !parent_ok {
            error!("tree invariant violated: parent without peer or announcement");
        }
    }
}

fn unix_nanos(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
