//! Arbor: self-healing spanning-tree overlay routing core.
//!
//! Every node keeps peer connections and participates in a global spanning
//! tree rooted at the highest-ordered public key it has observed. A node's
//! tree coordinates are the port path from the root, and forwarding picks
//! the peer that strictly reduces tree distance to the destination.

pub mod config;
pub mod identity;
pub mod peer;
pub mod proto;
pub mod router;
pub mod tree;

// Re-export config types
pub use config::{Config, ConfigError, IdentityConfig, NodeConfig, TreeConfig};

// Re-export identity types
pub use identity::{Identity, IdentityError, NodeKey, NODE_KEY_SIZE};

// Re-export peer types
pub use peer::{Peer, PeerInfo};

// Re-export protocol types
pub use proto::{Destination, Frame, FrameType, NextHop, ProtocolError};

// Re-export router types
pub use router::{Event, NodeState, Router, RouterError};

// Re-export tree types
pub use tree::{Coordinates, HopSignature, Port, RootAnnouncement, TreeError};
