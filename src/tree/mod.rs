//! Spanning tree entities.
//!
//! Coordinates and signed root announcements for the Arbor spanning tree.
//! The tree provides a routing topology where each node maintains a signed
//! path to a common root, enabling greedy distance-based forwarding.

mod announcement;
mod coords;

use thiserror::Error;

pub use announcement::{HopSignature, RootAnnouncement};
pub use coords::{Coordinates, Port};

use crate::proto::ProtocolError;

/// Errors related to spanning tree operations.
///
/// All of these are absorbed at the actor boundary: the offending
/// announcement is dropped, state is left unchanged and the peer stays
/// connected.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("announcement has no signatures")]
    NoSignatures,

    #[error("first signature does not match the root key")]
    RootSignerMismatch,

    #[error("announcement contains an invalid zero hop")]
    ZeroHop,

    #[error("last signature is not from the direct peer")]
    SenderMismatch,

    #[error("announcement signature chain contains a loop")]
    RoutingLoop,

    #[error("announcement replays an old sequence number")]
    SequenceReplay,

    #[error("update from parent during the reparent wait")]
    ParentWhileWaiting,

    #[error("signature verification failed at hop {0}")]
    InvalidSignature(usize),

    #[error("no active peer on port {0}")]
    UnknownPeer(Port),

    #[error("codec error: {0}")]
    Codec(#[from] ProtocolError),
}
