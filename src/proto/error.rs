//! Protocol error types.

use thiserror::Error;

/// Errors related to protocol message handling.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid frame type: 0x{0:02x}")]
    InvalidFrameType(u8),

    #[error("message too short: expected at least {expected}, got {got}")]
    MessageTooShort { expected: usize, got: usize },

    #[error("unexpected trailing bytes: {0}")]
    TrailingBytes(usize),

    #[error("invalid signature encoding")]
    InvalidSignature,

    #[error("invalid public key encoding")]
    InvalidKey,

    #[error("malformed message: {0}")]
    Malformed(String),
}
