//! Error types for decoding frames and packets.

use crate::packet::PacketType;
use thiserror::Error;

/// A single packet payload could not be decoded.
///
/// These never end a session: the offending packet is dropped and the
/// reader moves on to the next frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty packet")]
    Empty,

    #[error("unknown packet type {0}")]
    UnknownType(u8),

    #[error("{0:?} packets are not accepted in this direction")]
    UnexpectedType(PacketType),

    #[error("truncated {field}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("negative string length {0}")]
    NegativeLength(i32),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid player id {0}")]
    InvalidPlayerId(i32),

    #[error("{extra} unexpected trailing bytes")]
    TrailingBytes { extra: usize },

    #[error("packet of {len} bytes is too large to relay (max {max})")]
    TooLarge { len: usize, max: usize },
}

/// The byte stream itself is unusable.
///
/// Once a length prefix is wrong there is no way to find the next frame
/// boundary, so the session is closed.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid frame length {len} (max {max})")]
    InvalidLength { len: i64, max: usize },
}
