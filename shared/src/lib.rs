//! Wire protocol shared between the flag server and its clients.
//!
//! Every packet travels as a length-prefixed frame:
//!
//! ```text
//! [i32 LE frame_len][u8 packet_type][payload ...]
//! ```
//!
//! `frame_len` counts the type byte plus the payload. Payload fields are
//! fixed-width little-endian integers and floats, one-byte booleans, and
//! strings written as an `i32` byte count followed by UTF-8 bytes.

use serde::{Deserialize, Serialize};

pub mod codec;
pub mod error;
pub mod packet;

pub use codec::{FrameCodec, PacketReader, PacketWriter};
pub use error::{FrameError, ProtocolError};
pub use packet::{ClientPacket, PacketType, ServerPacket};

pub const DEFAULT_PORT: u16 = 7777;
pub const DEFAULT_MAX_PLAYERS: usize = 8;

/// Size of the length prefix in front of every frame.
pub const FRAME_HEADER_LEN: usize = 4;
/// Largest accepted frame body (type byte + payload).
pub const MAX_FRAME_LEN: usize = 4096;
/// Largest client body the server accepts; the relayed copy gains a 4-byte sender id.
pub const MAX_CLIENT_FRAME_LEN: usize = MAX_FRAME_LEN - 4;

/// Damage reported with a hit when the client leaves it out.
pub const DEFAULT_HIT_DAMAGE: i32 = 1;

/// Slot number a player occupies, 1-based.
pub type PlayerId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_vec3_distance() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 6.0, 3.0);
        assert_approx_eq!(a.distance(&b), 5.0, 0.0001);
        assert_approx_eq!(b.distance(&a), 5.0, 0.0001);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_vec3_default_is_origin() {
        assert_eq!(Vec3::default(), Vec3::ZERO);
    }

    #[test]
    fn test_vec3_display() {
        assert_eq!(Vec3::new(1.0, -2.5, 0.125).to_string(), "(1.00, -2.50, 0.13)");
    }
}
