//! Byte-level reading/writing of packet payloads and stream framing.

use crate::error::{FrameError, ProtocolError};
use crate::packet::PacketType;
use crate::{PlayerId, Vec3, FRAME_HEADER_LEN, MAX_FRAME_LEN};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Cursor over one received packet body.
///
/// Every read checks the remaining length first; running off the end is a
/// [`ProtocolError::Truncated`], never a panic.
pub struct PacketReader<'a> {
    buf: &'a [u8],
}

impl<'a> PacketReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn ensure(&self, field: &'static str, needed: usize) -> Result<(), ProtocolError> {
        if self.buf.len() < needed {
            return Err(ProtocolError::Truncated {
                field,
                needed,
                remaining: self.buf.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8, ProtocolError> {
        self.ensure(field, 1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_bool(&mut self, field: &'static str) -> Result<bool, ProtocolError> {
        Ok(self.read_u8(field)? != 0)
    }

    pub fn read_i32(&mut self, field: &'static str) -> Result<i32, ProtocolError> {
        self.ensure(field, 4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn read_f32(&mut self, field: &'static str) -> Result<f32, ProtocolError> {
        self.ensure(field, 4)?;
        Ok(self.buf.get_f32_le())
    }

    pub fn read_player_id(&mut self, field: &'static str) -> Result<PlayerId, ProtocolError> {
        let raw = self.read_i32(field)?;
        PlayerId::try_from(raw).map_err(|_| ProtocolError::InvalidPlayerId(raw))
    }

    pub fn read_vec3(&mut self, field: &'static str) -> Result<Vec3, ProtocolError> {
        self.ensure(field, 12)?;
        Ok(Vec3 {
            x: self.buf.get_f32_le(),
            y: self.buf.get_f32_le(),
            z: self.buf.get_f32_le(),
        })
    }

    pub fn read_string(&mut self, field: &'static str) -> Result<String, ProtocolError> {
        let len = self.read_i32(field)?;
        if len < 0 {
            return Err(ProtocolError::NegativeLength(len));
        }
        let len = len as usize;
        self.ensure(field, len)?;
        let (text, rest) = self.buf.split_at(len);
        self.buf = rest;
        String::from_utf8(text.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Fails if any payload bytes were left unread.
    pub fn finish(self) -> Result<(), ProtocolError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::TrailingBytes {
                extra: self.buf.len(),
            })
        }
    }
}

/// Builds one packet body, type byte first.
pub struct PacketWriter {
    buf: BytesMut,
}

impl PacketWriter {
    pub fn new(packet_type: PacketType) -> Self {
        let mut buf = BytesMut::with_capacity(32);
        buf.put_u8(packet_type as u8);
        Self { buf }
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.buf.put_u8(value as u8);
        self
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.buf.put_i32_le(value);
        self
    }

    pub fn f32(&mut self, value: f32) -> &mut Self {
        self.buf.put_f32_le(value);
        self
    }

    pub fn player_id(&mut self, value: PlayerId) -> &mut Self {
        self.i32(value as i32)
    }

    pub fn vec3(&mut self, value: Vec3) -> &mut Self {
        self.f32(value.x).f32(value.y).f32(value.z)
    }

    pub fn string(&mut self, value: &str) -> &mut Self {
        self.buf.put_i32_le(value.len() as i32);
        self.buf.put_slice(value.as_bytes());
        self
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Splits a TCP byte stream into frame bodies and prefixes outgoing ones.
///
/// Decoded items are the raw `[type][payload]` bytes; turning them into
/// packets is left to the caller so a bad payload only costs that packet.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_len: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            max_frame_len: MAX_FRAME_LEN,
        }
    }

    #[cfg(test)]
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let len = i32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        if len <= 0 || len as usize > self.max_frame_len {
            return Err(FrameError::InvalidLength {
                len: len as i64,
                max: self.max_frame_len,
            });
        }

        let frame_end = FRAME_HEADER_LEN + len as usize;
        if src.len() < frame_end {
            src.reserve(frame_end - src.len());
            return Ok(None);
        }

        src.advance(FRAME_HEADER_LEN);
        Ok(Some(src.split_to(len as usize)))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.is_empty() || item.len() > self.max_frame_len {
            return Err(FrameError::InvalidLength {
                len: item.len() as i64,
                max: self.max_frame_len,
            });
        }

        dst.reserve(FRAME_HEADER_LEN + item.len());
        dst.put_i32_le(item.len() as i32);
        dst.extend_from_slice(&item);
        Ok(())
    }
}
