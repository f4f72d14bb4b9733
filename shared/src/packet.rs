//! Packet definitions for both directions of the connection.
//!
//! Clients never send their own id in position, state or attack packets;
//! the server stamps the sender's slot id on the copy it re-broadcasts.
//! That is why the two directions have separate enums.

use crate::codec::{PacketReader, PacketWriter};
use crate::error::ProtocolError;
use crate::{PlayerId, Vec3, DEFAULT_HIT_DAMAGE, MAX_CLIENT_FRAME_LEN};
use bytes::Bytes;

/// First byte of every frame body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Welcome = 1,
    PlayerPosition = 2,
    PlayerState = 3,
    FlagUpdate = 4,
    PlayerJoined = 5,
    PlayerLeft = 6,
    Attack = 7,
    TakeHit = 8,
    SlotRequest = 9,
    RequestFlagPickup = 10,
    RequestFlagDrop = 11,
    PlayerScore = 12,
    GameWon = 13,
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => PacketType::Welcome,
            2 => PacketType::PlayerPosition,
            3 => PacketType::PlayerState,
            4 => PacketType::FlagUpdate,
            5 => PacketType::PlayerJoined,
            6 => PacketType::PlayerLeft,
            7 => PacketType::Attack,
            8 => PacketType::TakeHit,
            9 => PacketType::SlotRequest,
            10 => PacketType::RequestFlagPickup,
            11 => PacketType::RequestFlagDrop,
            12 => PacketType::PlayerScore,
            13 => PacketType::GameWon,
            other => return Err(ProtocolError::UnknownType(other)),
        })
    }
}

/// Reads the type byte and hands back a reader positioned at the payload.
fn split_type(frame: &[u8]) -> Result<(PacketType, PacketReader<'_>), ProtocolError> {
    let (&first, payload) = frame.split_first().ok_or(ProtocolError::Empty)?;
    Ok((PacketType::try_from(first)?, PacketReader::new(payload)))
}

/// Packets a client sends to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientPacket {
    /// Echo of the id received in the server's welcome.
    Welcome { player_id: PlayerId },
    PlayerPosition { position: Vec3, rotation: Vec3 },
    PlayerState {
        hits: i32,
        is_flag_holder: bool,
        score: f32,
        stamina: f32,
        animation: String,
    },
    Attack { position: Vec3 },
    TakeHit { target_id: PlayerId, damage: i32 },
    SlotRequest { slot: i32 },
    RequestFlagPickup { position: Vec3 },
    RequestFlagDrop { position: Vec3 },
}

impl ClientPacket {
    pub fn packet_type(&self) -> PacketType {
        match self {
            ClientPacket::Welcome { .. } => PacketType::Welcome,
            ClientPacket::PlayerPosition { .. } => PacketType::PlayerPosition,
            ClientPacket::PlayerState { .. } => PacketType::PlayerState,
            ClientPacket::Attack { .. } => PacketType::Attack,
            ClientPacket::TakeHit { .. } => PacketType::TakeHit,
            ClientPacket::SlotRequest { .. } => PacketType::SlotRequest,
            ClientPacket::RequestFlagPickup { .. } => PacketType::RequestFlagPickup,
            ClientPacket::RequestFlagDrop { .. } => PacketType::RequestFlagDrop,
        }
    }

    /// Encodes the frame body (type byte + payload), without length prefix.
    pub fn encode(&self) -> Bytes {
        let mut w = PacketWriter::new(self.packet_type());
        match self {
            ClientPacket::Welcome { player_id } => {
                w.player_id(*player_id);
            }
            ClientPacket::PlayerPosition { position, rotation } => {
                w.vec3(*position).vec3(*rotation);
            }
            ClientPacket::PlayerState {
                hits,
                is_flag_holder,
                score,
                stamina,
                animation,
            } => {
                w.i32(*hits)
                    .bool(*is_flag_holder)
                    .f32(*score)
                    .f32(*stamina)
                    .string(animation);
            }
            ClientPacket::Attack { position } => {
                w.vec3(*position);
            }
            ClientPacket::TakeHit { target_id, damage } => {
                w.player_id(*target_id).i32(*damage);
            }
            ClientPacket::SlotRequest { slot } => {
                w.i32(*slot);
            }
            ClientPacket::RequestFlagPickup { position }
            | ClientPacket::RequestFlagDrop { position } => {
                w.vec3(*position);
            }
        }
        w.finish()
    }

    /// Decodes one frame body. Pure function of the given bytes.
    ///
    /// Bodies over [`MAX_CLIENT_FRAME_LEN`] are refused so that the
    /// id-stamped copy sent to other players still fits in a frame.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        if frame.len() > MAX_CLIENT_FRAME_LEN {
            return Err(ProtocolError::TooLarge {
                len: frame.len(),
                max: MAX_CLIENT_FRAME_LEN,
            });
        }
        let (packet_type, mut r) = split_type(frame)?;

        let packet = match packet_type {
            PacketType::Welcome => ClientPacket::Welcome {
                player_id: r.read_player_id("player id")?,
            },
            PacketType::PlayerPosition => ClientPacket::PlayerPosition {
                position: r.read_vec3("position")?,
                rotation: r.read_vec3("rotation")?,
            },
            PacketType::PlayerState => ClientPacket::PlayerState {
                hits: r.read_i32("hits")?,
                is_flag_holder: r.read_bool("flag holder")?,
                score: r.read_f32("score")?,
                stamina: r.read_f32("stamina")?,
                animation: r.read_string("animation state")?,
            },
            PacketType::Attack => ClientPacket::Attack {
                position: r.read_vec3("attack position")?,
            },
            PacketType::TakeHit => {
                let target_id = r.read_player_id("target id")?;
                // Older clients send only the target.
                let damage = if r.remaining() == 0 {
                    DEFAULT_HIT_DAMAGE
                } else {
                    r.read_i32("damage")?
                };
                ClientPacket::TakeHit { target_id, damage }
            }
            PacketType::SlotRequest => ClientPacket::SlotRequest {
                slot: r.read_i32("slot")?,
            },
            PacketType::RequestFlagPickup => ClientPacket::RequestFlagPickup {
                position: r.read_vec3("flag position")?,
            },
            PacketType::RequestFlagDrop => ClientPacket::RequestFlagDrop {
                position: r.read_vec3("flag position")?,
            },
            other => return Err(ProtocolError::UnexpectedType(other)),
        };

        r.finish()?;
        Ok(packet)
    }
}

/// Packets the server sends to clients.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerPacket {
    Welcome {
        player_id: PlayerId,
    },
    PlayerPosition {
        player_id: PlayerId,
        position: Vec3,
        rotation: Vec3,
    },
    PlayerState {
        player_id: PlayerId,
        hits: i32,
        is_flag_holder: bool,
        score: f32,
        stamina: f32,
        animation: String,
    },
    FlagUpdate {
        player_id: PlayerId,
        is_pickup: bool,
        position: Vec3,
    },
    PlayerJoined {
        player_id: PlayerId,
        total_players: i32,
    },
    PlayerLeft {
        player_id: PlayerId,
        total_players: i32,
    },
    Attack {
        attacker_id: PlayerId,
        position: Vec3,
    },
    TakeHit {
        target_id: PlayerId,
        damage: i32,
    },
    PlayerScore {
        player_id: PlayerId,
        score: f32,
    },
    GameWon {
        winner_id: PlayerId,
    },
}

impl ServerPacket {
    pub fn packet_type(&self) -> PacketType {
        match self {
            ServerPacket::Welcome { .. } => PacketType::Welcome,
            ServerPacket::PlayerPosition { .. } => PacketType::PlayerPosition,
            ServerPacket::PlayerState { .. } => PacketType::PlayerState,
            ServerPacket::FlagUpdate { .. } => PacketType::FlagUpdate,
            ServerPacket::PlayerJoined { .. } => PacketType::PlayerJoined,
            ServerPacket::PlayerLeft { .. } => PacketType::PlayerLeft,
            ServerPacket::Attack { .. } => PacketType::Attack,
            ServerPacket::TakeHit { .. } => PacketType::TakeHit,
            ServerPacket::PlayerScore { .. } => PacketType::PlayerScore,
            ServerPacket::GameWon { .. } => PacketType::GameWon,
        }
    }

    /// Encodes the frame body (type byte + payload), without length prefix.
    pub fn encode(&self) -> Bytes {
        let mut w = PacketWriter::new(self.packet_type());
        match self {
            ServerPacket::Welcome { player_id } => {
                w.player_id(*player_id);
            }
            ServerPacket::PlayerPosition {
                player_id,
                position,
                rotation,
            } => {
                w.player_id(*player_id).vec3(*position).vec3(*rotation);
            }
            ServerPacket::PlayerState {
                player_id,
                hits,
                is_flag_holder,
                score,
                stamina,
                animation,
            } => {
                w.player_id(*player_id)
                    .i32(*hits)
                    .bool(*is_flag_holder)
                    .f32(*score)
                    .f32(*stamina)
                    .string(animation);
            }
            ServerPacket::FlagUpdate {
                player_id,
                is_pickup,
                position,
            } => {
                w.player_id(*player_id).bool(*is_pickup).vec3(*position);
            }
            ServerPacket::PlayerJoined {
                player_id,
                total_players,
            }
            | ServerPacket::PlayerLeft {
                player_id,
                total_players,
            } => {
                w.player_id(*player_id).i32(*total_players);
            }
            ServerPacket::Attack {
                attacker_id,
                position,
            } => {
                w.player_id(*attacker_id).vec3(*position);
            }
            ServerPacket::TakeHit { target_id, damage } => {
                w.player_id(*target_id).i32(*damage);
            }
            ServerPacket::PlayerScore { player_id, score } => {
                w.player_id(*player_id).f32(*score);
            }
            ServerPacket::GameWon { winner_id } => {
                w.player_id(*winner_id);
            }
        }
        w.finish()
    }

    /// Decodes one frame body. Pure function of the given bytes.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        let (packet_type, mut r) = split_type(frame)?;

        let packet = match packet_type {
            PacketType::Welcome => ServerPacket::Welcome {
                player_id: r.read_player_id("player id")?,
            },
            PacketType::PlayerPosition => ServerPacket::PlayerPosition {
                player_id: r.read_player_id("player id")?,
                position: r.read_vec3("position")?,
                rotation: r.read_vec3("rotation")?,
            },
            PacketType::PlayerState => ServerPacket::PlayerState {
                player_id: r.read_player_id("player id")?,
                hits: r.read_i32("hits")?,
                is_flag_holder: r.read_bool("flag holder")?,
                score: r.read_f32("score")?,
                stamina: r.read_f32("stamina")?,
                animation: r.read_string("animation state")?,
            },
            PacketType::FlagUpdate => ServerPacket::FlagUpdate {
                player_id: r.read_player_id("player id")?,
                is_pickup: r.read_bool("pickup flag")?,
                position: r.read_vec3("flag position")?,
            },
            PacketType::PlayerJoined => ServerPacket::PlayerJoined {
                player_id: r.read_player_id("player id")?,
                total_players: r.read_i32("total players")?,
            },
            PacketType::PlayerLeft => ServerPacket::PlayerLeft {
                player_id: r.read_player_id("player id")?,
                total_players: r.read_i32("total players")?,
            },
            PacketType::Attack => ServerPacket::Attack {
                attacker_id: r.read_player_id("attacker id")?,
                position: r.read_vec3("attack position")?,
            },
            PacketType::TakeHit => ServerPacket::TakeHit {
                target_id: r.read_player_id("target id")?,
                damage: r.read_i32("damage")?,
            },
            PacketType::PlayerScore => ServerPacket::PlayerScore {
                player_id: r.read_player_id("player id")?,
                score: r.read_f32("score")?,
            },
            PacketType::GameWon => ServerPacket::GameWon {
                winner_id: r.read_player_id("winner id")?,
            },
            other => return Err(ProtocolError::UnexpectedType(other)),
        };

        r.finish()?;
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le_f32s(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_packet_type_codes() {
        assert_eq!(PacketType::Welcome as u8, 1);
        assert_eq!(PacketType::RequestFlagPickup as u8, 10);
        assert_eq!(PacketType::RequestFlagDrop as u8, 11);
        assert_eq!(PacketType::PlayerScore as u8, 12);
        assert_eq!(PacketType::GameWon as u8, 13);
        assert_eq!(PacketType::try_from(8).unwrap(), PacketType::TakeHit);
        assert_eq!(PacketType::try_from(0), Err(ProtocolError::UnknownType(0)));
        assert_eq!(PacketType::try_from(14), Err(ProtocolError::UnknownType(14)));
    }

    #[test]
    fn test_decode_client_position_layout() {
        let mut frame = vec![2u8];
        frame.extend(le_f32s(&[1.0, 2.0, 3.0, 0.0, 90.0, 0.0]));
        assert_eq!(frame.len(), 25);

        let packet = ClientPacket::decode(&frame).unwrap();
        assert_eq!(
            packet,
            ClientPacket::PlayerPosition {
                position: Vec3::new(1.0, 2.0, 3.0),
                rotation: Vec3::new(0.0, 90.0, 0.0),
            }
        );
    }

    #[test]
    fn test_decode_client_state_layout() {
        let mut frame = vec![3u8];
        frame.extend(4i32.to_le_bytes());
        frame.push(1);
        frame.extend(le_f32s(&[12.0, 0.5]));
        frame.extend(3i32.to_le_bytes());
        frame.extend_from_slice(b"Run");

        let packet = ClientPacket::decode(&frame).unwrap();
        assert_eq!(
            packet,
            ClientPacket::PlayerState {
                hits: 4,
                is_flag_holder: true,
                score: 12.0,
                stamina: 0.5,
                animation: "Run".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_take_hit_without_damage() {
        let mut frame = vec![8u8];
        frame.extend(2i32.to_le_bytes());
        assert_eq!(
            ClientPacket::decode(&frame).unwrap(),
            ClientPacket::TakeHit {
                target_id: 2,
                damage: DEFAULT_HIT_DAMAGE,
            }
        );

        frame.extend(5i32.to_le_bytes());
        assert_eq!(
            ClientPacket::decode(&frame).unwrap(),
            ClientPacket::TakeHit {
                target_id: 2,
                damage: 5,
            }
        );
    }

    #[test]
    fn test_decode_take_hit_with_partial_damage_is_truncated() {
        let mut frame = vec![8u8];
        frame.extend(2i32.to_le_bytes());
        frame.extend([5u8, 0]);
        assert!(matches!(
            ClientPacket::decode(&frame),
            Err(ProtocolError::Truncated { field: "damage", .. })
        ));
    }

    #[test]
    fn test_decode_truncated_pickup_request() {
        let mut frame = vec![10u8];
        frame.extend(le_f32s(&[1.0, 2.0]));
        assert!(matches!(
            ClientPacket::decode(&frame),
            Err(ProtocolError::Truncated {
                field: "flag position",
                needed: 12,
                remaining: 8,
            })
        ));
    }

    #[test]
    fn test_decode_rejects_empty_and_unknown() {
        assert_eq!(ClientPacket::decode(&[]), Err(ProtocolError::Empty));
        assert_eq!(
            ClientPacket::decode(&[42, 0, 0]),
            Err(ProtocolError::UnknownType(42))
        );
    }

    #[test]
    fn test_client_cannot_send_server_only_packets() {
        let flag_update = ServerPacket::FlagUpdate {
            player_id: 1,
            is_pickup: true,
            position: Vec3::ZERO,
        }
        .encode();
        assert_eq!(
            ClientPacket::decode(&flag_update),
            Err(ProtocolError::UnexpectedType(PacketType::FlagUpdate))
        );

        let game_won = ServerPacket::GameWon { winner_id: 1 }.encode();
        assert_eq!(
            ClientPacket::decode(&game_won),
            Err(ProtocolError::UnexpectedType(PacketType::GameWon))
        );
    }

    #[test]
    fn test_server_decoder_rejects_requests() {
        let drop = ClientPacket::RequestFlagDrop {
            position: Vec3::ZERO,
        }
        .encode();
        assert_eq!(
            ServerPacket::decode(&drop),
            Err(ProtocolError::UnexpectedType(PacketType::RequestFlagDrop))
        );
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut frame = vec![9u8];
        frame.extend(3i32.to_le_bytes());
        frame.push(0);
        assert_eq!(
            ClientPacket::decode(&frame),
            Err(ProtocolError::TrailingBytes { extra: 1 })
        );
    }

    #[test]
    fn test_server_flag_update_layout() {
        let bytes = ServerPacket::FlagUpdate {
            player_id: 1,
            is_pickup: true,
            position: Vec3::new(0.0, 1.0, 2.0),
        }
        .encode();

        let mut expected = vec![4u8];
        expected.extend(1i32.to_le_bytes());
        expected.push(1);
        expected.extend(le_f32s(&[0.0, 1.0, 2.0]));
        assert_eq!(&bytes[..], &expected[..]);
        assert_eq!(bytes.len(), 18);
    }

    #[test]
    fn test_server_state_roundtrip_keeps_utf8() {
        let packet = ServerPacket::PlayerState {
            player_id: 2,
            hits: 1,
            is_flag_holder: false,
            score: 33.5,
            stamina: 0.75,
            animation: "Ätt@ck".to_string(),
        };
        assert_eq!(ServerPacket::decode(&packet.encode()).unwrap(), packet);
    }

    fn client_state(animation_len: usize) -> ClientPacket {
        ClientPacket::PlayerState {
            hits: 0,
            is_flag_holder: false,
            score: 0.0,
            stamina: 1.0,
            animation: "a".repeat(animation_len),
        }
    }

    #[test]
    fn test_largest_client_state_still_relays_in_one_frame() {
        let packet = client_state(MAX_CLIENT_FRAME_LEN - 18);
        let body = packet.encode();
        assert_eq!(body.len(), MAX_CLIENT_FRAME_LEN);

        let ClientPacket::PlayerState { animation, .. } = ClientPacket::decode(&body).unwrap()
        else {
            panic!("expected PlayerState");
        };
        let relayed = ServerPacket::PlayerState {
            player_id: 8,
            hits: 0,
            is_flag_holder: false,
            score: 0.0,
            stamina: 1.0,
            animation,
        }
        .encode();
        assert_eq!(relayed.len(), crate::MAX_FRAME_LEN);
    }

    #[test]
    fn test_full_size_client_frame_is_rejected() {
        let body = client_state(crate::MAX_FRAME_LEN - 18).encode();
        assert_eq!(body.len(), crate::MAX_FRAME_LEN);
        assert_eq!(
            ClientPacket::decode(&body),
            Err(ProtocolError::TooLarge {
                len: crate::MAX_FRAME_LEN,
                max: MAX_CLIENT_FRAME_LEN,
            })
        );
    }

    #[test]
    fn test_client_request_roundtrip() {
        let packet = ClientPacket::RequestFlagPickup {
            position: Vec3::new(-4.0, 0.5, 9.25),
        };
        assert_eq!(ClientPacket::decode(&packet.encode()).unwrap(), packet);
    }
}
