//! Per-connection I/O task and packet dispatch
//!
//! Each accepted socket gets one [`Session`] task. It reads frames, decodes
//! them, and forwards good packets to the server task; at the same time it
//! drains the session's outbound queue onto the socket. A packet that fails
//! to decode is logged and skipped. A socket error, end of stream, broken
//! framing, or idle timeout ends the session.
//!
//! [`dispatch`] is what the server task does with a decoded packet.

use crate::broadcast::Broadcast;
use crate::game::GameState;
use crate::network::ServerMessage;
use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::{ClientPacket, FrameCodec, FrameError, PlayerId, ServerPacket};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite};

pub struct Session<S> {
    player_id: PlayerId,
    connection_id: u64,
    addr: SocketAddr,
    stream: S,
    outbound: mpsc::Receiver<Bytes>,
    server_tx: mpsc::Sender<ServerMessage>,
    idle_timeout: Option<Duration>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(
        player_id: PlayerId,
        connection_id: u64,
        addr: SocketAddr,
        stream: S,
        outbound: mpsc::Receiver<Bytes>,
        server_tx: mpsc::Sender<ServerMessage>,
    ) -> Self {
        Self {
            player_id,
            connection_id,
            addr,
            stream,
            outbound,
            server_tx,
            idle_timeout: None,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until the connection ends, then tells the server why.
    pub async fn run(mut self) {
        let (read_half, write_half) = tokio::io::split(self.stream);
        let mut reader = FramedRead::new(read_half, FrameCodec::new());
        let mut writer = FramedWrite::new(write_half, FrameCodec::new());
        let mut last_seen = Instant::now();

        debug!(
            "Session {} started for player {} ({})",
            self.connection_id, self.player_id, self.addr
        );

        let reason = loop {
            let idle_deadline = self.idle_timeout.map(|timeout| last_seen + timeout);

            tokio::select! {
                frame = reader.next() => match frame {
                    Some(Ok(frame)) => {
                        last_seen = Instant::now();
                        if let Some(packet) = decode_frame(self.player_id, &frame) {
                            let message = ServerMessage::PacketReceived {
                                player_id: self.player_id,
                                connection_id: self.connection_id,
                                packet,
                            };
                            if self.server_tx.send(message).await.is_err() {
                                break "server stopped".to_string();
                            }
                        }
                    }
                    Some(Err(e)) => break format!("read failed: {}", e),
                    None => break "connection closed by peer".to_string(),
                },

                outgoing = self.outbound.recv() => match outgoing {
                    Some(frame) => {
                        match writer.send(frame).await {
                            Ok(()) => {}
                            // Nothing was written, so the stream is still in sync.
                            Err(FrameError::InvalidLength { len, .. }) => {
                                warn!(
                                    "Skipping unframeable {}-byte packet for player {}",
                                    len, self.player_id
                                );
                            }
                            Err(e) => break format!("write failed: {}", e),
                        }
                    }
                    None => break "released by server".to_string(),
                },

                _ = idle_sleep(idle_deadline) => break "idle timeout".to_string(),
            }
        };

        info!(
            "Session {} for player {} ended: {}",
            self.connection_id, self.player_id, reason
        );

        // Ignored if the server has already let the slot go.
        let _ = self
            .server_tx
            .send(ServerMessage::Disconnected {
                player_id: self.player_id,
                connection_id: self.connection_id,
                reason,
            })
            .await;
    }
}

async fn idle_sleep(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn decode_frame(player_id: PlayerId, frame: &BytesMut) -> Option<ClientPacket> {
    match ClientPacket::decode(frame) {
        Ok(packet) => Some(packet),
        Err(e) => {
            warn!(
                "Dropping packet type {} ({} bytes) from player {}: {}",
                frame.first().copied().unwrap_or_default(),
                frame.len(),
                player_id,
                e
            );
            None
        }
    }
}

/// Routes one decoded packet from `player_id`.
///
/// Movement, state and attacks are relayed to everyone else with the
/// sender's id stamped on. Flag requests and hits go through the authority.
pub fn dispatch<B: Broadcast>(
    player_id: PlayerId,
    packet: ClientPacket,
    game: &mut GameState,
    out: &mut B,
) {
    match packet {
        ClientPacket::Welcome { player_id: echoed } => {
            if echoed == player_id {
                debug!("Player {} acknowledged welcome", player_id);
            } else {
                warn!(
                    "Player {} acknowledged welcome with wrong id {}",
                    player_id, echoed
                );
            }
        }

        ClientPacket::PlayerPosition { position, rotation } => {
            game.record_position(player_id, position);
            out.broadcast(
                &ServerPacket::PlayerPosition {
                    player_id,
                    position,
                    rotation,
                },
                Some(player_id),
            );
        }

        // The reported score is relayed for display only; the authority
        // keeps its own.
        ClientPacket::PlayerState {
            hits,
            is_flag_holder,
            score,
            stamina,
            animation,
        } => {
            out.broadcast(
                &ServerPacket::PlayerState {
                    player_id,
                    hits,
                    is_flag_holder,
                    score,
                    stamina,
                    animation,
                },
                Some(player_id),
            );
        }

        ClientPacket::Attack { position } => {
            out.broadcast(
                &ServerPacket::Attack {
                    attacker_id: player_id,
                    position,
                },
                Some(player_id),
            );
        }

        ClientPacket::TakeHit { target_id, damage } => {
            out.broadcast(&ServerPacket::TakeHit { target_id, damage }, None);
            game.steal(player_id, target_id, out);
        }

        ClientPacket::SlotRequest { slot } => {
            debug!(
                "Player {} requested slot {}; slots are assigned on connect",
                player_id, slot
            );
        }

        ClientPacket::RequestFlagPickup { position } => {
            if let Err(e) = game.request_pickup(player_id, position, out) {
                info!("Pickup denied for player {}: {}", player_id, e);
            }
        }

        ClientPacket::RequestFlagDrop { position } => {
            if let Err(e) = game.request_drop(player_id, position, out) {
                info!("Drop denied for player {}: {}", player_id, e);
            }
        }
    }
}
