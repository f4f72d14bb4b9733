//! Fan-out of server packets to connected sessions.

use crate::client_manager::{ClientManager, SessionHandle};
use bytes::Bytes;
use log::{debug, warn};
use shared::{PlayerId, ServerPacket};
use tokio::sync::mpsc::error::TrySendError;

/// Anything the authority and dispatcher can announce packets through.
pub trait Broadcast {
    fn send_to(&mut self, player_id: PlayerId, packet: &ServerPacket);

    /// Sends to every live session except `exclude`.
    fn broadcast(&mut self, packet: &ServerPacket, exclude: Option<PlayerId>);
}

/// Queues one frame without waiting. A full queue drops the frame for this
/// peer only, so a stalled client never holds up the others.
fn deliver(player_id: PlayerId, session: &SessionHandle, frame: Bytes) -> bool {
    match session.outbound().try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!("Outbound queue full for player {}, dropping packet", player_id);
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!("Session for player {} already closed", player_id);
            false
        }
    }
}

impl Broadcast for ClientManager {
    fn send_to(&mut self, player_id: PlayerId, packet: &ServerPacket) {
        match self.get(player_id) {
            Some(session) => {
                deliver(player_id, session, packet.encode());
            }
            None => debug!(
                "No session in slot {} for {:?}",
                player_id,
                packet.packet_type()
            ),
        }
    }

    fn broadcast(&mut self, packet: &ServerPacket, exclude: Option<PlayerId>) {
        let frame = packet.encode();
        for (player_id, session) in self.sessions() {
            if Some(player_id) == exclude {
                continue;
            }
            deliver(player_id, session, frame.clone());
        }
    }
}

/// Where a recorded packet was headed.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    To(PlayerId),
    All { exclude: Option<PlayerId> },
}

/// Records packets instead of sending them.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct PacketLog {
    pub sent: Vec<(Delivery, ServerPacket)>,
}

#[cfg(test)]
impl PacketLog {
    pub fn packets(&self) -> Vec<ServerPacket> {
        self.sent.iter().map(|(_, packet)| packet.clone()).collect()
    }

    pub fn take(&mut self) -> Vec<(Delivery, ServerPacket)> {
        std::mem::take(&mut self.sent)
    }
}

#[cfg(test)]
impl Broadcast for PacketLog {
    fn send_to(&mut self, player_id: PlayerId, packet: &ServerPacket) {
        self.sent.push((Delivery::To(player_id), packet.clone()));
    }

    fn broadcast(&mut self, packet: &ServerPacket, exclude: Option<PlayerId>) {
        self.sent.push((Delivery::All { exclude }, packet.clone()));
    }
}
