//! Slot table for connected players
//!
//! This module owns the fixed set of numbered player slots, including:
//! - Slot assignment for new connections (lowest free id first)
//! - Session handles used to queue outbound frames
//! - Detection of sessions whose task has already ended
//! - Join/leave announcements to the other players
//!
//! Slots are created once at startup and never removed. Disconnecting
//! clears the slot so its id can be handed to the next connection.

use crate::broadcast::Broadcast;
use bytes::Bytes;
use log::info;
use shared::{PlayerId, ServerPacket};
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// The server's side of one live connection
///
/// Holds the outbound queue feeding the session task. Dropping the handle
/// closes that queue, which makes the session flush what is left and close
/// the socket.
#[derive(Debug)]
pub struct SessionHandle {
    /// Unique per accepted socket, never reused
    pub connection_id: u64,
    /// Peer address, for logging
    pub addr: SocketAddr,
    outbound: mpsc::Sender<Bytes>,
}

impl SessionHandle {
    pub fn new(connection_id: u64, addr: SocketAddr, outbound: mpsc::Sender<Bytes>) -> Self {
        Self {
            connection_id,
            addr,
            outbound,
        }
    }

    /// True once the session task has stopped reading its queue
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    pub(crate) fn outbound(&self) -> &mpsc::Sender<Bytes> {
        &self.outbound
    }
}

/// Fixed-capacity table of player slots
///
/// Slot `i` in the vector holds player id `i + 1`. A slot is free when it
/// is empty or its session has already shut down.
pub struct ClientManager {
    slots: Vec<Option<SessionHandle>>,
    /// Number of occupied slots
    connected: usize,
}

impl ClientManager {
    /// Creates a table with `max_clients` empty slots
    pub fn new(max_clients: usize) -> Self {
        Self {
            slots: (0..max_clients).map(|_| None).collect(),
            connected: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn index(&self, player_id: PlayerId) -> Option<usize> {
        let index = (player_id as usize).checked_sub(1)?;
        (index < self.slots.len()).then_some(index)
    }

    /// Lowest player id whose slot can take a new connection
    pub fn free_slot(&self) -> Option<PlayerId> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().map_or(true, SessionHandle::is_closed))
            .map(|index| index as PlayerId + 1)
    }

    /// Binds a new session to the lowest free slot
    ///
    /// Returns the assigned player id, or None when every slot holds a live
    /// session. A dead session still sitting in the chosen slot is released
    /// first.
    pub fn add_client(&mut self, handle: SessionHandle) -> Option<PlayerId> {
        let player_id = self.free_slot()?;
        let index = player_id as usize - 1;

        if let Some(stale) = self.slots[index].take() {
            info!(
                "Cleaning up closed session {} in slot {}",
                stale.connection_id, player_id
            );
            self.connected -= 1;
        }

        info!(
            "Assigning connection {} from {} to slot {}",
            handle.connection_id, handle.addr, player_id
        );
        self.slots[index] = Some(handle);
        self.connected += 1;

        Some(player_id)
    }

    /// Clears a slot and hands back its session
    ///
    /// With `connection_id` set, the slot is only cleared if it still belongs
    /// to that connection, so a late notice from an old session cannot evict
    /// the player who took the slot afterwards.
    pub fn remove_client(
        &mut self,
        player_id: PlayerId,
        connection_id: Option<u64>,
    ) -> Option<SessionHandle> {
        let index = self.index(player_id)?;
        let matches = match (&self.slots[index], connection_id) {
            (Some(handle), Some(expected)) => handle.connection_id == expected,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !matches {
            return None;
        }

        let handle = self.slots[index].take()?;
        self.connected -= 1;
        Some(handle)
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&SessionHandle> {
        self.index(player_id)
            .and_then(|index| self.slots[index].as_ref())
    }

    /// True if the slot holds a session that is still running
    pub fn is_connected(&self, player_id: PlayerId) -> bool {
        self.get(player_id).is_some_and(|handle| !handle.is_closed())
    }

    /// Occupied slots whose session task has already ended
    pub fn stale_slots(&self) -> Vec<PlayerId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.as_ref().is_some_and(SessionHandle::is_closed))
            .map(|(index, _)| index as PlayerId + 1)
            .collect()
    }

    /// Live sessions in ascending id order
    pub fn sessions(&self) -> impl Iterator<Item = (PlayerId, &SessionHandle)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref()
                    .filter(|handle| !handle.is_closed())
                    .map(|handle| (index as PlayerId + 1, handle))
            })
    }

    pub fn connected_ids(&self) -> Vec<PlayerId> {
        self.sessions().map(|(id, _)| id).collect()
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.connected
    }

    pub fn is_empty(&self) -> bool {
        self.connected == 0
    }

    /// Greets a newly bound player and tells everyone else about them
    ///
    /// The newcomer gets its Welcome, then one PlayerJoined per player that
    /// was already here so its world converges, then the others hear about
    /// the newcomer.
    pub fn announce_join(&mut self, player_id: PlayerId) {
        let total_players = self.len() as i32;

        self.send_to(player_id, &ServerPacket::Welcome { player_id });

        for existing in self.connected_ids() {
            if existing == player_id {
                continue;
            }
            self.send_to(
                player_id,
                &ServerPacket::PlayerJoined {
                    player_id: existing,
                    total_players,
                },
            );
        }

        self.broadcast(
            &ServerPacket::PlayerJoined {
                player_id,
                total_players,
            },
            Some(player_id),
        );
    }

    /// Tells the remaining players that `player_id` is gone
    pub fn announce_leave(&mut self, player_id: PlayerId) {
        let total_players = self.len() as i32;
        self.broadcast(
            &ServerPacket::PlayerLeft {
                player_id,
                total_players,
            },
            Some(player_id),
        );
    }
}
