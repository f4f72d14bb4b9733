//! Authoritative flag and score state
//!
//! Only this module changes who holds the flag or what anyone has scored.
//! Sessions and the ticker ask for changes through the methods below and
//! every accepted change is announced through a [`Broadcast`].

use crate::broadcast::Broadcast;
use crate::config::GameRules;
use log::{debug, info};
use shared::{PlayerId, ServerPacket, Vec3};
use std::collections::HashMap;
use std::fmt::Write;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlagState {
    OnGround(Vec3),
    Held(PlayerId),
}

/// A flag request that the current state does not allow.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    #[error("flag is already held by player {holder}")]
    AlreadyHeld { holder: PlayerId },

    #[error("player {player_id} is {distance:.2} away from the flag (max {radius:.2})")]
    TooFar {
        player_id: PlayerId,
        distance: f32,
        radius: f32,
    },

    #[error("player {player_id} does not hold the flag (holder: {holder:?})")]
    NotHolder {
        player_id: PlayerId,
        holder: Option<PlayerId>,
    },
}

#[derive(Debug, Clone)]
pub struct GameState {
    pub tick: u32,
    rules: GameRules,
    flag: FlagState,
    /// Last place the flag was seen, used when a holder vanishes
    flag_position: Vec3,
    scores: HashMap<PlayerId, f32>,
    positions: HashMap<PlayerId, Vec3>,
    wins: u32,
}

impl GameState {
    pub fn new(rules: GameRules) -> Self {
        let spawn = rules.flag_spawn;
        Self {
            tick: 0,
            rules,
            flag: FlagState::OnGround(spawn),
            flag_position: spawn,
            scores: HashMap::new(),
            positions: HashMap::new(),
            wins: 0,
        }
    }

    pub fn flag(&self) -> FlagState {
        self.flag
    }

    pub fn holder(&self) -> Option<PlayerId> {
        match self.flag {
            FlagState::Held(holder) => Some(holder),
            FlagState::OnGround(_) => None,
        }
    }

    pub fn score(&self, player_id: PlayerId) -> Option<f32> {
        self.scores.get(&player_id).copied()
    }

    pub fn scores(&self) -> &HashMap<PlayerId, f32> {
        &self.scores
    }

    /// Matches won since the server started
    pub fn wins(&self) -> u32 {
        self.wins
    }

    /// Remembers where a player last said they were.
    pub fn record_position(&mut self, player_id: PlayerId, position: Vec3) {
        self.positions.insert(player_id, position);
    }

    /// Gives the flag to `player_id` if nobody holds it.
    pub fn request_pickup<B: Broadcast>(
        &mut self,
        player_id: PlayerId,
        position: Vec3,
        out: &mut B,
    ) -> Result<(), StateError> {
        let ground = match self.flag {
            FlagState::Held(holder) => return Err(StateError::AlreadyHeld { holder }),
            FlagState::OnGround(ground) => ground,
        };

        if let Some(radius) = self.rules.pickup_radius {
            let distance = ground.distance(&position);
            if distance > radius {
                return Err(StateError::TooFar {
                    player_id,
                    distance,
                    radius,
                });
            }
        }

        self.flag = FlagState::Held(player_id);
        self.flag_position = position;
        info!("Player {} picked up the flag at {}", player_id, position);

        out.broadcast(
            &ServerPacket::FlagUpdate {
                player_id,
                is_pickup: true,
                position,
            },
            None,
        );
        Ok(())
    }

    /// Puts the flag down at `position`; only the holder may do this.
    pub fn request_drop<B: Broadcast>(
        &mut self,
        player_id: PlayerId,
        position: Vec3,
        out: &mut B,
    ) -> Result<(), StateError> {
        match self.flag {
            FlagState::Held(holder) if holder == player_id => {}
            FlagState::Held(holder) => {
                return Err(StateError::NotHolder {
                    player_id,
                    holder: Some(holder),
                })
            }
            FlagState::OnGround(_) => {
                return Err(StateError::NotHolder {
                    player_id,
                    holder: None,
                })
            }
        }

        self.place_flag(position);
        info!("Player {} dropped the flag at {}", player_id, position);

        out.broadcast(
            &ServerPacket::FlagUpdate {
                player_id,
                is_pickup: false,
                position,
            },
            None,
        );
        Ok(())
    }

    /// Moves the flag to `attacker` when they hit the current holder.
    ///
    /// Returns false (and changes nothing) unless `target` holds the flag.
    pub fn steal<B: Broadcast>(
        &mut self,
        attacker: PlayerId,
        target: PlayerId,
        out: &mut B,
    ) -> bool {
        if attacker == target || self.flag != FlagState::Held(target) {
            return false;
        }

        let position = self
            .positions
            .get(&target)
            .copied()
            .unwrap_or(self.flag_position);
        self.flag = FlagState::Held(attacker);
        self.flag_position = position;
        info!("Player {} stole the flag from player {}", attacker, target);

        out.broadcast(
            &ServerPacket::FlagUpdate {
                player_id: attacker,
                is_pickup: true,
                position,
            },
            None,
        );
        true
    }

    /// Forgets a disconnected player and drops the flag if they had it.
    pub fn player_left<B: Broadcast>(&mut self, player_id: PlayerId, out: &mut B) {
        if self.scores.remove(&player_id).is_some() {
            debug!("Removed score for player {}", player_id);
        }
        let last_position = self.positions.remove(&player_id);

        if self.flag == FlagState::Held(player_id) {
            let position = last_position.unwrap_or(self.flag_position);
            self.place_flag(position);
            info!(
                "Flag holder {} left, flag dropped at {}",
                player_id, position
            );

            out.broadcast(
                &ServerPacket::FlagUpdate {
                    player_id,
                    is_pickup: false,
                    position,
                },
                None,
            );
        }
    }

    /// One scoring step. Returns the winner if this tick decided the match.
    pub fn score_tick<B: Broadcast>(&mut self, out: &mut B) -> Option<PlayerId> {
        self.tick += 1;

        let FlagState::Held(holder) = self.flag else {
            return None;
        };

        let score = self.scores.entry(holder).or_insert(0.0);
        *score += self.rules.score_increment;
        let score = *score;

        out.broadcast(
            &ServerPacket::PlayerScore {
                player_id: holder,
                score,
            },
            None,
        );

        if score >= self.rules.win_score {
            self.declare_winner(holder, out);
            return Some(holder);
        }
        None
    }

    fn declare_winner<B: Broadcast>(&mut self, winner_id: PlayerId, out: &mut B) {
        self.wins += 1;
        info!("Player {} wins! Resetting match.", winner_id);
        out.broadcast(&ServerPacket::GameWon { winner_id }, None);

        let spawn = self.rules.flag_spawn;
        self.place_flag(spawn);
        out.broadcast(
            &ServerPacket::FlagUpdate {
                player_id: winner_id,
                is_pickup: false,
                position: spawn,
            },
            None,
        );

        // Other players keep their points.
        if self.rules.reset_winner_score {
            self.scores.insert(winner_id, 0.0);
            out.broadcast(
                &ServerPacket::PlayerScore {
                    player_id: winner_id,
                    score: 0.0,
                },
                None,
            );
        }
    }

    fn place_flag(&mut self, position: Vec3) {
        self.flag = FlagState::OnGround(position);
        self.flag_position = position;
    }

    /// Human-readable score board for the console.
    pub fn score_table(&self) -> String {
        let mut out = String::from("\n=== PLAYER SCORES ===\n");

        let mut entries: Vec<_> = self.scores.iter().collect();
        entries.sort_by_key(|(id, _)| **id);
        if entries.is_empty() {
            out.push_str("(no scores yet)\n");
        }
        for (id, score) in entries {
            let _ = writeln!(out, "Player {}: {:.1} points", id, score);
        }

        let _ = match self.flag {
            FlagState::Held(holder) => writeln!(out, "Flag: held by player {}", holder),
            FlagState::OnGround(position) => writeln!(out, "Flag: on the ground at {}", position),
        };
        let _ = writeln!(out, "Matches won: {}", self.wins);
        out.push_str("=====================");
        out
    }
}
