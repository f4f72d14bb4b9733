//! Server configuration: listener, capacity, and the scoring rules.

use serde::{Deserialize, Serialize};
use shared::{Vec3, DEFAULT_MAX_PLAYERS, DEFAULT_PORT};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the listener to
    pub host: String,
    pub port: u16,
    /// Number of player slots, ids run 1..=max_players
    pub max_players: usize,
    /// Milliseconds between score ticks
    pub tick_ms: u64,
    /// Close sessions that send nothing for this many seconds (0 = never)
    pub idle_timeout_secs: u64,
    /// Frames queued per session before new ones are dropped for that peer
    pub outbound_queue: usize,
    pub rules: GameRules,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_players: DEFAULT_MAX_PLAYERS,
            tick_ms: 1000,
            idle_timeout_secs: 0,
            outbound_queue: 256,
            rules: GameRules::default(),
        }
    }
}

impl ServerConfig {
    /// Reads a JSON config file; missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

/// Rules the authority applies to flag possession and scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
    /// Points added to the holder every tick
    pub score_increment: f32,
    /// Score at which the holder wins
    pub win_score: f32,
    /// Max distance between a pickup request and the flag; `None` skips the check
    pub pickup_radius: Option<f32>,
    /// Where the flag starts and where it returns after a win
    pub flag_spawn: Vec3,
    /// Zero the winner's score after a win
    pub reset_winner_score: bool,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            score_increment: 1.0,
            win_score: 100.0,
            pickup_radius: None,
            flag_spawn: Vec3::ZERO,
            reset_winner_score: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 7777);
        assert_eq!(config.max_players, 8);
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.idle_timeout(), None);
        assert_eq!(config.bind_address(), "0.0.0.0:7777");
        assert_eq!(config.rules.win_score, 100.0);
        assert!(config.rules.pickup_radius.is_none());
        assert!(config.rules.reset_winner_score);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ServerConfig = serde_json::from_str(
            r#"{ "port": 9000, "idle_timeout_secs": 30, "rules": { "pickup_radius": 2.5 } }"#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.max_players, 8);
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.rules.pickup_radius, Some(2.5));
        assert_eq!(config.rules.score_increment, 1.0);
    }

    #[test]
    fn test_tick_interval_never_zero() {
        let config = ServerConfig {
            tick_ms: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.tick_interval(), Duration::from_millis(1));
    }
}
