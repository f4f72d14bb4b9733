//! # Flag Match Server Library
//!
//! This library provides the authoritative server for a small multiplayer
//! "hold the flag" match. Clients connect over TCP, receive a player slot,
//! and exchange movement and combat packets that the server relays to the
//! other players. Flag possession and scores are decided here and nowhere
//! else.
//!
//! ## Core Responsibilities
//!
//! ### Session Management
//! Handles the lifecycle of each connection:
//! - Slot assignment (lowest free id in `1..=max_players`)
//! - Welcome and join announcements so every client converges on the same roster
//! - Disconnect detection and cleanup, including a holder leaving with the flag
//!
//! ### Relay
//! Position, state and attack packets are stamped with the sender's id and
//! forwarded to everyone else. The server does not simulate movement.
//!
//! ### Authority
//! Pickup, drop and steal requests are checked against the current flag
//! state. Every accepted change is broadcast to all players. A periodic
//! tick credits the holder and detects the winner.
//!
//! ## Architecture Design
//!
//! ### Single Owner
//! One server task owns the slot table and the game state. Everything that
//! can change them (accepted sockets, decoded packets, disconnects, score
//! ticks, console commands) arrives as a [`network::ServerMessage`] on one
//! channel and is handled in order, so no locks are needed.
//!
//! ### Per-Connection Tasks
//! Each socket is served by a [`session::Session`] task that decodes
//! inbound frames and drains a bounded outbound queue. Broadcasting never
//! waits on a socket: a peer whose queue is full misses that frame and
//! nobody else is affected.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Fixed table of player slots and the handles used to reach each session.
//!
//! ### Broadcast Module (`broadcast`)
//! The [`broadcast::Broadcast`] trait and its fan-out over the slot table.
//!
//! ### Game Module (`game`)
//! Flag state, scores and win detection.
//!
//! ### Session Module (`session`)
//! Socket I/O per connection and routing of decoded packets.
//!
//! ### Network Module (`network`)
//! The listener, the server task and [`network::ServerHandle`].
//!
//! ### Ticker and Console (`ticker`, `console`)
//! The score clock and the operator's stdin commands.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         port: 7777,
//!         max_players: 8,
//!         ..ServerConfig::default()
//!     };
//!
//!     // Binds the listener; this is the only step that can fail
//!     let server = Server::new(config).await?;
//!     let handle = server.handle();
//!
//!     let task = tokio::spawn(server.run());
//!
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown().await;
//!     task.await?;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod client_manager;
pub mod config;
pub mod console;
pub mod game;
pub mod network;
pub mod session;
pub mod ticker;
