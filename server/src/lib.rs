//! # Presence Server Library
//!
//! Relays player presence between connected clients. The server keeps one
//! in-memory record per joined connection and fans every change out to the
//! other peers; it never validates or simulates movement.
//!
//! ## Event Flow
//!
//! ```text
//! client --join--> Session --add--> PresenceStore
//!                     |
//!                     +--> fanout: roster to joiner, joined to everyone else
//! client --move--> Session --update_position--> fanout: moved to all but mover
//! (disconnect)     Session --remove--> fanout: left to all remaining
//! ```
//!
//! ## Module Organization
//!
//! ### Presence Module (`presence`)
//! The store of player records and the spawn window new players appear in.
//! Pure data, no I/O.
//!
//! ### Session Module (`session`)
//! Per-connection state machine (`Unjoined`, `Joined`, `Terminated`) that
//! maps inbound events onto store operations.
//!
//! ### Fan-out Module (`fanout`)
//! Receiver rules for each kind of change, kept apart from delivery so they
//! can be tested without sockets.
//!
//! ### Client Manager Module (`client_manager`)
//! Registry of live connections and their outbound queues. Implements the
//! `Publisher` capability the fan-out rules are delivered through.
//!
//! ### Network Module (`network`)
//! TCP accept loop, per-connection reader/writer tasks, and the main loop.
//!
//! ## Concurrency
//!
//! Connection tasks only decode and forward. All store mutations and
//! broadcasts happen on the main loop, one event at a time, so events from a
//! single connection are handled strictly in order and no handler ever
//! observes another half-finished.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ServerConfig::default();
//!     let mut server = Server::new(&config).await?;
//!     server.run().await
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod fanout;
pub mod network;
pub mod presence;
pub mod session;
