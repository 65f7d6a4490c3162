//! # Presence Client Library
//!
//! Client side of the shared-space presence system: it joins a server, keeps
//! a visual proxy for every other participant and reports the local player's
//! position as it moves.
//!
//! ## Architecture Overview
//!
//! The render loop runs on the main thread and never touches the socket. A
//! background thread owns the TCP session and exchanges packets with the
//! render loop through channels (see [`network::Connection`]).
//!
//! Each frame the client:
//! 1. Drains network events into [`game::ClientGame::handle_packet`]
//! 2. Samples the keyboard into an [`input::InputFrame`]
//! 3. Steps the game, which may yield a coalesced `Move` packet
//! 4. Renders the presence view
//!
//! ### Reconciliation
//! Presence events are applied by [`presence::PresenceView`]. The roster
//! snapshot is authoritative and creates one proxy per entry. Join, move and
//! leave events then add, glide or remove single remote proxies. Events for
//! the local player are ignored since the client already knows where it is.
//!
//! ### Outbound movement
//! The local player moves immediately. Positions are only sent once they
//! drift more than [`shared::MOVE_SEND_THRESHOLD`] from the last send.
//!
//! ## Module Organization
//!
//! - `game`: connection status, packet handling and per-frame stepping
//! - `input`: keyboard sampling and move throttling
//! - `network`: background TCP session
//! - `presence`: local and remote proxies, movement tweens
//! - `rendering`: macroquad drawing
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::game::ClientGame;
//! use client::network::{Connection, NetworkEvent};
//! use shared::Identity;
//!
//! # fn main() -> Result<(), client::network::BoxError> {
//! let mut connection = Connection::spawn("127.0.0.1:8080")?;
//! let mut game = ClientGame::new(Some(Identity::new(42, "Ada")));
//!
//! for event in connection.poll() {
//!     match event {
//!         NetworkEvent::Packet(packet) => {
//!             for reply in game.handle_packet(packet) {
//!                 connection.send(reply);
//!             }
//!         }
//!         NetworkEvent::Closed(reason) => game.handle_closed(reason),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod presence;
pub mod rendering;
