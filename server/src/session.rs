//! Per-connection protocol state machine.
//!
//! ```text
//! Unjoined --join--> Joined --move--> Joined
//!     \                |
//!      +--disconnect---+--> Terminated
//! ```
//!
//! A session never touches the transport. Every transition returns the
//! [`Outbound`] messages the fan-out rules produced for it.

use crate::fanout::{self, Outbound};
use crate::presence::PresenceStore;
use log::{debug, info, warn};
use shared::{ConnectionId, Identity, Packet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unjoined,
    Joined,
    Terminated,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Join { identity: Option<Identity> },
    Move { x: f32, y: f32 },
    Disconnect,
}

impl SessionEvent {
    /// Maps an inbound packet to a session event. Server-to-client packets
    /// have no meaning here and yield `None`.
    pub fn from_packet(packet: Packet) -> Option<Self> {
        match packet {
            Packet::Join { identity } => Some(SessionEvent::Join { identity }),
            Packet::Move { x, y } => Some(SessionEvent::Move { x, y }),
            Packet::Disconnect => Some(SessionEvent::Disconnect),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    state: SessionState,
}

impl Session {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            state: SessionState::Unjoined,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handle(&mut self, event: SessionEvent, store: &mut PresenceStore) -> Vec<Outbound> {
        match (self.state, event) {
            (SessionState::Terminated, event) => {
                warn!(
                    "Ignoring {:?} for terminated connection {}",
                    event, self.id
                );
                Vec::new()
            }

            (_, SessionEvent::Join { identity }) => {
                let player = store.add(self.id, identity);
                if self.state == SessionState::Joined {
                    debug!("Connection {} joined again, resending roster", self.id);
                }
                self.state = SessionState::Joined;
                fanout::announce_join(&player, store.get_all())
            }

            (SessionState::Unjoined, SessionEvent::Move { .. }) => {
                debug!("Ignoring move from unjoined connection {}", self.id);
                Vec::new()
            }

            (SessionState::Joined, SessionEvent::Move { x, y }) => {
                match store.update_position(self.id, x, y) {
                    Some(player) => fanout::announce_move(&player),
                    None => {
                        debug!("Move from connection {} with no record", self.id);
                        Vec::new()
                    }
                }
            }

            (_, SessionEvent::Disconnect) => {
                store.remove(self.id);
                self.state = SessionState::Terminated;
                info!("Connection {} terminated", self.id);
                fanout::announce_leave(self.id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::Recipients;
    use crate::presence::SpawnArea;

    fn store() -> PresenceStore {
        PresenceStore::with_seed(SpawnArea::default(), 42)
    }

    #[test]
    fn test_new_session_is_unjoined() {
        let session = Session::new(5);
        assert_eq!(session.id(), 5);
        assert_eq!(session.state(), SessionState::Unjoined);
    }

    #[test]
    fn test_join_adds_record_and_announces() {
        let mut store = store();
        let mut session = Session::new(1);

        let outbound = session.handle(
            SessionEvent::Join {
                identity: Some(Identity::new(3, "Kim")),
            },
            &mut store,
        );

        assert_eq!(session.state(), SessionState::Joined);
        assert!(store.contains(1));
        assert_eq!(outbound.len(), 2);
        match &outbound[0].packet {
            Packet::Roster { players } => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[&1], store.get(1).unwrap());
            }
            other => panic!("Expected roster, got {:?}", other),
        }
        assert_eq!(outbound[1].recipients, Recipients::AllExcept(1));
    }

    #[test]
    fn test_second_join_keeps_first_identity() {
        let mut store = store();
        let mut session = Session::new(1);

        session.handle(
            SessionEvent::Join {
                identity: Some(Identity::new(1, "Original")),
            },
            &mut store,
        );
        let first = store.get(1).unwrap();

        let outbound = session.handle(
            SessionEvent::Join {
                identity: Some(Identity::new(2, "Impostor")),
            },
            &mut store,
        );

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(1).unwrap(), first);
        assert_eq!(
            outbound[1].packet,
            Packet::PlayerJoined {
                player: first.clone()
            }
        );
    }

    #[test]
    fn test_move_before_join_is_ignored() {
        let mut store = store();
        let mut session = Session::new(1);

        let outbound = session.handle(SessionEvent::Move { x: 1.0, y: 2.0 }, &mut store);

        assert!(outbound.is_empty());
        assert!(store.is_empty());
        assert_eq!(session.state(), SessionState::Unjoined);
    }

    #[test]
    fn test_move_after_join_updates_and_relays() {
        let mut store = store();
        let mut session = Session::new(1);
        session.handle(SessionEvent::Join { identity: None }, &mut store);

        let outbound = session.handle(SessionEvent::Move { x: 10.0, y: 20.0 }, &mut store);

        assert_eq!(store.get(1).unwrap().position(), (10.0, 20.0));
        assert_eq!(
            outbound,
            vec![Outbound::new(
                Packet::PlayerMoved {
                    id: 1,
                    x: 10.0,
                    y: 20.0
                },
                Recipients::AllExcept(1)
            )]
        );
    }

    #[test]
    fn test_move_with_vanished_record_is_a_no_op() {
        let mut store = store();
        let mut session = Session::new(1);
        session.handle(SessionEvent::Join { identity: None }, &mut store);
        store.remove(1);

        let outbound = session.handle(SessionEvent::Move { x: 5.0, y: 5.0 }, &mut store);

        assert!(outbound.is_empty());
        assert!(store.is_empty());
        assert_eq!(session.state(), SessionState::Joined);
    }

    #[test]
    fn test_disconnect_removes_and_announces() {
        let mut store = store();
        let mut session = Session::new(1);
        session.handle(SessionEvent::Join { identity: None }, &mut store);

        let outbound = session.handle(SessionEvent::Disconnect, &mut store);

        assert_eq!(session.state(), SessionState::Terminated);
        assert!(store.is_empty());
        assert_eq!(
            outbound,
            vec![Outbound::new(Packet::PlayerLeft { id: 1 }, Recipients::All)]
        );
    }

    #[test]
    fn test_disconnect_before_join_is_tolerated() {
        let mut store = store();
        store.add(2, None);
        let mut session = Session::new(1);

        let outbound = session.handle(SessionEvent::Disconnect, &mut store);

        assert_eq!(session.state(), SessionState::Terminated);
        assert_eq!(store.len(), 1);
        assert_eq!(outbound.len(), 1);
    }

    #[test]
    fn test_terminated_is_absorbing() {
        let mut store = store();
        let mut session = Session::new(1);
        session.handle(SessionEvent::Disconnect, &mut store);

        assert!(session
            .handle(SessionEvent::Join { identity: None }, &mut store)
            .is_empty());
        assert!(session
            .handle(SessionEvent::Move { x: 1.0, y: 1.0 }, &mut store)
            .is_empty());
        assert!(session
            .handle(SessionEvent::Disconnect, &mut store)
            .is_empty());
        assert!(store.is_empty());
        assert_eq!(session.state(), SessionState::Terminated);
    }

    #[test]
    fn test_event_from_packet() {
        assert_eq!(
            SessionEvent::from_packet(Packet::Move { x: 1.0, y: 2.0 }),
            Some(SessionEvent::Move { x: 1.0, y: 2.0 })
        );
        assert_eq!(
            SessionEvent::from_packet(Packet::Disconnect),
            Some(SessionEvent::Disconnect)
        );
        assert_eq!(SessionEvent::from_packet(Packet::PlayerLeft { id: 1 }), None);
    }
}
