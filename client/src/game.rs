use crate::input::{InputFrame, MoveThrottle};
use crate::presence::{Change, PresenceView};
use log::{info, warn};
use shared::{Identity, Packet, PLAYER_SPEED};

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Closed(String),
}

/// Client-side game state: presence view plus the local player's outbound moves
pub struct ClientGame {
    pub view: PresenceView,
    throttle: MoveThrottle,
    identity: Option<Identity>,
    status: ConnectionStatus,
}

impl ClientGame {
    pub fn new(identity: Option<Identity>) -> Self {
        Self::with_view(identity, PresenceView::new())
    }

    /// A game whose local player can roam a `width` x `height` window.
    pub fn with_bounds(identity: Option<Identity>, width: f32, height: f32) -> Self {
        Self::with_view(identity, PresenceView::with_bounds(width, height))
    }

    fn with_view(identity: Option<Identity>, view: PresenceView) -> Self {
        Self {
            view,
            throttle: MoveThrottle::default(),
            identity,
            status: ConnectionStatus::Connecting,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn welcome_text(&self) -> String {
        let name = self
            .identity
            .as_ref()
            .map(|identity| identity.display_name.as_str())
            .unwrap_or("Player");
        format!("Welcome, {}!", name)
    }

    /// Applies a server packet. Returns packets to send back.
    pub fn handle_packet(&mut self, packet: Packet) -> Vec<Packet> {
        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Client ID: {}", client_id);
                self.view.set_local_id(client_id);
                self.status = ConnectionStatus::Connected;
                vec![Packet::Join {
                    identity: self.identity.clone(),
                }]
            }

            Packet::Disconnected { reason } => {
                self.handle_closed(reason);
                Vec::new()
            }

            packet @ (Packet::Roster { .. }
            | Packet::PlayerJoined { .. }
            | Packet::PlayerMoved { .. }
            | Packet::PlayerLeft { .. }) => {
                if self.view.apply(&packet) == Change::RosterApplied {
                    if let Some(local) = self.view.local() {
                        self.throttle.reset(local.position());
                    }
                }
                Vec::new()
            }

            other => {
                warn!("Unexpected {} packet from server", other.kind());
                Vec::new()
            }
        }
    }

    pub fn handle_closed(&mut self, reason: String) {
        warn!("Disconnected: {}", reason);
        self.view.clear();
        self.status = ConnectionStatus::Closed(reason);
    }

    /// Advances one frame. Returns a move to send when the local player
    /// travelled past the send threshold.
    pub fn step(&mut self, dt: f32, input: InputFrame) -> Option<Packet> {
        if input.toggle_smoothing {
            let enabled = !self.view.smoothing();
            self.view.set_smoothing(enabled);
            info!("Movement smoothing: {}", enabled);
        }

        self.view.update(dt);

        if self.status != ConnectionStatus::Connected {
            return None;
        }

        let (dx, dy) = input.direction;
        let position = if input.is_moving() {
            self.view
                .move_local(dx * PLAYER_SPEED * dt, dy * PLAYER_SPEED * dt)?
        } else if input.released {
            self.view.local()?.position()
        } else {
            return None;
        };

        self.throttle
            .poll(position)
            .map(|(x, y)| Packet::Move { x, y })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::PlayerRecord;
    use std::collections::HashMap;

    fn right() -> InputFrame {
        InputFrame {
            direction: (1.0, 0.0),
            ..InputFrame::default()
        }
    }

    fn spawned_game() -> ClientGame {
        let mut game = ClientGame::new(Some(Identity::new(5, "Ada")));
        game.handle_packet(Packet::Connected { client_id: 1 });

        let mut players = HashMap::new();
        players.insert(1, PlayerRecord::new(1, 100.0, 100.0, None));
        game.handle_packet(Packet::Roster { players });
        game
    }

    #[test]
    fn test_connected_triggers_join_with_identity() {
        let mut game = ClientGame::new(Some(Identity::new(5, "Ada")));

        let replies = game.handle_packet(Packet::Connected { client_id: 3 });

        assert_eq!(
            replies,
            vec![Packet::Join {
                identity: Some(Identity::new(5, "Ada"))
            }]
        );
        assert_eq!(game.view.local_id(), Some(3));
        assert_eq!(game.status(), &ConnectionStatus::Connected);
    }

    #[test]
    fn test_guest_welcome_text() {
        assert_eq!(ClientGame::new(None).welcome_text(), "Welcome, Player!");
        assert_eq!(
            ClientGame::new(Some(Identity::new(1, "Ada"))).welcome_text(),
            "Welcome, Ada!"
        );
    }

    #[test]
    fn test_no_move_before_spawn() {
        let mut game = ClientGame::new(None);
        game.handle_packet(Packet::Connected { client_id: 1 });

        assert_eq!(game.step(1.0 / 60.0, right()), None);
    }

    #[test]
    fn test_moving_sends_coalesced_updates() {
        let mut game = spawned_game();

        // PLAYER_SPEED * dt is well above the send threshold
        match game.step(1.0 / 60.0, right()) {
            Some(Packet::Move { x, y }) => {
                assert!(x > 100.0);
                assert_eq!(y, 100.0);
            }
            other => panic!("Expected move, got {:?}", other),
        }

        // A tiny step stays below the threshold
        assert_eq!(game.step(0.001, right()), None);
    }

    #[test]
    fn test_idle_frames_send_nothing() {
        let mut game = spawned_game();
        assert_eq!(game.step(1.0 / 60.0, InputFrame::default()), None);
    }

    #[test]
    fn test_release_respects_threshold() {
        let mut game = spawned_game();
        let released = InputFrame {
            released: true,
            ..InputFrame::default()
        };

        for _ in 0..4 {
            assert_eq!(game.step(0.001, right()), None);
        }
        assert_eq!(game.step(0.001, released), None);

        game.step(1.0 / 60.0, right());
        assert_eq!(game.step(0.001, released), None);
    }

    #[test]
    fn test_server_refusal_clears_view() {
        let mut game = spawned_game();

        game.handle_packet(Packet::Disconnected {
            reason: "Server full".to_string(),
        });

        assert_eq!(game.view.player_count(), 0);
        assert_eq!(
            game.status(),
            &ConnectionStatus::Closed("Server full".to_string())
        );
        assert_eq!(game.step(1.0, right()), None);
    }

    #[test]
    fn test_with_bounds_sizes_the_view() {
        let game = ClientGame::with_bounds(None, 1024.0, 768.0);
        assert_eq!(game.view.bounds(), (1024.0, 768.0));
    }

    #[test]
    fn test_toggle_smoothing() {
        let mut game = spawned_game();
        assert!(game.view.smoothing());

        let toggle = InputFrame {
            toggle_smoothing: true,
            ..InputFrame::default()
        };
        game.step(0.0, toggle);

        assert!(!game.view.smoothing());
    }
}
