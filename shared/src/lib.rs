use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod codec;

pub use codec::{read_packet, write_packet, FrameError, MAX_FRAME_LEN};

pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;
pub const PLAYER_SIZE: f32 = 40.0;
pub const PLAYER_SPEED: f32 = 240.0;

/// Minimum distance the local player must travel before a new move is sent.
pub const MOVE_SEND_THRESHOLD: f32 = 1.0;
/// Seconds a remote proxy takes to glide to a relayed position.
pub const MOVE_TWEEN_DURATION: f32 = 0.05;

pub const DEFAULT_SPAWN_OFFSET: f32 = 50.0;
pub const DEFAULT_SPAWN_RANGE: f32 = 300.0;

/// Longest display name kept, in bytes. Longer names are cut at a char
/// boundary when the player joins.
pub const MAX_DISPLAY_NAME_LEN: usize = 64;
/// Most players a roster frame can carry when every name is at the limit.
pub const MAX_ROSTER_PLAYERS: usize = 512;

/// Transport-assigned identifier, unique while the connection is alive.
pub type ConnectionId = u32;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Join {
        identity: Option<Identity>,
    },
    Move {
        x: f32,
        y: f32,
    },
    Disconnect,

    Connected {
        client_id: ConnectionId,
    },
    Roster {
        players: HashMap<ConnectionId, PlayerRecord>,
    },
    PlayerJoined {
        player: PlayerRecord,
    },
    PlayerMoved {
        id: ConnectionId,
        x: f32,
        y: f32,
    },
    PlayerLeft {
        id: ConnectionId,
    },
    Disconnected {
        reason: String,
    },
}

impl Packet {
    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Join { .. } => "join",
            Packet::Move { .. } => "move",
            Packet::Disconnect => "disconnect",
            Packet::Connected { .. } => "connected",
            Packet::Roster { .. } => "roster",
            Packet::PlayerJoined { .. } => "joined",
            Packet::PlayerMoved { .. } => "moved",
            Packet::PlayerLeft { .. } => "left",
            Packet::Disconnected { .. } => "disconnected",
        }
    }
}

/// External identity a player may attach when joining.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: u64,
    pub display_name: String,
}

impl Identity {
    pub fn new(id: u64, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }

    /// Cuts the display name down to [`MAX_DISPLAY_NAME_LEN`] bytes.
    pub fn truncated(mut self) -> Self {
        if self.display_name.len() > MAX_DISPLAY_NAME_LEN {
            let mut end = MAX_DISPLAY_NAME_LEN;
            while !self.display_name.is_char_boundary(end) {
                end -= 1;
            }
            self.display_name.truncate(end);
        }
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerRecord {
    pub id: ConnectionId,
    pub x: f32,
    pub y: f32,
    pub identity: Option<Identity>,
}

impl PlayerRecord {
    pub fn new(id: ConnectionId, x: f32, y: f32, identity: Option<Identity>) -> Self {
        Self { id, x, y, identity }
    }

    /// Display name of the attached identity, or "Guest" for anonymous players.
    pub fn display_name(&self) -> &str {
        self.identity
            .as_ref()
            .map(|identity| identity.display_name.as_str())
            .unwrap_or("Guest")
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

pub fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    (dx * dx + dy * dy).sqrt()
}
