//! Client-side reconciliation of presence events into visual proxies.
//!
//! One proxy is the locally controlled player ("mine"); every other joined
//! connection gets a remote proxy that glides toward relayed positions.

use log::{debug, info, warn};
use shared::{
    ConnectionId, Identity, Packet, PlayerRecord, MOVE_TWEEN_DURATION, PLAYER_SIZE, WORLD_HEIGHT,
    WORLD_WIDTH,
};
use std::collections::HashMap;

/// Linear interpolation between two positions over a fixed duration.
#[derive(Debug, Clone, PartialEq)]
pub struct Tween {
    from: (f32, f32),
    to: (f32, f32),
    elapsed: f32,
    duration: f32,
}

impl Tween {
    pub fn new(from: (f32, f32), to: (f32, f32), duration: f32) -> Self {
        Self {
            from,
            to,
            elapsed: 0.0,
            duration,
        }
    }

    /// Advances by `dt` seconds and returns the position at the new time.
    pub fn advance(&mut self, dt: f32) -> (f32, f32) {
        self.elapsed = (self.elapsed + dt).min(self.duration);
        self.position()
    }

    pub fn position(&self) -> (f32, f32) {
        if self.duration <= 0.0 {
            return self.to;
        }
        let t = (self.elapsed / self.duration).clamp(0.0, 1.0);
        (
            self.from.0 + (self.to.0 - self.from.0) * t,
            self.from.1 + (self.to.1 - self.from.1) * t,
        )
    }

    pub fn target(&self) -> (f32, f32) {
        self.to
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Proxy {
    pub id: ConnectionId,
    pub x: f32,
    pub y: f32,
    pub identity: Option<Identity>,
    tween: Option<Tween>,
}

impl Proxy {
    fn from_record(record: &PlayerRecord) -> Self {
        Self {
            id: record.id,
            x: record.x,
            y: record.y,
            identity: record.identity.clone(),
            tween: None,
        }
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    /// Where the proxy is heading, or where it is if it is not moving.
    pub fn target(&self) -> (f32, f32) {
        self.tween
            .as_ref()
            .map(Tween::target)
            .unwrap_or((self.x, self.y))
    }

    pub fn is_moving(&self) -> bool {
        self.tween.is_some()
    }

    pub fn display_name(&self) -> &str {
        self.identity
            .as_ref()
            .map(|identity| identity.display_name.as_str())
            .unwrap_or("Guest")
    }

    fn glide_to(&mut self, x: f32, y: f32, duration: f32) {
        self.tween = Some(Tween::new((self.x, self.y), (x, y), duration));
    }

    fn snap_to(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.tween = None;
    }

    fn update(&mut self, dt: f32) {
        if let Some(tween) = self.tween.as_mut() {
            let (x, y) = tween.advance(dt);
            self.x = x;
            self.y = y;
            if tween.is_finished() {
                self.tween = None;
            }
        }
    }
}

/// What an inbound packet did to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    RosterApplied,
    RemoteAdded(ConnectionId),
    RemoteMoved(ConnectionId),
    RemoteRemoved(ConnectionId),
    Ignored,
}

pub struct PresenceView {
    local_id: Option<ConnectionId>,
    local: Option<Proxy>,
    remotes: HashMap<ConnectionId, Proxy>,
    smoothing: bool,
    tween_duration: f32,
    bounds: (f32, f32),
}

impl PresenceView {
    pub fn new() -> Self {
        Self::with_bounds(WORLD_WIDTH, WORLD_HEIGHT)
    }

    /// A view whose local player is kept inside a `width` x `height` area,
    /// normally the window size.
    pub fn with_bounds(width: f32, height: f32) -> Self {
        Self {
            local_id: None,
            local: None,
            remotes: HashMap::new(),
            smoothing: true,
            tween_duration: MOVE_TWEEN_DURATION,
            bounds: (width, height),
        }
    }

    pub fn bounds(&self) -> (f32, f32) {
        self.bounds
    }

    pub fn set_local_id(&mut self, id: ConnectionId) {
        self.local_id = Some(id);
    }

    pub fn local_id(&self) -> Option<ConnectionId> {
        self.local_id
    }

    pub fn local(&self) -> Option<&Proxy> {
        self.local.as_ref()
    }

    pub fn remote(&self, id: ConnectionId) -> Option<&Proxy> {
        self.remotes.get(&id)
    }

    /// Remote proxies ordered by id.
    pub fn remotes(&self) -> Vec<&Proxy> {
        let mut remotes: Vec<&Proxy> = self.remotes.values().collect();
        remotes.sort_by_key(|proxy| proxy.id);
        remotes
    }

    pub fn remote_count(&self) -> usize {
        self.remotes.len()
    }

    /// Tracked players including the local one.
    pub fn player_count(&self) -> usize {
        self.remotes.len() + usize::from(self.local.is_some())
    }

    pub fn set_smoothing(&mut self, enabled: bool) {
        self.smoothing = enabled;
    }

    pub fn smoothing(&self) -> bool {
        self.smoothing
    }

    pub fn apply(&mut self, packet: &Packet) -> Change {
        match packet {
            Packet::Roster { players } => {
                self.apply_roster(players);
                Change::RosterApplied
            }
            Packet::PlayerJoined { player } => {
                if self.add_remote(player) {
                    Change::RemoteAdded(player.id)
                } else {
                    Change::Ignored
                }
            }
            Packet::PlayerMoved { id, x, y } => {
                if self.move_remote(*id, *x, *y) {
                    Change::RemoteMoved(*id)
                } else {
                    Change::Ignored
                }
            }
            Packet::PlayerLeft { id } => {
                if self.remove_remote(*id) {
                    Change::RemoteRemoved(*id)
                } else {
                    Change::Ignored
                }
            }
            _ => Change::Ignored,
        }
    }

    pub fn apply_roster(&mut self, players: &HashMap<ConnectionId, PlayerRecord>) {
        debug!("Received roster with {} players", players.len());
        if self.local_id.is_none() {
            warn!("Roster arrived before our connection id; treating every entry as remote");
        }

        for (id, record) in players {
            if Some(*id) == self.local_id {
                info!(
                    "Local player {} spawned at ({:.0}, {:.0})",
                    id, record.x, record.y
                );
                self.local = Some(Proxy::from_record(record));
            } else if let Some(existing) = self.remotes.get_mut(id) {
                existing.snap_to(record.x, record.y);
            } else {
                self.remotes.insert(*id, Proxy::from_record(record));
            }
        }
    }

    /// Returns false for our own id and for ids already tracked.
    pub fn add_remote(&mut self, player: &PlayerRecord) -> bool {
        if Some(player.id) == self.local_id {
            debug!("Ignoring join announcement for ourselves");
            return false;
        }
        if self.remotes.contains_key(&player.id) {
            warn!("Player {} already exists", player.id);
            return false;
        }

        info!(
            "Player {} ({}) joined at ({:.0}, {:.0})",
            player.id,
            player.display_name(),
            player.x,
            player.y
        );
        self.remotes.insert(player.id, Proxy::from_record(player));
        true
    }

    pub fn move_remote(&mut self, id: ConnectionId, x: f32, y: f32) -> bool {
        let Some(proxy) = self.remotes.get_mut(&id) else {
            warn!("Received move for unknown player {}", id);
            return false;
        };

        if self.smoothing {
            proxy.glide_to(x, y, self.tween_duration);
        } else {
            proxy.snap_to(x, y);
        }
        true
    }

    pub fn remove_remote(&mut self, id: ConnectionId) -> bool {
        if self.remotes.remove(&id).is_some() {
            info!("Player {} left", id);
            true
        } else {
            debug!("Received leave for unknown player {}", id);
            false
        }
    }

    /// Moves the local proxy by a delta, clamped to the view bounds.
    /// Returns the new position, or `None` before the local player exists.
    pub fn move_local(&mut self, dx: f32, dy: f32) -> Option<(f32, f32)> {
        let local = self.local.as_mut()?;
        let half = PLAYER_SIZE / 2.0;
        let (width, height) = self.bounds;
        local.x = (local.x + dx).clamp(half, (width - half).max(half));
        local.y = (local.y + dy).clamp(half, (height - half).max(half));
        Some(local.position())
    }

    /// Advances every remote glide by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        for proxy in self.remotes.values_mut() {
            proxy.update(dt);
        }
    }

    /// Forgets every proxy; the connection id is kept.
    pub fn clear(&mut self) {
        self.local = None;
        self.remotes.clear();
    }
}

impl Default for PresenceView {
    fn default() -> Self {
        Self::new()
    }
}
