//! In-memory presence store: one record per joined connection.
//!
//! The store is owned by the server's main loop and never handed out by
//! reference. Lookups return clones and [`PresenceStore::get_all`] returns an
//! owned snapshot, so callers are insulated from later mutation.

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{ConnectionId, Identity, PlayerRecord, DEFAULT_SPAWN_OFFSET, DEFAULT_SPAWN_RANGE};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SpawnAreaError {
    #[error("spawn offset must be finite, got {0}")]
    InvalidOffset(f32),
    #[error("spawn range must be finite and non-negative, got {0}")]
    InvalidRange(f32),
}

/// Per-axis spawn window: each coordinate is drawn from `[offset, offset + range)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnArea {
    offset: f32,
    range: f32,
}

impl SpawnArea {
    pub fn new(offset: f32, range: f32) -> Result<Self, SpawnAreaError> {
        if !offset.is_finite() {
            return Err(SpawnAreaError::InvalidOffset(offset));
        }
        if !range.is_finite() || range < 0.0 {
            return Err(SpawnAreaError::InvalidRange(range));
        }
        Ok(Self { offset, range })
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn range(&self) -> f32 {
        self.range
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.offset && value <= self.offset + self.range
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> f32 {
        if self.range == 0.0 {
            return self.offset;
        }
        rng.gen_range(self.offset..self.offset + self.range)
    }
}

impl Default for SpawnArea {
    fn default() -> Self {
        Self {
            offset: DEFAULT_SPAWN_OFFSET,
            range: DEFAULT_SPAWN_RANGE,
        }
    }
}

pub struct PresenceStore {
    players: HashMap<ConnectionId, PlayerRecord>,
    spawn_area: SpawnArea,
    rng: StdRng,
}

impl PresenceStore {
    pub fn new(spawn_area: SpawnArea) -> Self {
        Self {
            players: HashMap::new(),
            spawn_area,
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a store with a deterministic spawn sequence.
    pub fn with_seed(spawn_area: SpawnArea, seed: u64) -> Self {
        Self {
            players: HashMap::new(),
            spawn_area,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn spawn_area(&self) -> SpawnArea {
        self.spawn_area
    }

    /// Adds a player, or returns the existing record untouched if `id` has
    /// already joined.
    ///
    /// Display names are truncated so a full roster always fits in one frame.
    pub fn add(&mut self, id: ConnectionId, identity: Option<Identity>) -> PlayerRecord {
        if let Some(existing) = self.players.get(&id) {
            return existing.clone();
        }

        let identity = identity.map(Identity::truncated);

        let x = self.spawn_area.sample(&mut self.rng);
        let y = self.spawn_area.sample(&mut self.rng);
        let player = PlayerRecord::new(id, x, y, identity);

        info!(
            "Player {} ({}) added at ({:.1}, {:.1})",
            id,
            player.display_name(),
            x,
            y
        );
        self.players.insert(id, player.clone());
        player
    }

    /// Removes a player. Returns false if nothing was stored for `id`.
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        if let Some(player) = self.players.remove(&id) {
            info!("Player {} ({}) removed", id, player.display_name());
            true
        } else {
            false
        }
    }

    /// Last write wins. `None` means the player is not (or no longer) present.
    pub fn update_position(&mut self, id: ConnectionId, x: f32, y: f32) -> Option<PlayerRecord> {
        let player = self.players.get_mut(&id)?;
        player.x = x;
        player.y = y;
        Some(player.clone())
    }

    pub fn get(&self, id: ConnectionId) -> Option<PlayerRecord> {
        self.players.get(&id).cloned()
    }

    pub fn get_all(&self) -> HashMap<ConnectionId, PlayerRecord> {
        self.players.clone()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.players.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl Default for PresenceStore {
    fn default() -> Self {
        Self::new(SpawnArea::default())
    }
}
