//! Server configuration.
//!
//! Every option can be given as a flag or through its `PRESENCE_*`
//! environment variable; flags win.

use crate::presence::{SpawnArea, SpawnAreaError};
use clap::Parser;
use shared::{DEFAULT_SPAWN_OFFSET, DEFAULT_SPAWN_RANGE, MAX_ROSTER_PLAYERS};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max clients {0} is above the roster limit of {1}")]
    TooManyClients(usize, usize),
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Player presence relay server")]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, env = "PRESENCE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on (0 picks a free port)
    #[arg(short, long, env = "PRESENCE_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Maximum number of simultaneous connections (at most 512, so the
    /// roster fits in one frame)
    #[arg(short, long, env = "PRESENCE_MAX_CLIENTS", default_value_t = 64)]
    pub max_clients: usize,

    /// Lower bound of the spawn window on each axis
    #[arg(long, env = "PRESENCE_SPAWN_OFFSET", default_value_t = DEFAULT_SPAWN_OFFSET, allow_negative_numbers = true)]
    pub spawn_offset: f32,

    /// Width of the spawn window on each axis
    #[arg(long, env = "PRESENCE_SPAWN_RANGE", default_value_t = DEFAULT_SPAWN_RANGE)]
    pub spawn_range: f32,

    /// Seconds between status log lines
    #[arg(long, env = "PRESENCE_STATUS_INTERVAL", default_value_t = 10)]
    pub status_interval_secs: u64,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The connection limit, rejected when a full roster would not fit in
    /// one frame.
    pub fn client_limit(&self) -> Result<usize, ConfigError> {
        if self.max_clients > MAX_ROSTER_PLAYERS {
            return Err(ConfigError::TooManyClients(
                self.max_clients,
                MAX_ROSTER_PLAYERS,
            ));
        }
        Ok(self.max_clients)
    }

    pub fn spawn_area(&self) -> Result<SpawnArea, SpawnAreaError> {
        SpawnArea::new(self.spawn_offset, self.spawn_range)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_clients: 64,
            spawn_offset: DEFAULT_SPAWN_OFFSET,
            spawn_range: DEFAULT_SPAWN_RANGE,
            status_interval_secs: 10,
        }
    }
}
