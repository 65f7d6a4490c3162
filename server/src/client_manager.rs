//! Connection registry for the presence server
//!
//! This module tracks every live TCP connection, including:
//! - Connection id assignment (never reused while the process runs)
//! - Capacity enforcement
//! - The outbound queue feeding each connection's writer task
//!
//! The registry is the server's [`Publisher`]: broadcast rules are resolved
//! against the set of registered connections here, and nowhere else.

use crate::fanout::{Publisher, Recipients};
use log::{info, warn};
use shared::{ConnectionId, Packet};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Packets a connection may have queued before new ones are dropped.
pub const OUTBOUND_QUEUE_LEN: usize = 256;

pub type OutboundTx = mpsc::Sender<Packet>;
pub type OutboundRx = mpsc::Receiver<Packet>;

/// Creates the queue between the main loop and one connection's writer task.
pub fn outbound_channel() -> (OutboundTx, OutboundRx) {
    mpsc::channel(OUTBOUND_QUEUE_LEN)
}

/// A connected peer and the queue its writer task drains
#[derive(Debug)]
pub struct Client {
    /// Unique connection identifier assigned by the registry
    pub id: ConnectionId,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// When the connection was accepted
    pub connected_at: Instant,
    sender: OutboundTx,
}

impl Client {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: OutboundTx) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
        }
    }

    /// Queues a packet for this connection without waiting.
    ///
    /// Returns false, and logs why, when the packet was dropped because the
    /// queue is full (the peer stopped reading) or the writer task is gone.
    pub fn send(&self, packet: Packet) -> bool {
        match self.sender.try_send(packet) {
            Ok(()) => true,
            Err(TrySendError::Full(packet)) => {
                warn!(
                    "Dropping {} for client {}: outbound queue full",
                    packet.kind(),
                    self.id
                );
                false
            }
            Err(TrySendError::Closed(packet)) => {
                warn!(
                    "Dropping {} for client {}: writer closed",
                    packet.kind(),
                    self.id
                );
                false
            }
        }
    }
}

/// Manages all live connections
///
/// Ids start from 1 and increment for each accepted connection. A connection
/// is registered from accept until its disconnect has been processed.
pub struct ClientManager {
    /// Connected clients indexed by their id
    clients: HashMap<ConnectionId, Client>,
    /// Next id handed out
    next_client_id: ConnectionId,
    /// Maximum number of concurrent connections allowed
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new connection
    ///
    /// Returns Some(client_id) if successful, None if the server is at capacity.
    /// The `Connected` greeting is queued before the client becomes visible to
    /// publishers, so it is always the first packet the peer receives.
    pub fn add_client(&mut self, addr: SocketAddr, sender: OutboundTx) -> Option<ConnectionId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let client = Client::new(client_id, addr, sender);
        client.send(Packet::Connected { client_id });
        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, client);

        Some(client_id)
    }

    /// Unregisters a connection
    ///
    /// Returns true if the client was found and removed, false if already gone.
    /// Dropping the client closes its outbound queue, which ends its writer task.
    pub fn remove_client(&mut self, client_id: &ConnectionId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!(
                "Client {} disconnected after {:.1}s",
                client.id,
                client.connected_at.elapsed().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Publisher for ClientManager {
    fn publish(&self, packet: &Packet, recipients: Recipients) {
        for client_id in recipients.resolve(self.clients.keys().copied()) {
            if let Some(client) = self.clients.get(&client_id) {
                client.send(packet.clone());
            }
        }
    }
}
