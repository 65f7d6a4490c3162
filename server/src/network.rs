//! Server network layer: TCP connections feeding a single-owner main loop

use crate::client_manager::{outbound_channel, ClientManager, OutboundRx};
use crate::config::ServerConfig;
use crate::fanout::{self, Outbound};
use crate::presence::PresenceStore;
use crate::session::{Session, SessionEvent};
use log::{debug, error, info, warn};
use shared::{read_packet, write_packet, ConnectionId, Packet};
use std::collections::HashMap;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    ConnectionOpened { client_id: ConnectionId },
    PacketReceived { client_id: ConnectionId, packet: Packet },
    ConnectionClosed { client_id: ConnectionId },
}

/// Main server: accepts connections and runs every session on one loop
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    clients: Arc<RwLock<ClientManager>>,
    store: PresenceStore,
    sessions: HashMap<ConnectionId, Session>,
    status_interval: Duration,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(config: &ServerConfig) -> Result<Self, BoxError> {
        let spawn_area = config.spawn_area()?;
        Self::with_store(config, PresenceStore::new(spawn_area)).await
    }

    /// Binds with a caller-supplied store, e.g. one seeded for tests.
    pub async fn with_store(config: &ServerConfig, store: PresenceStore) -> Result<Self, BoxError> {
        let max_clients = config.client_limit()?;
        let listener = TcpListener::bind(config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            store,
            sessions: HashMap::new(),
            status_interval: Duration::from_secs(config.status_interval_secs.max(1)),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawns task that accepts connections and registers them
    fn spawn_acceptor(&self, listener: TcpListener) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
                        }

                        let (out_tx, out_rx) = outbound_channel();
                        let client_id = {
                            let mut clients_guard = clients.write().await;
                            clients_guard.add_client(addr, out_tx)
                        };

                        match client_id {
                            Some(client_id) => {
                                if server_tx
                                    .send(ServerMessage::ConnectionOpened { client_id })
                                    .is_err()
                                {
                                    error!("Main loop gone, stopping acceptor");
                                    break;
                                }
                                Self::spawn_connection(client_id, stream, out_rx, server_tx.clone());
                            }
                            None => {
                                warn!("Refusing connection from {}: server full", addr);
                                tokio::spawn(Self::refuse(stream, "Server full"));
                            }
                        }
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    async fn refuse(mut stream: TcpStream, reason: &str) {
        let packet = Packet::Disconnected {
            reason: reason.to_string(),
        };
        if let Err(e) = write_packet(&mut stream, &packet).await {
            debug!("Failed to send refusal: {}", e);
        }
    }

    /// Spawns the reader and writer tasks for one connection
    ///
    /// The reader forwards packets in arrival order and always finishes with
    /// `ConnectionClosed`, whatever ended the stream. A failed write stops the
    /// reader and reports the close itself, so the socket is never left
    /// half-open.
    fn spawn_connection(
        client_id: ConnectionId,
        stream: TcpStream,
        mut out_rx: OutboundRx,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) {
        let (mut reader, mut writer) = stream.into_split();
        let writer_server_tx = server_tx.clone();

        let reader_task = tokio::spawn(async move {
            loop {
                match read_packet(&mut reader).await {
                    Ok(Some(Packet::Disconnect)) => {
                        debug!("Client {} sent disconnect", client_id);
                        break;
                    }
                    Ok(Some(packet)) => {
                        if server_tx
                            .send(ServerMessage::PacketReceived { client_id, packet })
                            .is_err()
                        {
                            error!("Failed to forward packet from client {}", client_id);
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("Client {} closed the connection", client_id);
                        break;
                    }
                    Err(e) => {
                        warn!("Dropping client {}: {}", client_id, e);
                        break;
                    }
                }
            }

            let _ = server_tx.send(ServerMessage::ConnectionClosed { client_id });
        });

        tokio::spawn(async move {
            while let Some(packet) = out_rx.recv().await {
                if let Err(e) = write_packet(&mut writer, &packet).await {
                    warn!(
                        "Closing client {}: failed to write {}: {}",
                        client_id,
                        packet.kind(),
                        e
                    );
                    reader_task.abort();
                    let _ = writer_server_tx.send(ServerMessage::ConnectionClosed { client_id });
                    break;
                }
            }
        });
    }

    async fn dispatch(&self, outbound: Vec<Outbound>) {
        if outbound.is_empty() {
            return;
        }
        let clients = self.clients.read().await;
        fanout::deliver(&*clients, &outbound);
    }

    /// Runs one event to completion: state transition, then fan-out
    async fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::ConnectionOpened { client_id } => {
                self.sessions.insert(client_id, Session::new(client_id));
            }

            ServerMessage::PacketReceived { client_id, packet } => {
                let kind = packet.kind();
                let Some(event) = SessionEvent::from_packet(packet) else {
                    warn!("Unexpected {} packet from client {}", kind, client_id);
                    return;
                };
                let Some(session) = self.sessions.get_mut(&client_id) else {
                    debug!("Dropping {} from unknown client {}", kind, client_id);
                    return;
                };

                let outbound = session.handle(event, &mut self.store);
                self.dispatch(outbound).await;
            }

            // May arrive twice when both tasks see the failure; the second is a no-op
            ServerMessage::ConnectionClosed { client_id } => {
                {
                    let mut clients = self.clients.write().await;
                    clients.remove_client(&client_id);
                }

                let Some(mut session) = self.sessions.remove(&client_id) else {
                    return;
                };
                let outbound = session.handle(SessionEvent::Disconnect, &mut self.store);
                self.dispatch(outbound).await;
            }
        }
    }

    async fn log_status(&self) {
        let connections = self.clients.read().await.len();
        debug!(
            "{} connections, {} players present",
            connections,
            self.store.len()
        );
    }

    /// Main server loop
    pub async fn run(&mut self) -> Result<(), BoxError> {
        let listener = self
            .listener
            .take()
            .ok_or("server is already running")?;
        self.spawn_acceptor(listener);

        let mut status_interval = interval(self.status_interval);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(message) => self.handle_message(message).await,
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = status_interval.tick() => {
                    self.log_status().await;
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::{Publisher, Recipients};
    use crate::presence::SpawnArea;
    use shared::{Identity, MAX_DISPLAY_NAME_LEN, MAX_FRAME_LEN};
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    fn test_config() -> ServerConfig {
        ServerConfig {
            port: 0,
            max_clients: 1,
            ..ServerConfig::default()
        }
    }

    async fn next_packet(stream: &mut TcpStream) -> Option<Packet> {
        timeout(Duration::from_secs(2), read_packet(stream))
            .await
            .expect("timed out waiting for packet")
            .expect("failed to read packet")
    }

    #[tokio::test]
    async fn test_bind_to_ephemeral_port() {
        let server = Server::new(&test_config()).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_invalid_spawn_area_fails_startup() {
        let config = ServerConfig {
            spawn_range: f32::NAN,
            ..test_config()
        };
        assert!(Server::new(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_too_many_clients_fails_startup() {
        let config = ServerConfig {
            max_clients: 10_000,
            ..test_config()
        };
        assert!(Server::new(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_run_twice_is_an_error() {
        let mut server = Server::new(&test_config()).await.unwrap();
        server.listener = None;
        assert!(server.run().await.is_err());
    }

    #[tokio::test]
    async fn test_connection_over_capacity_is_refused() {
        let store = PresenceStore::with_seed(SpawnArea::default(), 1);
        let mut server = Server::with_store(&test_config(), store).await.unwrap();
        let addr = server.local_addr();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let mut first = TcpStream::connect(addr).await.unwrap();
        assert_eq!(
            next_packet(&mut first).await,
            Some(Packet::Connected { client_id: 1 })
        );

        let mut second = TcpStream::connect(addr).await.unwrap();
        assert_eq!(
            next_packet(&mut second).await,
            Some(Packet::Disconnected {
                reason: "Server full".to_string()
            })
        );
        assert_eq!(next_packet(&mut second).await, None);
    }

    #[tokio::test]
    async fn test_join_and_move_over_tcp() {
        let store = PresenceStore::with_seed(SpawnArea::default(), 1);
        let mut server = Server::with_store(&test_config(), store).await.unwrap();
        let addr = server.local_addr();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let mut stream = TcpStream::connect(addr).await.unwrap();
        assert_eq!(
            next_packet(&mut stream).await,
            Some(Packet::Connected { client_id: 1 })
        );

        write_packet(&mut stream, &Packet::Join { identity: None })
            .await
            .unwrap();
        match next_packet(&mut stream).await {
            Some(Packet::Roster { players }) => {
                assert_eq!(players.len(), 1);
                assert!(players.contains_key(&1));
            }
            other => panic!("Expected roster, got {:?}", other),
        }

        // A lone mover hears nothing back
        write_packet(&mut stream, &Packet::Move { x: 1.0, y: 2.0 })
            .await
            .unwrap();
        assert!(
            timeout(Duration::from_millis(150), read_packet(&mut stream))
                .await
                .is_err()
        );
    }

    async fn connect_and_join(addr: SocketAddr, identity: Option<Identity>) -> TcpStream {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        assert!(matches!(
            next_packet(&mut stream).await,
            Some(Packet::Connected { .. })
        ));
        write_packet(&mut stream, &Packet::Join { identity })
            .await
            .unwrap();
        stream
    }

    #[tokio::test]
    async fn test_long_names_still_get_full_roster() {
        let config = ServerConfig {
            max_clients: 2,
            ..test_config()
        };
        let store = PresenceStore::with_seed(SpawnArea::default(), 1);
        let mut server = Server::with_store(&config, store).await.unwrap();
        let addr = server.local_addr();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let long_name = "a".repeat(40_000);
        let mut first = connect_and_join(addr, Some(Identity::new(1, long_name.clone()))).await;
        assert!(matches!(
            next_packet(&mut first).await,
            Some(Packet::Roster { .. })
        ));

        let mut second = connect_and_join(addr, Some(Identity::new(2, long_name))).await;
        match next_packet(&mut second).await {
            Some(Packet::Roster { players }) => {
                assert_eq!(players.len(), 2);
                for player in players.values() {
                    assert_eq!(player.display_name().len(), MAX_DISPLAY_NAME_LEN);
                }
            }
            other => panic!("Expected roster, got {:?}", other),
        }
        assert!(matches!(
            next_packet(&mut first).await,
            Some(Packet::PlayerJoined { .. })
        ));

        write_packet(&mut first, &Packet::Move { x: 3.0, y: 4.0 })
            .await
            .unwrap();
        assert_eq!(
            next_packet(&mut second).await,
            Some(Packet::PlayerMoved {
                id: 1,
                x: 3.0,
                y: 4.0
            })
        );
    }

    #[tokio::test]
    async fn test_write_failure_closes_connection() {
        let config = ServerConfig {
            max_clients: 2,
            ..test_config()
        };
        let store = PresenceStore::with_seed(SpawnArea::default(), 1);
        let mut server = Server::with_store(&config, store).await.unwrap();
        let addr = server.local_addr();
        let clients = Arc::clone(&server.clients);
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let mut watcher = connect_and_join(addr, None).await;
        assert!(matches!(
            next_packet(&mut watcher).await,
            Some(Packet::Roster { .. })
        ));
        let mut victim = connect_and_join(addr, None).await;
        assert!(matches!(
            next_packet(&mut victim).await,
            Some(Packet::Roster { .. })
        ));
        assert!(matches!(
            next_packet(&mut watcher).await,
            Some(Packet::PlayerJoined { .. })
        ));

        // Too large to encode, so the victim's writer fails
        let oversized = Packet::Disconnected {
            reason: "x".repeat(MAX_FRAME_LEN),
        };
        clients.read().await.publish(&oversized, Recipients::Only(2));

        let closed = timeout(Duration::from_secs(2), read_packet(&mut victim))
            .await
            .expect("connection left half-open");
        assert!(!matches!(closed, Ok(Some(_))));

        assert_eq!(
            next_packet(&mut watcher).await,
            Some(Packet::PlayerLeft { id: 2 })
        );
        assert_eq!(clients.read().await.len(), 1);
    }
}
