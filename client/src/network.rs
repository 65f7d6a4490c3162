//! Client network layer.
//!
//! The render loop is synchronous, so the TCP session runs on its own thread
//! with a current-thread tokio runtime. Both sides talk through unbounded
//! channels; nothing on the render side ever blocks on the socket.

use log::{debug, error, info};
use shared::{read_packet, write_packet, Packet};
use std::error::Error;
use std::thread::JoinHandle;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    Packet(Packet),
    Closed(String),
}

pub struct Connection {
    outbound: Option<mpsc::UnboundedSender<Packet>>,
    inbound: mpsc::UnboundedReceiver<NetworkEvent>,
    thread: Option<JoinHandle<()>>,
}

impl Connection {
    /// Starts the network thread and connects to `server` in the background.
    pub fn spawn(server: &str) -> Result<Self, BoxError> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let server = server.to_string();

        let thread = std::thread::Builder::new()
            .name("network".to_string())
            .spawn(move || {
                let closed_tx = inbound_tx.clone();
                if let Err(e) = runtime.block_on(run_session(&server, outbound_rx, inbound_tx)) {
                    error!("Network session failed: {}", e);
                    let _ = closed_tx.send(NetworkEvent::Closed(e.to_string()));
                }
            })?;

        Ok(Self {
            outbound: Some(outbound_tx),
            inbound: inbound_rx,
            thread: Some(thread),
        })
    }

    /// Queues a packet. Returns false once the session has ended.
    pub fn send(&self, packet: Packet) -> bool {
        self.outbound
            .as_ref()
            .map(|tx| tx.send(packet).is_ok())
            .unwrap_or(false)
    }

    /// Drains every event received since the last call.
    pub fn poll(&mut self) -> Vec<NetworkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.inbound.try_recv() {
            events.push(event);
        }
        events
    }

    /// Sends `Disconnect` and waits for the network thread to finish.
    pub fn shutdown(&mut self) {
        self.outbound.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Network thread panicked");
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs one TCP session until either side closes it.
///
/// Inbound packets are forwarded in order. When the outbound channel closes
/// the server is told `Disconnect` before the socket is shut.
pub async fn run_session(
    server: &str,
    mut outbound_rx: mpsc::UnboundedReceiver<Packet>,
    inbound_tx: mpsc::UnboundedSender<NetworkEvent>,
) -> Result<(), BoxError> {
    info!("Connecting to {}...", server);
    let stream = TcpStream::connect(server).await?;
    stream.set_nodelay(true)?;
    let (mut reader, mut writer) = stream.into_split();

    let reader_task = tokio::spawn(async move {
        loop {
            match read_packet(&mut reader).await {
                Ok(Some(packet)) => {
                    if inbound_tx.send(NetworkEvent::Packet(packet)).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    let _ = inbound_tx.send(NetworkEvent::Closed(
                        "Server closed the connection".to_string(),
                    ));
                    break;
                }
                Err(e) => {
                    let _ = inbound_tx.send(NetworkEvent::Closed(e.to_string()));
                    break;
                }
            }
        }
    });

    while let Some(packet) = outbound_rx.recv().await {
        debug!("Sending {}", packet.kind());
        if let Err(e) = write_packet(&mut writer, &packet).await {
            reader_task.abort();
            return Err(e.into());
        }
    }

    if let Err(e) = write_packet(&mut writer, &Packet::Disconnect).await {
        debug!("Could not send disconnect: {}", e);
    }
    reader_task.abort();
    info!("Disconnected from {}", server);
    Ok(())
}
