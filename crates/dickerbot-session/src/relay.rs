//! Operator relay hub.
//!
//! The robot's Communicator and any number of operator programs connect
//! here as WebSocket clients. Every non-blank text message is forwarded to
//! every *other* connected client; the relay itself never interprets
//! frames.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::SessionError;

/// Configuration for the relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Messages buffered per client before a slow client starts skipping.
    pub channel_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            channel_capacity: 256,
        }
    }
}

/// A text message tagged with the client that sent it.
#[derive(Debug, Clone)]
struct Relayed {
    from: u64,
    text: Arc<str>,
}

/// The relay WebSocket server.
pub struct RelayServer {
    config: RelayConfig,
    relay_tx: broadcast::Sender<Relayed>,
    next_client: Arc<AtomicU64>,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Self {
        let (relay_tx, _) = broadcast::channel(config.channel_capacity);
        Self {
            config,
            relay_tx,
            next_client: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the relay, accepting connections until the task is dropped.
    pub async fn run(self) -> Result<(), SessionError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Relay listening on {}", self.config.bind_addr);

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let id = self.next_client.fetch_add(1, Ordering::Relaxed);
                    let relay_tx = self.relay_tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, id, relay_tx).await {
                            error!("Connection error from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

/// Serve one client until it goes away.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    id: u64,
    relay_tx: broadcast::Sender<Relayed>,
) -> Result<(), SessionError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    info!(client = id, "Client connected from {}", addr);

    // Subscribe before the first read so nothing sent after the handshake
    // is missed.
    let mut relay_rx = relay_tx.subscribe();
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text.trim().is_empty() {
                            continue;
                        }
                        debug!(client = id, "relaying {} bytes", text.len());
                        // No receivers just means nobody else is connected.
                        let _ = relay_tx.send(Relayed { from: id, text: text.into() });
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_tx.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!(client = id, "Client {} closed connection", addr);
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(client = id, "WebSocket error from {}: {}", addr, e);
                        break;
                    }
                    None => {
                        info!(client = id, "Client {} disconnected", addr);
                        break;
                    }
                    _ => {}
                }
            }

            relayed = relay_rx.recv() => {
                match relayed {
                    Ok(relayed) if relayed.from == id => {}
                    Ok(relayed) => {
                        if let Err(e) = ws_tx.send(Message::Text(relayed.text.to_string())).await {
                            warn!(client = id, "Failed to forward to {}: {}", addr, e);
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(client = id, "Client {} lagged {} messages", addr, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    Ok(())
}
