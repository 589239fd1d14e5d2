//! WebSocket session transport for a hosted Communicator.
//!
//! The node loop is synchronous, so [`WsSession`] bridges it to tokio: the
//! connection runs as a task on a runtime handle, and events come back
//! through a queue drained by [`SessionTransport::poll_event`]. Outbound
//! text goes through a bounded queue; when the socket falls behind, new
//! messages are dropped instead of piling up.
//! After a drop or a failed handshake the task retries on its own at a
//! fixed interval until [`SessionTransport::close`] is called.

use std::time::Duration;

use dickerbot_core::hal::{SessionEvent, SessionTransport};
use futures::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Outbound messages waiting for the socket.
pub const OUTBOUND_CAPACITY: usize = 32;

/// Channels of one open session.
struct Active {
    events: mpsc::UnboundedReceiver<SessionEvent>,
    outbound: mpsc::Sender<String>,
    task: JoinHandle<()>,
    dropped: u64,
}

/// [`SessionTransport`] over tokio-tungstenite.
pub struct WsSession {
    runtime: Handle,
    reconnect_interval: Duration,
    active: Option<Active>,
    connected: bool,
}

impl WsSession {
    pub fn new(runtime: Handle, reconnect_interval: Duration) -> Self {
        Self {
            runtime,
            reconnect_interval,
            active: None,
            connected: false,
        }
    }

    /// Whether the last event drained was a successful handshake.
    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

impl SessionTransport for WsSession {
    fn open(&mut self, host: &str, port: u16) {
        self.close();

        let url = format!("ws://{}:{}/", host, port);
        let (event_tx, events) = mpsc::unbounded_channel();
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let task = self.runtime.spawn(run_session(
            url,
            self.reconnect_interval,
            event_tx,
            outbound_rx,
        ));
        self.active = Some(Active {
            events,
            outbound,
            task,
            dropped: 0,
        });
    }

    fn close(&mut self) {
        if let Some(active) = self.active.take() {
            debug!("Closing session");
            active.task.abort();
        }
        self.connected = false;
    }

    fn poll_event(&mut self) -> Option<SessionEvent> {
        let event = self.active.as_mut()?.events.try_recv().ok()?;
        match event {
            SessionEvent::Connected => self.connected = true,
            SessionEvent::Disconnected => self.connected = false,
            SessionEvent::Text(_) => {}
        }
        Some(event)
    }

    fn send_text(&mut self, text: &str) {
        if !self.connected {
            return;
        }
        let Some(active) = self.active.as_mut() else {
            return;
        };
        match active.outbound.try_send(text.to_string()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                active.dropped += 1;
                if active.dropped.is_power_of_two() {
                    debug!("Session backlog full, {} messages dropped", active.dropped);
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

impl Drop for WsSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Connect, pump messages, and reconnect until the session is closed.
async fn run_session(
    url: String,
    reconnect_interval: Duration,
    events: mpsc::UnboundedSender<SessionEvent>,
    mut outbound: mpsc::Receiver<String>,
) {
    loop {
        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((ws_stream, _)) => {
                info!("Session connected to {}", url);
                if events.send(SessionEvent::Connected).is_err() {
                    return;
                }
                let (mut ws_tx, mut ws_rx) = ws_stream.split();

                loop {
                    tokio::select! {
                        msg = ws_rx.next() => match msg {
                            Some(Ok(Message::Text(text))) => {
                                if events.send(SessionEvent::Text(text)).is_err() {
                                    return;
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if ws_tx.send(Message::Pong(data)).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Err(e)) => {
                                warn!("Session error: {}", e);
                                break;
                            }
                            _ => {}
                        },
                        text = outbound.recv() => match text {
                            Some(text) => {
                                if let Err(e) = ws_tx.send(Message::Text(text)).await {
                                    warn!("Session send failed: {}", e);
                                    break;
                                }
                            }
                            None => return,
                        },
                    }
                }

                warn!("Session to {} lost", url);
                if events.send(SessionEvent::Disconnected).is_err() {
                    return;
                }
            }
            Err(e) => debug!("Session connect to {} failed: {}", url, e),
        }

        // Whatever was queued for the old connection is stale.
        while outbound.try_recv().is_ok() {}
        tokio::time::sleep(reconnect_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_backlog_is_bounded() {
        let (_event_tx, events) = mpsc::unbounded_channel();
        let (outbound, mut outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let mut session = WsSession::new(Handle::current(), Duration::from_secs(1));
        session.active = Some(Active {
            events,
            outbound,
            task: tokio::spawn(async {}),
            dropped: 0,
        });
        session.connected = true;

        for i in 0..OUTBOUND_CAPACITY + 10 {
            session.send_text(&format!("ID,{};", i));
        }

        let mut queued = Vec::new();
        while let Ok(text) = outbound_rx.try_recv() {
            queued.push(text);
        }
        assert_eq!(queued.len(), OUTBOUND_CAPACITY);
        assert_eq!(queued[0], "ID,0;");
        assert_eq!(session.active.as_ref().map(|a| a.dropped), Some(10));
    }

    #[tokio::test]
    async fn test_send_is_dropped_while_not_connected() {
        let (_event_tx, events) = mpsc::unbounded_channel();
        let (outbound, mut outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let mut session = WsSession::new(Handle::current(), Duration::from_secs(1));
        session.active = Some(Active {
            events,
            outbound,
            task: tokio::spawn(async {}),
            dropped: 0,
        });

        session.send_text("SD,1;");
        assert!(outbound_rx.try_recv().is_err());
    }
}
