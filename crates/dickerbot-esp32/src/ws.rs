//! WebSocket session on the ESP-IDF client.
//!
//! The IDF client runs its own task and reconnects on its own after
//! `reconnect_timeout`. Its callbacks are turned into [`SessionEvent`]s on
//! a channel that the node loop drains.

use std::sync::mpsc;
use std::time::Duration;

use dickerbot_core::hal::{SessionEvent, SessionTransport};
use embedded_svc::ws::FrameType;
use esp_idf_svc::io::EspIOError;
use esp_idf_svc::ws::client::{
    EspWebSocketClient, EspWebSocketClientConfig, WebSocketEvent, WebSocketEventType,
};
use log::{debug, info, warn};

const SEND_TIMEOUT: Duration = Duration::from_secs(1);

pub struct EspWsSession {
    reconnect_timeout: Duration,
    client: Option<EspWebSocketClient<'static>>,
    events: Option<mpsc::Receiver<SessionEvent>>,
    connected: bool,
}

impl EspWsSession {
    pub fn new(reconnect_timeout: Duration) -> Self {
        Self {
            reconnect_timeout,
            client: None,
            events: None,
            connected: false,
        }
    }
}

impl SessionTransport for EspWsSession {
    fn open(&mut self, host: &str, port: u16) {
        self.close();

        let uri = format!("ws://{}:{}/", host, port);
        let config = EspWebSocketClientConfig {
            reconnect_timeout_ms: self.reconnect_timeout,
            ..Default::default()
        };
        let (tx, rx) = mpsc::channel();

        let callback = move |event: &Result<WebSocketEvent<'_>, EspIOError>| {
            let Ok(event) = event else {
                return;
            };
            let mapped = match event.event_type {
                WebSocketEventType::Connected => Some(SessionEvent::Connected),
                WebSocketEventType::Disconnected | WebSocketEventType::Closed => {
                    Some(SessionEvent::Disconnected)
                }
                WebSocketEventType::Text(text) => Some(SessionEvent::Text(text.to_string())),
                _ => None,
            };
            if let Some(mapped) = mapped {
                let _ = tx.send(mapped);
            }
        };

        match EspWebSocketClient::new(&uri, &config, SEND_TIMEOUT, callback) {
            Ok(client) => {
                info!("Opening session to {}", uri);
                self.client = Some(client);
                self.events = Some(rx);
            }
            Err(e) => warn!("Failed to create session to {}: {}", uri, e),
        }
    }

    fn close(&mut self) {
        if self.client.take().is_some() {
            debug!("Session closed");
        }
        self.events = None;
        self.connected = false;
    }

    fn poll_event(&mut self) -> Option<SessionEvent> {
        let event = self.events.as_ref()?.try_recv().ok()?;
        match event {
            // The IDF client reports both Disconnected and Closed for one drop.
            SessionEvent::Disconnected if !self.connected => return self.poll_event(),
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
        if let Some(client) = self.client.as_mut() {
            if let Err(e) = client.send(FrameType::Text(false), text.as_bytes()) {
                warn!("Session send failed: {}", e);
            }
        }
    }
}
