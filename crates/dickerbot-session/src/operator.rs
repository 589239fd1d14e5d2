//! Operator client.
//!
//! Connects to a relay, keeps the most recent telemetry and camera frame,
//! and sends drive commands and provisioning data to the robot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dickerbot_protocol::{
    decode_message, encode, ConnectionCredentials, ControlCommand, Direction, Frame, SensorFrame,
    Wheel,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::SessionError;

/// Latest telemetry frame and when it arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub frame: SensorFrame,
    pub received_at: DateTime<Utc>,
}

/// Latest decoded camera frame (JPEG bytes) and when it arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageReading {
    pub jpeg: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Latest {
    sensors: Option<SensorReading>,
    image: Option<ImageReading>,
    device_id: Option<String>,
}

/// A connection to the relay from the operator's side.
pub struct OperatorClient {
    outbound: mpsc::UnboundedSender<String>,
    latest: Arc<RwLock<Latest>>,
    task: JoinHandle<()>,
}

impl OperatorClient {
    /// Connect to a relay, e.g. `ws://192.168.1.5:8080/`.
    pub async fn connect(url: &str) -> Result<Self, SessionError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url).await?;
        info!("Operator connected to {}", url);

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let latest = Arc::new(RwLock::new(Latest::default()));

        let state = latest.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = ws_rx.next() => match msg {
                        Some(Ok(Message::Text(text))) => record(&state, &text).await,
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            warn!("Operator session error: {}", e);
                            break;
                        }
                        _ => {}
                    },
                    text = outbound_rx.recv() => match text {
                        Some(text) => {
                            if let Err(e) = ws_tx.send(Message::Text(text)).await {
                                warn!("Operator send failed: {}", e);
                                break;
                            }
                        }
                        None => {
                            let _ = ws_tx.close().await;
                            break;
                        }
                    },
                }
            }
            info!("Operator session ended");
        });

        Ok(Self {
            outbound,
            latest,
            task,
        })
    }

    /// Most recent sensor frame, if any arrived yet.
    pub async fn sensor_data(&self) -> Option<SensorReading> {
        self.latest.read().await.sensors.clone()
    }

    /// Most recent camera frame, if any arrived yet.
    pub async fn image_data(&self) -> Option<ImageReading> {
        self.latest.read().await.image.clone()
    }

    /// Device identifier from the last provisioning reply.
    pub async fn device_id(&self) -> Option<String> {
        self.latest.read().await.device_id.clone()
    }

    /// Send one `CD` frame per wheel, left first.
    pub fn set_control_data(
        &self,
        left_speed: u8,
        left_direction: Direction,
        right_speed: u8,
        right_direction: Direction,
    ) -> Result<(), SessionError> {
        self.send(&Frame::Control(ControlCommand::new(
            Wheel::Left,
            left_speed,
            left_direction,
        )))?;
        self.send(&Frame::Control(ControlCommand::new(
            Wheel::Right,
            right_speed,
            right_direction,
        )))
    }

    /// Send both wheels to the safe state.
    pub fn stop(&self) -> Result<(), SessionError> {
        self.set_control_data(0, Direction::Neutral, 0, Direction::Neutral)
    }

    /// Push new WiFi/server credentials to the robot.
    pub fn provision(&self, credentials: ConnectionCredentials) -> Result<(), SessionError> {
        self.send(&Frame::Wifi(credentials))
    }

    fn send(&self, frame: &Frame) -> Result<(), SessionError> {
        self.outbound
            .send(encode(frame))
            .map_err(|_| SessionError::Closed)
    }

    /// Whether the connection to the relay is still up.
    pub fn is_open(&self) -> bool {
        !self.task.is_finished()
    }

    /// Close the connection and wait for the session task to finish.
    pub async fn close(self) {
        let Self { outbound, task, .. } = self;
        drop(outbound);
        let _ = task.await;
    }
}

async fn record(latest: &RwLock<Latest>, text: &str) {
    match decode_message(text) {
        Ok(Frame::Sensor(frame)) => {
            latest.write().await.sensors = Some(SensorReading {
                frame,
                received_at: Utc::now(),
            });
        }
        Ok(Frame::Image(jpeg)) => {
            latest.write().await.image = Some(ImageReading {
                jpeg,
                received_at: Utc::now(),
            });
        }
        Ok(Frame::Reply(device_id)) => {
            info!("Robot {} acknowledged provisioning", device_id);
            latest.write().await.device_id = Some(device_id);
        }
        Ok(other) => debug!(tag = %other.tag(), "Ignoring frame"),
        Err(e) => debug!("Ignoring message: {}", e),
    }
}
