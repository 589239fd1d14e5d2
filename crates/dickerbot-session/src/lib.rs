//! # dickerbot-session
//!
//! The operator side of the DickerBot link, on tokio:
//! - [`relay::RelayServer`] - hub the robot and operator programs connect to
//! - [`client::WsSession`] - WebSocket [`SessionTransport`] for a hosted Communicator
//! - [`operator::OperatorClient`] - read telemetry and send drive commands
//!
//! [`SessionTransport`]: dickerbot_core::hal::SessionTransport

pub mod client;
pub mod error;
pub mod operator;
pub mod relay;

pub use client::WsSession;
pub use error::SessionError;
pub use operator::{ImageReading, OperatorClient, SensorReading};
pub use relay::{RelayConfig, RelayServer};
