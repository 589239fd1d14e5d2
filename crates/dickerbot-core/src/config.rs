//! Node configuration.
//!
//! Timing and identity parameters shared by both nodes. Hosts load this
//! from a file; firmware builds use [`NodeConfig::default`].

use serde::{Deserialize, Serialize};

/// Bounded retry policy for WiFi association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Number of association status checks before giving up.
    pub max_attempts: u32,

    /// Delay between two status checks.
    pub interval_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Longest time an association attempt can take.
    pub fn total_wait_ms(&self) -> u64 {
        u64::from(self.max_attempts) * self.interval_ms
    }
}

/// Configuration for a Controller or Communicator node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeConfig {
    /// Identifier sent back in the `RD` handshake (the MAC address on hardware).
    pub device_id: String,

    /// Period of `SD` frames emitted by the Controller.
    pub telemetry_period_ms: u64,

    /// Period of `ID` frames emitted by the Communicator.
    pub image_period_ms: u64,

    /// WiFi association retry policy.
    pub association: RetryPolicy,

    /// Interval at which a dropped session is retried by the transport.
    pub session_reconnect_ms: u64,

    /// Bytes a link may buffer without seeing a frame terminator.
    pub link_buffer_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            device_id: "dickerbot".to_string(),
            telemetry_period_ms: 100,
            image_period_ms: 200,
            association: RetryPolicy::default(),
            session_reconnect_ms: 3000,
            link_buffer_capacity: dickerbot_protocol::codec::DEFAULT_LINK_CAPACITY,
        }
    }
}
