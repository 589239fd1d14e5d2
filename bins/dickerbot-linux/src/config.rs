//! Host configuration, read from a JSON file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use dickerbot_core::NodeConfig;
use dickerbot_protocol::ConnectionCredentials;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "DICKERBOT_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "dickerbot.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostConfig {
    /// Where the relay listens.
    pub relay_addr: SocketAddr,

    /// File backing the simulated Communicator's credential store.
    pub credentials_path: PathBuf,

    /// Credentials the simulated host computer sends over the Controller's
    /// serial port at startup. `None` skips provisioning.
    pub provision: Option<ConnectionCredentials>,

    /// Hold the simulated provisioning button this long after startup.
    pub button_press_at_ms: Option<u64>,

    /// Run the scripted operator against the relay.
    pub operator_demo: bool,

    /// Loop period of the simulated robot.
    pub tick_ms: u64,

    /// Node parameters shared by both simulated nodes.
    pub node: NodeConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            relay_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            credentials_path: PathBuf::from("dickerbot-credentials.json"),
            provision: Some(ConnectionCredentials::new("dickerbot-sim", "", "127.0.0.1", 8080)),
            button_press_at_ms: Some(1_000),
            operator_demo: true,
            tick_ms: 10,
            node: NodeConfig {
                device_id: simulated_mac(),
                ..NodeConfig::default()
            },
        }
    }
}

impl HostConfig {
    /// Load from `$DICKERBOT_CONFIG`, or `dickerbot.json`.
    pub fn from_env() -> anyhow::Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load(Path::new(&path))
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// URL operator programs use to reach the relay from this machine.
    pub fn relay_url(&self) -> String {
        let host = if self.relay_addr.ip().is_unspecified() {
            "127.0.0.1".to_string()
        } else {
            self.relay_addr.ip().to_string()
        };
        format!("ws://{}:{}/", host, self.relay_addr.port())
    }
}

/// A locally administered MAC-style identifier.
fn simulated_mac() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    let octets: Vec<String> = std::iter::once(0x02)
        .chain(bytes[..5].iter().copied())
        .map(|b| format!("{:02X}", b))
        .collect();
    octets.join(":")
}
