//! Frame types carried over the link and the operator session.
//!
//! Every frame is identified by a 2-character tag:
//! - `SD` sensor data (Controller → Communicator → session)
//! - `CD` control data (session → Communicator → Controller)
//! - `WD` WiFi/provisioning data (host or session → Communicator)
//! - `RD` reply data, the provisioning handshake confirmation
//! - `ID` image data (Communicator → session)
//!
//! Field order is positional and fixed per tag.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value carried by every sensor field that has not been sampled yet.
pub const SENTINEL: i32 = 999;

/// Maximum SSID length in bytes.
pub const MAX_SSID_LEN: usize = 31;

/// Maximum WiFi password length in bytes.
pub const MAX_PASSWORD_LEN: usize = 63;

/// Maximum server address length in bytes (dotted IPv4 text).
pub const MAX_HOST_LEN: usize = 15;

/// Frame terminator.
pub const TERMINATOR: char = ';';

/// Field separator.
pub const SEPARATOR: char = ',';

// ============================================================================
// Tags
// ============================================================================

/// The recognised frame tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// `SD`: 7 floats then 4 integers.
    SensorData,
    /// `CD`: wheel, speed, direction.
    ControlData,
    /// `WD`: ssid, password, ip, port.
    WifiData,
    /// `RD`: device identifier.
    ReplyData,
    /// `ID`: base64 image bytes.
    ImageData,
}

impl Tag {
    pub const ALL: [Tag; 5] = [
        Tag::SensorData,
        Tag::ControlData,
        Tag::WifiData,
        Tag::ReplyData,
        Tag::ImageData,
    ];

    /// The two ASCII characters identifying this tag on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Tag::SensorData => "SD",
            Tag::ControlData => "CD",
            Tag::WifiData => "WD",
            Tag::ReplyData => "RD",
            Tag::ImageData => "ID",
        }
    }

    /// Number of payload fields a frame with this tag carries.
    pub const fn field_count(self) -> usize {
        match self {
            Tag::SensorData => 11,
            Tag::ControlData => 3,
            Tag::WifiData => 4,
            Tag::ReplyData => 1,
            Tag::ImageData => 1,
        }
    }

    /// Look up a tag from its wire text.
    pub fn from_wire(text: &str) -> Option<Tag> {
        Tag::ALL.into_iter().find(|tag| tag.as_str() == text)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Sensor data
// ============================================================================

/// One poll cycle worth of Controller sensor readings.
///
/// Acceleration in m/s², angular rate in rad/s, temperature in °C and
/// distances in centimetres. Every field defaults to [`SENTINEL`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorFrame {
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
    pub gx: f32,
    pub gy: f32,
    pub gz: f32,
    /// Temperature.
    pub t: f32,
    /// Left distance.
    pub d_left: i32,
    /// Front distance.
    pub d_front: i32,
    /// Right distance.
    pub d_right: i32,
    /// Back distance.
    pub d_back: i32,
}

impl Default for SensorFrame {
    fn default() -> Self {
        let unset = SENTINEL as f32;
        Self {
            ax: unset,
            ay: unset,
            az: unset,
            gx: unset,
            gy: unset,
            gz: unset,
            t: unset,
            d_left: SENTINEL,
            d_front: SENTINEL,
            d_right: SENTINEL,
            d_back: SENTINEL,
        }
    }
}

impl SensorFrame {
    /// The 7 float fields in wire order.
    pub fn motion(&self) -> [f32; 7] {
        [self.ax, self.ay, self.az, self.gx, self.gy, self.gz, self.t]
    }

    /// The 4 distance fields in wire order (left, front, right, back).
    pub fn distances(&self) -> [i32; 4] {
        [self.d_left, self.d_front, self.d_right, self.d_back]
    }
}

// ============================================================================
// Control data
// ============================================================================

/// Wheel selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Wheel {
    Left = 0,
    Right = 1,
}

impl Wheel {
    pub fn from_code(code: i64) -> Option<Wheel> {
        match code {
            0 => Some(Wheel::Left),
            1 => Some(Wheel::Right),
            _ => None,
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Drive direction of one wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Neutral = 0,
    Forward = 1,
    Backward = 2,
}

impl Direction {
    pub fn from_code(code: i64) -> Option<Direction> {
        match code {
            0 => Some(Direction::Neutral),
            1 => Some(Direction::Forward),
            2 => Some(Direction::Backward),
            _ => None,
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Drive intent for a single wheel. Two of these (one per wheel) fully
/// describe the drivetrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlCommand {
    pub wheel: Wheel,
    /// Speed magnitude, 0-255.
    pub speed: u8,
    pub direction: Direction,
}

impl ControlCommand {
    pub const fn new(wheel: Wheel, speed: u8, direction: Direction) -> Self {
        Self {
            wheel,
            speed,
            direction,
        }
    }

    /// Speed 0, direction neutral.
    pub const fn neutral(wheel: Wheel) -> Self {
        Self::new(wheel, 0, Direction::Neutral)
    }

    pub fn is_neutral(&self) -> bool {
        self.speed == 0 && self.direction == Direction::Neutral
    }
}

// ============================================================================
// Provisioning data
// ============================================================================

/// WiFi and server connection parameters carried by a `WD` frame.
///
/// Length bounds are enforced by the codec; completeness (no missing
/// field) is checked by whoever persists them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCredentials {
    /// WiFi network SSID.
    pub ssid: String,

    /// WiFi network password (empty for open networks).
    pub password: String,

    /// WebSocket server address.
    pub host: String,

    /// WebSocket server port.
    pub port: u16,
}

impl ConnectionCredentials {
    pub fn new(
        ssid: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
            host: host.into(),
            port,
        }
    }
}

// ============================================================================
// Unified frame
// ============================================================================

/// A fully decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Sensor(SensorFrame),
    Control(ControlCommand),
    Wifi(ConnectionCredentials),
    /// Device identifier of the node that accepted provisioning.
    Reply(String),
    /// Raw image bytes (base64 on the wire).
    Image(Vec<u8>),
}

impl Frame {
    pub fn tag(&self) -> Tag {
        match self {
            Frame::Sensor(_) => Tag::SensorData,
            Frame::Control(_) => Tag::ControlData,
            Frame::Wifi(_) => Tag::WifiData,
            Frame::Reply(_) => Tag::ReplyData,
            Frame::Image(_) => Tag::ImageData,
        }
    }
}
