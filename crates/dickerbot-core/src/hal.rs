//! Collaborator traits.
//!
//! Node logic never touches hardware directly. Each platform (ESP32
//! firmware, Linux simulation, unit tests) supplies implementations of
//! these traits. All methods are non-blocking.

use dickerbot_protocol::ControlCommand;

/// A point-to-point byte channel (UART between the nodes, USB serial to
/// the host computer). Treated as unreliable: bytes may be lost or garbled.
pub trait Link {
    /// Copy whatever bytes are pending into `buf`. Returns 0 when idle.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Queue bytes for transmission.
    fn write(&mut self, bytes: &[u8]);
}

/// Station-mode WiFi radio.
pub trait WifiRadio {
    /// Start associating with a network. Returns immediately.
    fn begin(&mut self, ssid: &str, password: &str);

    /// Whether the station is associated and has an address.
    fn is_associated(&mut self) -> bool;
}

/// Events reported by a session transport, consumed once per poll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session handshake completed.
    Connected,
    /// The session was lost (the transport keeps retrying on its own).
    Disconnected,
    /// A text message arrived from the operator side.
    Text(String),
}

/// WebSocket-style client session to the operator.
pub trait SessionTransport {
    /// Start connecting to `ws://host:port/`, retrying autonomously.
    fn open(&mut self, host: &str, port: u16);

    /// Tear the session down and stop retrying.
    fn close(&mut self);

    /// Next pending event, if any.
    fn poll_event(&mut self) -> Option<SessionEvent>;

    /// Send a text message. Dropped silently if the session is not up.
    fn send_text(&mut self, text: &str);
}

/// Camera capture.
pub trait Camera {
    /// Capture one encoded frame. `None` when capture failed this time.
    fn capture_frame(&mut self) -> Option<Vec<u8>>;
}

/// H-bridge motor output.
pub trait DriveTrain {
    fn drive(&mut self, command: &ControlCommand);
}

/// One inertial measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample {
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
    pub temperature: f32,
}

/// Controller sensor drivers.
pub trait SensorSuite {
    fn read_imu(&mut self) -> Option<ImuSample>;

    /// Distances in centimetres: left, front, right, back.
    fn read_distances(&mut self) -> [Option<u16>; 4];
}

/// Momentary push button.
pub trait Button {
    fn is_pressed(&mut self) -> bool;
}

/// Events shown on the status LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedEvent {
    /// Node initialised.
    Startup,
    /// Provisioning data accepted.
    Provisioned,
    /// Associating with WiFi, or the session dropped.
    Connecting,
    /// Session opened or confirmed.
    SessionUp,
}

/// Fire-and-forget LED indicator.
pub trait StatusLed {
    fn notify(&mut self, event: LedEvent);
}

impl<T: Link + ?Sized> Link for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        (**self).read(buf)
    }

    fn write(&mut self, bytes: &[u8]) {
        (**self).write(bytes)
    }
}
