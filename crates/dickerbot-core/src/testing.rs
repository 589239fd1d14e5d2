//! In-memory collaborators for unit tests.
//!
//! Each fake is a cheap handle around shared state, so a test can hand one
//! clone to a node and keep another to inject input and inspect output.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use dickerbot_protocol::{ConnectionCredentials, ControlCommand};

use crate::credentials::{CredentialStore, MemoryCredentialStore, StoreError};
use crate::hal::{
    Button, Camera, DriveTrain, ImuSample, LedEvent, Link, SensorSuite, SessionEvent,
    SessionTransport, StatusLed, WifiRadio,
};

type Shared<T> = Rc<RefCell<T>>;

// ============================================================================
// Link
// ============================================================================

#[derive(Clone, Default)]
pub struct FakeLink {
    inbound: Shared<VecDeque<u8>>,
    outbound: Shared<VecDeque<u8>>,
}

impl FakeLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two ends of one wire: what one writes, the other reads.
    pub fn pair() -> (FakeLink, FakeLink) {
        let a_to_b: Shared<VecDeque<u8>> = Rc::default();
        let b_to_a: Shared<VecDeque<u8>> = Rc::default();
        (
            FakeLink {
                inbound: Rc::clone(&b_to_a),
                outbound: Rc::clone(&a_to_b),
            },
            FakeLink {
                inbound: a_to_b,
                outbound: b_to_a,
            },
        )
    }

    pub fn inject(&self, bytes: &[u8]) {
        self.inbound.borrow_mut().extend(bytes.iter().copied());
    }

    pub fn take_written(&self) -> String {
        let bytes: Vec<u8> = self.outbound.borrow_mut().drain(..).collect();
        String::from_utf8(bytes).unwrap()
    }
}

impl Link for FakeLink {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut inbound = self.inbound.borrow_mut();
        let n = buf.len().min(inbound.len());
        for (slot, byte) in buf.iter_mut().zip(inbound.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn write(&mut self, bytes: &[u8]) {
        self.outbound.borrow_mut().extend(bytes.iter().copied());
    }
}

// ============================================================================
// WiFi
// ============================================================================

#[derive(Default)]
struct RadioState {
    associate_on_check: Option<u32>,
    checks: u32,
    begins: Vec<(String, String)>,
}

#[derive(Clone, Default)]
pub struct FakeRadio(Shared<RadioState>);

impl FakeRadio {
    /// A radio that never associates.
    pub fn never() -> Self {
        Self::default()
    }

    /// A radio that reports associated from the `n`th status check on.
    pub fn after(n: u32) -> Self {
        let radio = Self::default();
        radio.0.borrow_mut().associate_on_check = Some(n);
        radio
    }

    pub fn checks(&self) -> u32 {
        self.0.borrow().checks
    }

    pub fn begins(&self) -> Vec<(String, String)> {
        self.0.borrow().begins.clone()
    }
}

impl WifiRadio for FakeRadio {
    fn begin(&mut self, ssid: &str, password: &str) {
        let mut state = self.0.borrow_mut();
        state.checks = 0;
        state.begins.push((ssid.to_string(), password.to_string()));
    }

    fn is_associated(&mut self) -> bool {
        let mut state = self.0.borrow_mut();
        state.checks += 1;
        matches!(state.associate_on_check, Some(n) if state.checks >= n)
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Default)]
struct SessionState {
    events: VecDeque<SessionEvent>,
    sent: Vec<String>,
    opened: Vec<(String, u16)>,
    closed: u32,
}

#[derive(Clone, Default)]
pub struct FakeSession(Shared<SessionState>);

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_event(&self, event: SessionEvent) {
        self.0.borrow_mut().events.push_back(event);
    }

    pub fn push_text(&self, text: &str) {
        self.push_event(SessionEvent::Text(text.to_string()));
    }

    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut self.0.borrow_mut().sent)
    }

    pub fn opened(&self) -> Vec<(String, u16)> {
        self.0.borrow().opened.clone()
    }

    pub fn closed(&self) -> u32 {
        self.0.borrow().closed
    }
}

impl SessionTransport for FakeSession {
    fn open(&mut self, host: &str, port: u16) {
        self.0.borrow_mut().opened.push((host.to_string(), port));
    }

    fn close(&mut self) {
        self.0.borrow_mut().closed += 1;
    }

    fn poll_event(&mut self) -> Option<SessionEvent> {
        self.0.borrow_mut().events.pop_front()
    }

    fn send_text(&mut self, text: &str) {
        self.0.borrow_mut().sent.push(text.to_string());
    }
}

// ============================================================================
// Peripherals
// ============================================================================

/// Camera returning queued captures, then failing.
#[derive(Clone, Default)]
pub struct FakeCamera(Shared<VecDeque<Option<Vec<u8>>>>);

impl FakeCamera {
    pub fn queue(&self, capture: Option<Vec<u8>>) {
        self.0.borrow_mut().push_back(capture);
    }
}

impl Camera for FakeCamera {
    fn capture_frame(&mut self) -> Option<Vec<u8>> {
        self.0.borrow_mut().pop_front().flatten()
    }
}

#[derive(Clone, Default)]
pub struct FakeButton(Shared<bool>);

impl FakeButton {
    pub fn set(&self, pressed: bool) {
        *self.0.borrow_mut() = pressed;
    }
}

impl Button for FakeButton {
    fn is_pressed(&mut self) -> bool {
        *self.0.borrow()
    }
}

#[derive(Clone, Default)]
pub struct FakeLed(Shared<Vec<LedEvent>>);

impl FakeLed {
    pub fn events(&self) -> Vec<LedEvent> {
        self.0.borrow().clone()
    }
}

impl StatusLed for FakeLed {
    fn notify(&mut self, event: LedEvent) {
        self.0.borrow_mut().push(event);
    }
}

#[derive(Clone, Default)]
pub struct FakeDrive(Shared<Vec<ControlCommand>>);

impl FakeDrive {
    pub fn commands(&self) -> Vec<ControlCommand> {
        self.0.borrow().clone()
    }
}

impl DriveTrain for FakeDrive {
    fn drive(&mut self, command: &ControlCommand) {
        self.0.borrow_mut().push(*command);
    }
}

#[derive(Default)]
struct SensorState {
    imu: Option<ImuSample>,
    distances: [Option<u16>; 4],
}

#[derive(Clone, Default)]
pub struct FakeSensors(Shared<SensorState>);

impl FakeSensors {
    pub fn set(&self, imu: Option<ImuSample>, distances: [Option<u16>; 4]) {
        let mut state = self.0.borrow_mut();
        state.imu = imu;
        state.distances = distances;
    }
}

impl SensorSuite for FakeSensors {
    fn read_imu(&mut self) -> Option<ImuSample> {
        self.0.borrow().imu
    }

    fn read_distances(&mut self) -> [Option<u16>; 4] {
        self.0.borrow().distances
    }
}

// ============================================================================
// Store
// ============================================================================

#[derive(Clone, Default)]
pub struct SharedStore(Shared<MemoryCredentialStore>);

impl SharedStore {
    pub fn with(credentials: ConnectionCredentials) -> Self {
        Self(Rc::new(RefCell::new(MemoryCredentialStore::with(credentials))))
    }

    pub fn current(&self) -> Option<ConnectionCredentials> {
        self.0.borrow().load().unwrap()
    }
}

impl CredentialStore for SharedStore {
    fn load(&self) -> Result<Option<ConnectionCredentials>, StoreError> {
        self.0.borrow().load()
    }

    fn save(&mut self, credentials: &ConnectionCredentials) -> Result<(), StoreError> {
        self.0.borrow_mut().save(credentials)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.0.borrow_mut().clear()
    }
}
