//! Simulated robot hardware.
//!
//! Both nodes run in one blocking thread, polled back to back each tick,
//! so the simulated collaborators share state through `Rc<RefCell<_>>`.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dickerbot_core::hal::{
    Button, Camera, DriveTrain, ImuSample, LedEvent, Link, SensorSuite, StatusLed, WifiRadio,
};
use dickerbot_core::{CommunicatorIo, CommunicatorNode, ControllerIo, ControllerNode};
use dickerbot_protocol::{encode, ControlCommand, Direction, Frame, LinkDecoder, Wheel};
use dickerbot_session::WsSession;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::config::HostConfig;
use crate::store::FileCredentialStore;

type Wire = Rc<RefCell<VecDeque<u8>>>;

/// One end of an in-process serial line.
pub struct SimLink {
    rx: Wire,
    tx: Wire,
}

impl SimLink {
    pub fn pair() -> (SimLink, SimLink) {
        let a: Wire = Rc::default();
        let b: Wire = Rc::default();
        (
            SimLink {
                rx: Rc::clone(&a),
                tx: Rc::clone(&b),
            },
            SimLink { rx: b, tx: a },
        )
    }
}

impl Link for SimLink {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut rx = self.rx.borrow_mut();
        let n = buf.len().min(rx.len());
        for (slot, byte) in buf.iter_mut().zip(rx.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn write(&mut self, bytes: &[u8]) {
        self.tx.borrow_mut().extend(bytes);
    }
}

/// Wheel state shared by the drivetrain and the sensors.
#[derive(Debug, Default)]
pub struct Motion {
    left: Cell<i32>,
    right: Cell<i32>,
}

impl Motion {
    /// Signed wheel speeds, forward positive.
    fn speeds(&self) -> (i32, i32) {
        (self.left.get(), self.right.get())
    }
}

pub struct SimDrive(Rc<Motion>);

impl DriveTrain for SimDrive {
    fn drive(&mut self, command: &ControlCommand) {
        let speed = i32::from(command.speed);
        let signed = match command.direction {
            Direction::Neutral => 0,
            Direction::Forward => speed,
            Direction::Backward => -speed,
        };
        let cell = match command.wheel {
            Wheel::Left => &self.0.left,
            Wheel::Right => &self.0.right,
        };
        if cell.replace(signed) != signed {
            info!(wheel = ?command.wheel, speed = signed, "Motor");
        }
    }
}

/// IMU and ultrasonic readings derived from the wheel state.
pub struct SimSensors {
    motion: Rc<Motion>,
    started: Instant,
    front_cm: f32,
}

impl SensorSuite for SimSensors {
    fn read_imu(&mut self) -> Option<ImuSample> {
        let t = self.started.elapsed().as_secs_f32();
        let (left, right) = self.motion.speeds();
        let forward = (left + right) as f32 / 510.0;
        let turn = (right - left) as f32 / 255.0;
        Some(ImuSample {
            accel: [forward * 0.5, 0.05 * (t * 3.0).sin(), 9.81],
            gyro: [0.0, 0.0, turn * 1.5],
            temperature: 24.0 + 0.5 * (t / 30.0).sin(),
        })
    }

    fn read_distances(&mut self) -> [Option<u16>; 4] {
        let (left, right) = self.motion.speeds();
        // Drive towards a wall that resets once reached.
        self.front_cm -= (left + right) as f32 / 510.0 * 2.0;
        if !(5.0..=400.0).contains(&self.front_cm) {
            self.front_cm = 200.0;
        }
        let front = self.front_cm as u16;
        // The back sensor has no echo in open space.
        [Some(35), Some(front), Some(42), None]
    }
}

/// Produces small JPEG-framed payloads; every tenth capture fails.
#[derive(Default)]
pub struct SimCamera {
    captures: u32,
}

impl Camera for SimCamera {
    fn capture_frame(&mut self) -> Option<Vec<u8>> {
        self.captures += 1;
        if self.captures % 10 == 0 {
            return None;
        }
        let mut jpeg = vec![0xFF, 0xD8];
        jpeg.extend_from_slice(&self.captures.to_be_bytes());
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        Some(jpeg)
    }
}

/// Reports associated after a few status checks.
pub struct SimRadio {
    checks_needed: u32,
    checks: u32,
}

impl WifiRadio for SimRadio {
    fn begin(&mut self, ssid: &str, _password: &str) {
        info!("WiFi: joining '{}'", ssid);
        self.checks = 0;
    }

    fn is_associated(&mut self) -> bool {
        self.checks += 1;
        self.checks >= self.checks_needed
    }
}

/// A button held once, for a fixed duration, at a fixed time.
pub struct ScriptedButton {
    started: Instant,
    press: Option<(Duration, Duration)>,
}

impl Button for ScriptedButton {
    fn is_pressed(&mut self) -> bool {
        let elapsed = self.started.elapsed();
        matches!(self.press, Some((at, held)) if elapsed >= at && elapsed < at + held)
    }
}

pub struct LogLed(&'static str);

impl StatusLed for LogLed {
    fn notify(&mut self, event: LedEvent) {
        debug!(node = self.0, ?event, "LED");
    }
}

/// The operator's computer on the Controller's USB serial port.
struct HostSerial {
    port: SimLink,
    decoder: LinkDecoder,
}

impl HostSerial {
    fn send_provisioning(&mut self, config: &HostConfig) {
        if let Some(credentials) = &config.provision {
            info!("Host: sending WiFi data for '{}'", credentials.ssid);
            let line = format!("{}\n", encode(&Frame::Wifi(credentials.clone())));
            self.port.write(line.as_bytes());
        }
    }

    fn poll(&mut self) {
        let mut buf = [0u8; 64];
        loop {
            let n = self.port.read(&mut buf);
            if n == 0 {
                break;
            }
            self.decoder.push(&buf[..n]);
        }
        while let Some(result) = self.decoder.next_frame() {
            match result {
                Ok(Frame::Reply(device_id)) => info!("Host: robot {} paired", device_id),
                Ok(other) => debug!(tag = %other.tag(), "Host: ignoring frame"),
                Err(e) => warn!("Host: {}", e),
            }
        }
    }
}

/// Build both nodes and run them until `shutdown` is set.
///
/// Blocks the calling thread; run it with `spawn_blocking`.
pub fn run_robot(config: HostConfig, runtime: Handle, shutdown: Arc<AtomicBool>) {
    let started = Instant::now();
    let motion = Rc::new(Motion::default());
    let (controller_uart, communicator_uart) = SimLink::pair();
    let (controller_usb, host_usb) = SimLink::pair();

    let mut controller = ControllerNode::new(
        config.node.clone(),
        ControllerIo {
            link: Box::new(controller_uart),
            host: Box::new(controller_usb),
            drive: Box::new(SimDrive(Rc::clone(&motion))),
            sensors: Box::new(SimSensors {
                motion: Rc::clone(&motion),
                started,
                front_cm: 200.0,
            }),
            led: Box::new(LogLed("controller")),
        },
    );

    let session = WsSession::new(
        runtime,
        Duration::from_millis(config.node.session_reconnect_ms),
    );
    let mut communicator = CommunicatorNode::new(
        config.node.clone(),
        CommunicatorIo {
            link: Box::new(communicator_uart),
            store: Box::new(FileCredentialStore::new(&config.credentials_path)),
            radio: Box::new(SimRadio {
                checks_needed: 3,
                checks: 0,
            }),
            session: Box::new(session),
            camera: Box::new(SimCamera::default()),
            button: Box::new(ScriptedButton {
                started,
                press: config
                    .button_press_at_ms
                    .map(|at| (Duration::from_millis(at), Duration::from_millis(200))),
            }),
            led: Box::new(LogLed("communicator")),
        },
    );

    let mut host = HostSerial {
        port: host_usb,
        decoder: LinkDecoder::with_capacity(config.node.link_buffer_capacity),
    };

    controller.begin(0);
    communicator.begin(0);
    host.send_provisioning(&config);

    let tick = Duration::from_millis(config.tick_ms.max(1));
    while !shutdown.load(Ordering::Relaxed) {
        let now_ms = started.elapsed().as_millis() as u64;
        controller.poll(now_ms);
        communicator.poll(now_ms);
        host.poll();
        std::thread::sleep(tick);
    }

    info!("Robot simulation stopped");
}
