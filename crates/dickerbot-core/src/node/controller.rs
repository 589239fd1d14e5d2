//! Controller node: motors, sensors and the host serial port.

use dickerbot_protocol::{Frame, SensorFrame, SENTINEL};
use tracing::{debug, info};

use crate::config::NodeConfig;
use crate::drive::DriveCommands;
use crate::hal::{DriveTrain, LedEvent, Link, SensorSuite, StatusLed};
use crate::router::LinkChannel;

/// Hardware collaborators of a Controller.
pub struct ControllerIo {
    /// UART to the Communicator.
    pub link: Box<dyn Link>,
    /// USB serial to the operator's computer.
    pub host: Box<dyn Link>,
    pub drive: Box<dyn DriveTrain>,
    pub sensors: Box<dyn SensorSuite>,
    pub led: Box<dyn StatusLed>,
}

/// The Controller poll loop state.
///
/// Inbound on the link: `CD` is applied to the drivetrain, `RD` is relayed
/// to the host. Inbound on the host port: `WD` is forwarded to the
/// Communicator. Outbound: one `SD` frame per telemetry period.
pub struct ControllerNode {
    config: NodeConfig,
    link: LinkChannel<Box<dyn Link>>,
    host: LinkChannel<Box<dyn Link>>,
    drive: Box<dyn DriveTrain>,
    sensors: Box<dyn SensorSuite>,
    led: Box<dyn StatusLed>,
    commands: DriveCommands,
    next_telemetry_ms: u64,
}

impl ControllerNode {
    pub fn new(config: NodeConfig, io: ControllerIo) -> Self {
        let capacity = config.link_buffer_capacity;
        Self {
            link: LinkChannel::new(io.link, "communicator", capacity),
            host: LinkChannel::new(io.host, "host", capacity),
            drive: io.drive,
            sensors: io.sensors,
            led: io.led,
            commands: DriveCommands::neutral(),
            next_telemetry_ms: 0,
            config,
        }
    }

    /// Put the motors in the safe state and announce startup.
    pub fn begin(&mut self, now_ms: u64) {
        info!(device = %self.config.device_id, "Controller starting");
        for command in self.commands.both() {
            self.drive.drive(&command);
        }
        self.next_telemetry_ms = now_ms;
        self.led.notify(LedEvent::Startup);
    }

    /// One loop iteration.
    pub fn poll(&mut self, now_ms: u64) {
        for frame in self.link.poll_frames() {
            match frame {
                Frame::Control(command) => {
                    debug!(?command, "Applying control command");
                    self.commands.apply(command);
                    self.drive.drive(&command);
                }
                reply @ Frame::Reply(_) => self.host.send(&reply),
                other => debug!(tag = %other.tag(), "Ignoring frame from communicator"),
            }
        }

        for frame in self.host.poll_frames() {
            match frame {
                wifi @ Frame::Wifi(_) => {
                    info!("Forwarding provisioning data to communicator");
                    self.link.send(&wifi);
                }
                other => debug!(tag = %other.tag(), "Ignoring frame from host"),
            }
        }

        if now_ms >= self.next_telemetry_ms {
            let sample = sample_sensors(self.sensors.as_mut());
            self.link.send(&Frame::Sensor(sample));
            self.next_telemetry_ms = now_ms + self.config.telemetry_period_ms;
        }
    }

    pub fn commands(&self) -> &DriveCommands {
        &self.commands
    }
}

/// Read every sensor once. Missing readings stay at the sentinel.
fn sample_sensors(sensors: &mut dyn SensorSuite) -> SensorFrame {
    let mut frame = SensorFrame::default();
    if let Some(imu) = sensors.read_imu() {
        [frame.ax, frame.ay, frame.az] = imu.accel;
        [frame.gx, frame.gy, frame.gz] = imu.gyro;
        frame.t = imu.temperature;
    }
    [frame.d_left, frame.d_front, frame.d_right, frame.d_back] = sensors
        .read_distances()
        .map(|distance| distance.map_or(SENTINEL, i32::from));
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::ImuSample;
    use crate::testing::{FakeDrive, FakeLed, FakeLink, FakeSensors};
    use dickerbot_protocol::{ControlCommand, Direction, Wheel};
    use pretty_assertions::assert_eq;

    struct Rig {
        node: ControllerNode,
        link: FakeLink,
        host: FakeLink,
        drive: FakeDrive,
        sensors: FakeSensors,
        led: FakeLed,
    }

    fn rig() -> Rig {
        let link = FakeLink::new();
        let host = FakeLink::new();
        let drive = FakeDrive::default();
        let sensors = FakeSensors::default();
        let led = FakeLed::default();
        let node = ControllerNode::new(
            NodeConfig::default(),
            ControllerIo {
                link: Box::new(link.clone()),
                host: Box::new(host.clone()),
                drive: Box::new(drive.clone()),
                sensors: Box::new(sensors.clone()),
                led: Box::new(led.clone()),
            },
        );
        Rig {
            node,
            link,
            host,
            drive,
            sensors,
            led,
        }
    }

    #[test]
    fn test_begin_drives_neutral() {
        let mut rig = rig();
        rig.node.begin(0);
        assert_eq!(
            rig.drive.commands(),
            vec![
                ControlCommand::neutral(Wheel::Left),
                ControlCommand::neutral(Wheel::Right)
            ]
        );
        assert_eq!(rig.led.events(), vec![LedEvent::Startup]);
    }

    #[test]
    fn test_control_frame_drives_wheel() {
        let mut rig = rig();
        rig.node.begin(0);
        rig.link.inject(b"CD,0,128,1;");
        rig.node.poll(0);

        let expected = ControlCommand::new(Wheel::Left, 128, Direction::Forward);
        assert_eq!(rig.node.commands().get(Wheel::Left), &expected);
        assert_eq!(rig.drive.commands().last(), Some(&expected));
    }

    #[test]
    fn test_malformed_control_frame_changes_nothing() {
        let mut rig = rig();
        rig.node.begin(0);
        rig.link.inject(b"CD,0,128;CD,0,128,1,7;CD,0,300,1;");
        rig.node.poll(0);

        assert!(rig.node.commands().is_safe());
        assert_eq!(rig.drive.commands().len(), 2);
    }

    #[test]
    fn test_telemetry_period_and_sentinels() {
        let mut rig = rig();
        rig.node.begin(1_000);
        rig.sensors.set(None, [Some(10), None, Some(30), None]);

        rig.node.poll(1_000);
        assert_eq!(
            rig.link.take_written(),
            "SD,999,999,999,999,999,999,999,10,999,30,999;"
        );

        rig.node.poll(1_050);
        assert_eq!(rig.link.take_written(), "");

        rig.sensors.set(
            Some(ImuSample {
                accel: [1.0, 2.0, 3.0],
                gyro: [0.1, 0.2, 0.3],
                temperature: 25.5,
            }),
            [Some(10), Some(20), Some(30), Some(40)],
        );
        rig.node.poll(1_100);
        assert_eq!(
            rig.link.take_written(),
            "SD,1,2,3,0.1,0.2,0.3,25.5,10,20,30,40;"
        );
    }

    #[test]
    fn test_provisioning_relay() {
        let mut rig = rig();
        rig.node.begin(0);
        rig.link.take_written();

        rig.host.inject(b"WD,myssid,mypass,192.168.1.5,8080;\n");
        rig.node.poll(10);
        assert!(rig
            .link
            .take_written()
            .starts_with("WD,myssid,mypass,192.168.1.5,8080;"));

        rig.link.inject(b"RD,24:6F:28:AA:BB:CC;");
        rig.node.poll(20);
        assert_eq!(rig.host.take_written(), "RD,24:6F:28:AA:BB:CC;");
    }
}
