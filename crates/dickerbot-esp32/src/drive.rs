//! Two-channel H-bridge on plain GPIO.

use dickerbot_core::hal::DriveTrain;
use dickerbot_protocol::{ControlCommand, Direction, Wheel};
use esp_idf_hal::gpio::{AnyOutputPin, Level, Output, PinDriver};
use log::warn;

/// Enable plus two direction inputs of one bridge channel.
pub struct BridgeChannel<'d> {
    enable: PinDriver<'d, AnyOutputPin, Output>,
    in1: PinDriver<'d, AnyOutputPin, Output>,
    in2: PinDriver<'d, AnyOutputPin, Output>,
    /// The right motor is mounted mirrored, so its forward swaps IN1/IN2.
    mirrored: bool,
}

impl<'d> BridgeChannel<'d> {
    pub fn new(
        enable: AnyOutputPin,
        in1: AnyOutputPin,
        in2: AnyOutputPin,
        mirrored: bool,
    ) -> anyhow::Result<Self> {
        let mut channel = Self {
            enable: PinDriver::output(enable)?,
            in1: PinDriver::output(in1)?,
            in2: PinDriver::output(in2)?,
            mirrored,
        };
        channel.set(0, Direction::Neutral)?;
        Ok(channel)
    }

    fn set(&mut self, speed: u8, direction: Direction) -> anyhow::Result<()> {
        let (in1, in2) = match (direction, self.mirrored) {
            (Direction::Neutral, _) => (Level::Low, Level::Low),
            (Direction::Forward, false) | (Direction::Backward, true) => (Level::Low, Level::High),
            (Direction::Backward, false) | (Direction::Forward, true) => (Level::High, Level::Low),
        };
        self.in1.set_level(in1)?;
        self.in2.set_level(in2)?;
        // The enable line has no PWM on this board: any speed above 0 is full on.
        self.enable.set_level(if speed > 0 { Level::High } else { Level::Low })?;
        Ok(())
    }
}

pub struct HBridgeDrive<'d> {
    left: BridgeChannel<'d>,
    right: BridgeChannel<'d>,
}

impl<'d> HBridgeDrive<'d> {
    pub fn new(left: BridgeChannel<'d>, right: BridgeChannel<'d>) -> Self {
        Self { left, right }
    }
}

impl DriveTrain for HBridgeDrive<'_> {
    fn drive(&mut self, command: &ControlCommand) {
        let channel = match command.wheel {
            Wheel::Left => &mut self.left,
            Wheel::Right => &mut self.right,
        };
        if let Err(e) = channel.set(command.speed, command.direction) {
            warn!("Failed to drive {:?}: {}", command.wheel, e);
        }
    }
}
