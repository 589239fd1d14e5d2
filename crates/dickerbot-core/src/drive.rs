//! Drivetrain command state.

use dickerbot_protocol::{ControlCommand, Wheel};

/// The latest command for each wheel. Starts in the safe state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveCommands {
    left: ControlCommand,
    right: ControlCommand,
}

impl Default for DriveCommands {
    fn default() -> Self {
        Self::neutral()
    }
}

impl DriveCommands {
    /// Both wheels at speed 0, direction neutral.
    pub const fn neutral() -> Self {
        Self {
            left: ControlCommand::neutral(Wheel::Left),
            right: ControlCommand::neutral(Wheel::Right),
        }
    }

    pub fn get(&self, wheel: Wheel) -> &ControlCommand {
        match wheel {
            Wheel::Left => &self.left,
            Wheel::Right => &self.right,
        }
    }

    /// Replace the command of the wheel `command` addresses.
    pub fn apply(&mut self, command: ControlCommand) {
        match command.wheel {
            Wheel::Left => self.left = command,
            Wheel::Right => self.right = command,
        }
    }

    /// Left then right.
    pub fn both(&self) -> [ControlCommand; 2] {
        [self.left, self.right]
    }

    pub fn is_safe(&self) -> bool {
        self.left.is_neutral() && self.right.is_neutral()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dickerbot_protocol::Direction;

    #[test]
    fn test_apply_targets_one_wheel() {
        let mut commands = DriveCommands::default();
        assert!(commands.is_safe());

        commands.apply(ControlCommand::new(Wheel::Right, 90, Direction::Backward));
        assert_eq!(commands.get(Wheel::Left), &ControlCommand::neutral(Wheel::Left));
        assert_eq!(commands.get(Wheel::Right).speed, 90);
        assert!(!commands.is_safe());
    }
}
