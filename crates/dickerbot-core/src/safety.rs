//! Safe-state enforcement.
//!
//! Invoked exactly on the `Connected -> Disconnected` transition, before
//! the node does anything else. Both wheels are forced to speed 0,
//! direction neutral, and the two `CD` frames (left, then right) are
//! written to the Controller link immediately.

use dickerbot_protocol::{ControlCommand, Frame, Wheel};
use tracing::warn;

use crate::drive::DriveCommands;
use crate::hal::Link;
use crate::router::LinkChannel;

/// Force the drivetrain to the safe state and emit it over the link.
///
/// Returns the commands that were sent.
pub fn enforce_safe_state<L: Link>(
    commands: &mut DriveCommands,
    link: &mut LinkChannel<L>,
) -> [ControlCommand; 2] {
    warn!("Operator session lost, stopping drivetrain");

    let stop = [
        ControlCommand::neutral(Wheel::Left),
        ControlCommand::neutral(Wheel::Right),
    ];
    for command in stop {
        commands.apply(command);
        link.send(&Frame::Control(command));
    }
    stop
}
