//! Per-node poll loops.
//!
//! A node owns its collaborators and all of its mutable state. The caller
//! runs `begin` once, then `poll` from a cooperative loop with a monotonic
//! millisecond clock.

mod communicator;
mod controller;

pub use communicator::{CommunicatorIo, CommunicatorNode};
pub use controller::{ControllerIo, ControllerNode};
