//! # dickerbot-core
//!
//! Node logic for the two-node DickerBot robot.
//!
//! This crate provides:
//! - Gesture classification of the provisioning button
//! - Credential store contract and provisioning rules
//! - The Communicator connection state machine
//! - Frame routing for the Controller and Communicator nodes
//! - Safe-state enforcement when the operator session drops
//!
//! Everything here is synchronous and runtime-agnostic: a node is a plain
//! struct whose `poll` method is called from a cooperative loop, with all
//! hardware behind the traits in [`hal`]. The same code runs on ESP32
//! (esp-idf) and on a Linux host simulation.

pub mod config;
pub mod connection;
pub mod credentials;
pub mod drive;
pub mod gesture;
pub mod hal;
pub mod node;
pub mod router;
pub mod safety;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{NodeConfig, RetryPolicy};
pub use connection::{ConnectionManager, ConnectionState, Transition};
pub use credentials::{CredentialStore, MemoryCredentialStore, ProvisioningError, StoreError};
pub use drive::DriveCommands;
pub use gesture::{ButtonTracker, GestureEvent};
pub use node::{CommunicatorIo, CommunicatorNode, ControllerIo, ControllerNode};
