//! # dickerbot-protocol
//!
//! Frame types and codec for the DickerBot link.
//!
//! Both nodes (Controller and Communicator) and the operator session speak
//! the same ASCII format: a 2-character tag, a comma, comma-separated
//! positional fields and a `;` terminator.
//!
//! This crate is runtime-agnostic and performs no I/O.

pub mod codec;
pub mod frame;

pub use codec::{decode, decode_message, encode, FrameError, LinkDecoder};
pub use frame::*;
