//! Frame plumbing shared by both nodes.
//!
//! [`LinkChannel`] owns a byte link and its stream decoder: it drains the
//! link without blocking, hands out complete frames and encodes outbound
//! ones. Malformed frames are logged and discarded here, so node code
//! only ever sees fully valid frames.
//!
//! Per-node dispatch lives in [`crate::node`].

use dickerbot_protocol::{decode_message, encode, Frame, FrameError, LinkDecoder};
use tracing::{debug, trace, warn};

use crate::hal::{Link, SessionTransport};

/// Upper bound on link reads per poll so a chattering peer cannot starve
/// the rest of the loop.
const MAX_READS_PER_POLL: usize = 16;

const READ_CHUNK: usize = 64;

/// A framed view of a byte [`Link`].
pub struct LinkChannel<L> {
    port: L,
    decoder: LinkDecoder,
    label: &'static str,
}

impl<L: Link> LinkChannel<L> {
    /// Wrap `port`. `label` names the link in log output.
    pub fn new(port: L, label: &'static str, capacity: usize) -> Self {
        Self {
            port,
            decoder: LinkDecoder::with_capacity(capacity),
            label,
        }
    }

    /// Read whatever is pending and return every complete, valid frame.
    pub fn poll_frames(&mut self) -> Vec<Frame> {
        let mut buf = [0u8; READ_CHUNK];
        for _ in 0..MAX_READS_PER_POLL {
            let n = self.port.read(&mut buf);
            if n == 0 {
                break;
            }
            self.decoder.push(&buf[..n]);
        }

        let mut frames = Vec::new();
        while let Some(result) = self.decoder.next_frame() {
            match result {
                Ok(frame) => {
                    trace!(link = self.label, tag = %frame.tag(), "frame received");
                    frames.push(frame);
                }
                Err(e) => warn!(link = self.label, "Discarding frame: {}", e),
            }
        }
        frames
    }

    /// Encode and write one frame.
    pub fn send(&mut self, frame: &Frame) {
        let text = encode(frame);
        trace!(link = self.label, "sending {}", text);
        self.port.write(text.as_bytes());
    }

    pub fn port(&self) -> &L {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut L {
        &mut self.port
    }
}

/// Encode a frame and send it as one session text message.
pub fn send_to_session<T: SessionTransport + ?Sized>(session: &mut T, frame: &Frame) {
    session.send_text(&encode(frame));
}

/// Decode a session text message, logging and discarding anything invalid.
pub fn decode_session_text(text: &str) -> Option<Frame> {
    match decode_message(text) {
        Ok(frame) => Some(frame),
        Err(FrameError::UnknownTag(_)) => {
            debug!("Dropping unroutable session message");
            None
        }
        Err(e) => {
            warn!("Discarding session message: {}", e);
            None
        }
    }
}
