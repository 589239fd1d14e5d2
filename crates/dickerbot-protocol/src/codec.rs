//! ASCII frame codec.
//!
//! `encode` renders a [`Frame`] including its `;` terminator. `decode`
//! parses a single frame into typed fields: either the whole frame is
//! valid or an error is returned, never a partially filled value.
//!
//! [`LinkDecoder`] isolates frames from a byte stream that may end in a
//! partial frame, which is what a UART read delivers.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

use crate::frame::{
    ConnectionCredentials, ControlCommand, Direction, Frame, SensorFrame, Tag, Wheel,
    MAX_HOST_LEN, MAX_PASSWORD_LEN, MAX_SSID_LEN, SEPARATOR, TERMINATOR,
};

/// Default capacity of a [`LinkDecoder`] buffer.
pub const DEFAULT_LINK_CAPACITY: usize = 256;

/// Errors that can occur while decoding a frame.
///
/// Every variant means "discard this frame and carry on".
#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    /// The frame bytes are not valid UTF-8 text.
    #[error("Frame is not valid text")]
    NotText,

    /// The frame does not start with a known tag followed by `,`.
    #[error("Unroutable frame: {0:?}")]
    UnknownTag(String),

    /// Wrong number of payload fields for the tag.
    #[error("{tag} frame expects {expected} fields, got {actual}")]
    FieldCountMismatch {
        tag: Tag,
        expected: usize,
        actual: usize,
    },

    /// A field could not be parsed or is out of range.
    #[error("{tag} field {index} is not a valid {kind}: {value:?}")]
    InvalidField {
        tag: Tag,
        index: usize,
        kind: &'static str,
        value: String,
    },

    /// A bounded string field is longer than allowed.
    #[error("{tag} field {index} exceeds {max} bytes")]
    FieldTooLong { tag: Tag, index: usize, max: usize },

    /// The `ID` payload is not valid base64.
    #[error("Image payload is not valid base64")]
    InvalidBase64,

    /// A link buffer filled up without seeing a terminator.
    #[error("Discarded {dropped} bytes without a frame terminator (capacity {capacity})")]
    Overflow { dropped: usize, capacity: usize },
}

// ============================================================================
// Encoding
// ============================================================================

/// Encode a frame for transmission, including the `;` terminator.
pub fn encode(frame: &Frame) -> String {
    let tag = frame.tag();
    let payload = match frame {
        Frame::Sensor(s) => {
            let motion = s.motion().map(|v| v.to_string());
            let distances = s.distances().map(|d| d.to_string());
            let mut fields: Vec<String> = motion.into();
            fields.extend(distances);
            fields.join(",")
        }
        Frame::Control(c) => format!(
            "{},{},{}",
            c.wheel.code(),
            c.speed,
            c.direction.code()
        ),
        Frame::Wifi(w) => format!("{},{},{},{}", w.ssid, w.password, w.host, w.port),
        Frame::Reply(device_id) => device_id.clone(),
        Frame::Image(bytes) => BASE64.encode(bytes),
    };
    format!("{}{}{}{}", tag, SEPARATOR, payload, TERMINATOR)
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode one frame from raw link bytes.
///
/// The bytes may or may not include the trailing `;`. Surrounding ASCII
/// whitespace (line endings from a terminal) is ignored.
pub fn decode(raw: &[u8]) -> Result<Frame, FrameError> {
    let text = std::str::from_utf8(raw).map_err(|_| FrameError::NotText)?;
    decode_message(text)
}

/// Decode one frame from a text message (e.g. a WebSocket text frame).
pub fn decode_message(text: &str) -> Result<Frame, FrameError> {
    let text = text.trim_matches(|c: char| c.is_ascii_whitespace());
    let text = text.strip_suffix(TERMINATOR).unwrap_or(text);

    let (tag, fields) = split_fields(text)?;
    match tag {
        Tag::SensorData => decode_sensor(&fields).map(Frame::Sensor),
        Tag::ControlData => decode_control(&fields).map(Frame::Control),
        Tag::WifiData => decode_wifi(&fields).map(Frame::Wifi),
        Tag::ReplyData => decode_reply(&fields).map(Frame::Reply),
        Tag::ImageData => BASE64
            .decode(fields[0])
            .map(Frame::Image)
            .map_err(|_| FrameError::InvalidBase64),
    }
}

/// Split `TAG,f0,f1,...` into a tag and exactly `tag.field_count()` fields.
fn split_fields(text: &str) -> Result<(Tag, Vec<&str>), FrameError> {
    let unroutable = || FrameError::UnknownTag(text.chars().take(16).collect());

    let (tag_text, payload) = text.split_once(SEPARATOR).ok_or_else(unroutable)?;
    let tag = Tag::from_wire(tag_text).ok_or_else(unroutable)?;

    let fields: Vec<&str> = payload.split(SEPARATOR).collect();
    if fields.len() != tag.field_count() {
        return Err(FrameError::FieldCountMismatch {
            tag,
            expected: tag.field_count(),
            actual: fields.len(),
        });
    }
    Ok((tag, fields))
}

fn invalid(tag: Tag, index: usize, kind: &'static str, value: &str) -> FrameError {
    FrameError::InvalidField {
        tag,
        index,
        kind,
        value: value.to_string(),
    }
}

fn parse_float(tag: Tag, index: usize, value: &str) -> Result<f32, FrameError> {
    match value.parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(invalid(tag, index, "float", value)),
    }
}

fn parse_int(tag: Tag, index: usize, value: &str) -> Result<i64, FrameError> {
    value
        .parse::<i64>()
        .map_err(|_| invalid(tag, index, "integer", value))
}

fn decode_sensor(fields: &[&str]) -> Result<SensorFrame, FrameError> {
    let tag = Tag::SensorData;
    let mut motion = [0f32; 7];
    for (index, slot) in motion.iter_mut().enumerate() {
        *slot = parse_float(tag, index, fields[index])?;
    }
    let mut distances = [0i32; 4];
    for (offset, slot) in distances.iter_mut().enumerate() {
        let index = 7 + offset;
        let value = parse_int(tag, index, fields[index])?;
        *slot = i32::try_from(value).map_err(|_| invalid(tag, index, "distance", fields[index]))?;
    }

    let [ax, ay, az, gx, gy, gz, t] = motion;
    let [d_left, d_front, d_right, d_back] = distances;
    Ok(SensorFrame {
        ax,
        ay,
        az,
        gx,
        gy,
        gz,
        t,
        d_left,
        d_front,
        d_right,
        d_back,
    })
}

fn decode_control(fields: &[&str]) -> Result<ControlCommand, FrameError> {
    let tag = Tag::ControlData;
    let wheel = Wheel::from_code(parse_int(tag, 0, fields[0])?)
        .ok_or_else(|| invalid(tag, 0, "wheel", fields[0]))?;
    let speed = u8::try_from(parse_int(tag, 1, fields[1])?)
        .map_err(|_| invalid(tag, 1, "speed", fields[1]))?;
    let direction = Direction::from_code(parse_int(tag, 2, fields[2])?)
        .ok_or_else(|| invalid(tag, 2, "direction", fields[2]))?;
    Ok(ControlCommand::new(wheel, speed, direction))
}

fn bounded(index: usize, value: &str, max: usize) -> Result<String, FrameError> {
    if value.len() > max {
        return Err(FrameError::FieldTooLong {
            tag: Tag::WifiData,
            index,
            max,
        });
    }
    Ok(value.to_string())
}

fn decode_wifi(fields: &[&str]) -> Result<ConnectionCredentials, FrameError> {
    let ssid = bounded(0, fields[0], MAX_SSID_LEN)?;
    let password = bounded(1, fields[1], MAX_PASSWORD_LEN)?;
    let host = bounded(2, fields[2], MAX_HOST_LEN)?;
    let port = fields[3]
        .parse::<u16>()
        .map_err(|_| invalid(Tag::WifiData, 3, "port", fields[3]))?;
    Ok(ConnectionCredentials {
        ssid,
        password,
        host,
        port,
    })
}

fn decode_reply(fields: &[&str]) -> Result<String, FrameError> {
    if fields[0].is_empty() {
        return Err(invalid(Tag::ReplyData, 0, "device identifier", fields[0]));
    }
    Ok(fields[0].to_string())
}

// ============================================================================
// Stream decoding
// ============================================================================

/// Reassembles frames from an unreliable byte stream.
///
/// Bytes are buffered until a `;` arrives. Empty frames and frames with an
/// unrecognised tag are dropped silently; other malformed frames are
/// reported so the caller can log and discard them.
#[derive(Debug, Clone)]
pub struct LinkDecoder {
    buffer: Vec<u8>,
    capacity: usize,
}

impl Default for LinkDecoder {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LINK_CAPACITY)
    }
}

impl LinkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder that discards its buffer once `capacity` bytes
    /// accumulate without a terminator.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append received bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of bytes waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Take the next complete frame, if any.
    ///
    /// Returns `None` when only a partial frame (or nothing) is buffered.
    pub fn next_frame(&mut self) -> Option<Result<Frame, FrameError>> {
        loop {
            let Some(end) = self.buffer.iter().position(|b| *b == TERMINATOR as u8) else {
                if self.buffer.len() > self.capacity {
                    let dropped = self.buffer.len();
                    self.buffer.clear();
                    return Some(Err(FrameError::Overflow {
                        dropped,
                        capacity: self.capacity,
                    }));
                }
                return None;
            };

            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let body = &raw[..end];
            if body.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match decode(body) {
                Err(FrameError::UnknownTag(_)) => continue,
                result => return Some(result),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_sensor() -> SensorFrame {
        SensorFrame {
            ax: 1.0,
            ay: 2.0,
            az: 3.0,
            gx: 0.1,
            gy: 0.2,
            gz: 0.3,
            t: 25.5,
            d_left: 10,
            d_front: 20,
            d_right: 30,
            d_back: 40,
        }
    }

    #[test]
    fn test_decode_sensor_frame() {
        let frame = decode(b"SD,1.0,2.0,3.0,0.1,0.2,0.3,25.5,10,20,30,40;").unwrap();
        assert_eq!(frame, Frame::Sensor(sample_sensor()));
    }

    #[test]
    fn test_encode_sensor_frame() {
        let encoded = encode(&Frame::Sensor(sample_sensor()));
        assert_eq!(encoded, "SD,1,2,3,0.1,0.2,0.3,25.5,10,20,30,40;");
    }

    #[test]
    fn test_encode_default_sensor_uses_sentinel() {
        let encoded = encode(&Frame::Sensor(SensorFrame::default()));
        assert_eq!(encoded, "SD,999,999,999,999,999,999,999,999,999,999,999;");
    }

    #[test]
    fn test_round_trip_each_tag() {
        let frames = vec![
            Frame::Sensor(SensorFrame {
                ax: -9.81,
                gz: 0.000_123,
                t: 31.25,
                d_back: 0,
                ..SensorFrame::default()
            }),
            Frame::Control(ControlCommand::new(Wheel::Right, 255, Direction::Backward)),
            Frame::Wifi(ConnectionCredentials::new(
                "a".repeat(MAX_SSID_LEN),
                "p".repeat(MAX_PASSWORD_LEN),
                "192.168.100.200",
                65535,
            )),
            Frame::Wifi(ConnectionCredentials::new("open-net", "", "10.0.0.8", 8765)),
            Frame::Reply("24:6F:28:AA:BB:CC".to_string()),
            Frame::Image(vec![0xFF, 0xD8, 0x00, 0x10, 0xFF, 0xD9]),
            Frame::Image(Vec::new()),
        ];

        for frame in frames {
            let encoded = encode(&frame);
            assert!(encoded.starts_with(frame.tag().as_str()));
            assert_eq!(decode(encoded.as_bytes()).unwrap(), frame);
        }
    }

    #[test]
    fn test_decode_control() {
        let frame = decode(b"CD,0,128,1;").unwrap();
        assert_eq!(
            frame,
            Frame::Control(ControlCommand::new(Wheel::Left, 128, Direction::Forward))
        );
    }

    #[test]
    fn test_control_out_of_range_rejected() {
        assert!(matches!(
            decode(b"CD,2,10,1"),
            Err(FrameError::InvalidField { index: 0, .. })
        ));
        assert!(matches!(
            decode(b"CD,0,256,1"),
            Err(FrameError::InvalidField { index: 1, .. })
        ));
        assert!(matches!(
            decode(b"CD,0,-1,1"),
            Err(FrameError::InvalidField { index: 1, .. })
        ));
        assert!(matches!(
            decode(b"CD,0,10,3"),
            Err(FrameError::InvalidField { index: 2, .. })
        ));
    }

    #[test]
    fn test_field_count_mismatch() {
        assert_eq!(
            decode(b"CD,0,128;"),
            Err(FrameError::FieldCountMismatch {
                tag: Tag::ControlData,
                expected: 3,
                actual: 2,
            })
        );
        assert_eq!(
            decode(b"CD,0,128,1,7;"),
            Err(FrameError::FieldCountMismatch {
                tag: Tag::ControlData,
                expected: 3,
                actual: 4,
            })
        );
        assert!(matches!(
            decode(b"SD,1,2,3,4,5,6,7,8,9,10;"),
            Err(FrameError::FieldCountMismatch { actual: 10, .. })
        ));
    }

    #[test]
    fn test_partial_numeric_garbage_is_rejected_whole() {
        // Fields after the bad one are valid, but nothing is returned.
        let result = decode(b"SD,1.0,2.0,x,0.1,0.2,0.3,25.5,10,20,30,40");
        assert!(matches!(
            result,
            Err(FrameError::InvalidField { index: 2, kind: "float", .. })
        ));
        assert!(decode(b"SD,1,2,3,4,5,6,nan,1,2,3,4").is_err());
        assert!(decode(b"SD,1,2,3,4,5,6,7,1,2,3,4.5").is_err());
    }

    #[test]
    fn test_wifi_bounds() {
        let long_ssid = format!("WD,{},pw,10.0.0.1,80", "s".repeat(MAX_SSID_LEN + 1));
        assert_eq!(
            decode(long_ssid.as_bytes()),
            Err(FrameError::FieldTooLong {
                tag: Tag::WifiData,
                index: 0,
                max: MAX_SSID_LEN,
            })
        );

        let long_host = "WD,ssid,pw,192.168.100.2000,80";
        assert!(matches!(
            decode(long_host.as_bytes()),
            Err(FrameError::FieldTooLong { index: 2, .. })
        ));

        assert!(matches!(
            decode(b"WD,ssid,pw,10.0.0.1,port"),
            Err(FrameError::InvalidField { index: 3, .. })
        ));
        assert!(matches!(
            decode(b"WD,ssid,pw,10.0.0.1,70000"),
            Err(FrameError::InvalidField { index: 3, .. })
        ));
    }

    #[test]
    fn test_unknown_tag_and_missing_separator() {
        assert!(matches!(decode(b"XX,1,2"), Err(FrameError::UnknownTag(_))));
        assert!(matches!(decode(b"SD"), Err(FrameError::UnknownTag(_))));
        assert!(matches!(decode(b"S,D,1"), Err(FrameError::UnknownTag(_))));
    }

    #[test]
    fn test_image_payload() {
        assert_eq!(decode(b"ID,AAEC;").unwrap(), Frame::Image(vec![0, 1, 2]));
        assert_eq!(decode(b"ID,!!!;"), Err(FrameError::InvalidBase64));
    }

    #[test]
    fn test_reply_requires_identifier() {
        assert!(decode(b"RD,;").is_err());
        assert_eq!(
            decode(b"RD,24:6F:28:AA:BB:CC;").unwrap(),
            Frame::Reply("24:6F:28:AA:BB:CC".to_string())
        );
    }

    #[test]
    fn test_non_text_rejected() {
        assert_eq!(decode(&[b'C', b'D', b',', 0xFF, 0xFE]), Err(FrameError::NotText));
    }

    #[test]
    fn test_decode_message_accepts_missing_terminator() {
        let with = decode_message("CD,1,50,2;").unwrap();
        let without = decode_message("CD,1,50,2").unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn test_link_decoder_reassembles_split_frames() {
        let mut decoder = LinkDecoder::new();
        decoder.push(b"CD,0,1");
        assert_eq!(decoder.next_frame(), None);
        assert_eq!(decoder.pending(), 6);

        decoder.push(b"28,1;CD,1,");
        assert_eq!(
            decoder.next_frame(),
            Some(Ok(Frame::Control(ControlCommand::new(
                Wheel::Left,
                128,
                Direction::Forward
            ))))
        );
        assert_eq!(decoder.next_frame(), None);

        decoder.push(b"0,0;");
        assert_eq!(
            decoder.next_frame(),
            Some(Ok(Frame::Control(ControlCommand::neutral(Wheel::Right))))
        );
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_link_decoder_skips_noise() {
        let mut decoder = LinkDecoder::new();
        decoder.push(b";;\r\n;ZZ,garbage;\nRD,dev-1;");
        assert_eq!(decoder.next_frame(), Some(Ok(Frame::Reply("dev-1".into()))));
        assert_eq!(decoder.next_frame(), None);
    }

    #[test]
    fn test_link_decoder_reports_malformed_and_continues() {
        let mut decoder = LinkDecoder::new();
        decoder.push(b"CD,0,128;CD,1,10,2;");
        assert!(matches!(
            decoder.next_frame(),
            Some(Err(FrameError::FieldCountMismatch { .. }))
        ));
        assert_eq!(
            decoder.next_frame(),
            Some(Ok(Frame::Control(ControlCommand::new(
                Wheel::Right,
                10,
                Direction::Backward
            ))))
        );
    }

    #[test]
    fn test_link_decoder_overflow() {
        let mut decoder = LinkDecoder::with_capacity(8);
        decoder.push(b"SD,1,2,3,4,5");
        assert_eq!(
            decoder.next_frame(),
            Some(Err(FrameError::Overflow {
                dropped: 12,
                capacity: 8,
            }))
        );
        assert_eq!(decoder.pending(), 0);

        decoder.push(b"RD,x;");
        assert_eq!(decoder.next_frame(), Some(Ok(Frame::Reply("x".into()))));
    }
}
