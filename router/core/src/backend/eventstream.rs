//! Event Stream Frame Protocol
//!
//! Decoder for the `application/vnd.amazon.eventstream` framing used by
//! streaming Bedrock responses.
//!
//! # Frame Format
//!
//! ```text
//! +-------------+-------------+-------------+----------+---------+-------------+
//! | Total (4)   | Headers (4) | Prelude CRC | Headers  | Payload | Message CRC |
//! | big-endian  | big-endian  | CRC32 (4)   | variable | var.    | CRC32 (4)   |
//! +-------------+-------------+-------------+----------+---------+-------------+
//! ```
//!
//! The prelude CRC covers the first 8 bytes. The message CRC covers everything
//! before it. Header entries are `name_len(1) name type(1) value`.

use bytes::Bytes;
use thiserror::Error;

/// Maximum total frame size (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Maximum header block size (128 KB)
const MAX_HEADERS_SIZE: usize = 128 * 1024;

/// Prelude: total length + headers length + prelude CRC
const PRELUDE_SIZE: usize = 12;

/// Trailing message CRC
const TRAILER_SIZE: usize = 4;

/// Minimum buffer capacity for decoder
const MIN_BUFFER_CAPACITY: usize = 4096;

/// Header value type tag for UTF-8 strings
const HEADER_TYPE_STRING: u8 = 7;

/// Errors from frame decoding
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Prelude checksum did not match
    #[error("prelude checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    PreludeChecksum {
        /// Checksum carried in the frame
        expected: u32,
        /// Checksum computed over the received bytes
        actual: u32,
    },

    /// Message checksum did not match
    #[error("message checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    MessageChecksum {
        /// Checksum carried in the frame
        expected: u32,
        /// Checksum computed over the received bytes
        actual: u32,
    },

    /// Declared lengths are out of bounds or inconsistent
    #[error("invalid frame length: {0}")]
    InvalidLength(String),

    /// A header entry could not be parsed
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

/// A decoded header value
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderValue {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Bytes(Vec<u8>),
    String(String),
    Timestamp(i64),
    Uuid([u8; 16]),
}

/// One decoded frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventMessage {
    pub headers: Vec<(String, HeaderValue)>,
    pub payload: Bytes,
}

impl EventMessage {
    /// Look up a string header
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|(key, value)| match value {
            HeaderValue::String(s) if key == name => Some(s.as_str()),
            _ => None,
        })
    }
}

#[inline]
fn compute_checksum(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

#[inline]
fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Decoder state machine for streaming frame parsing
///
/// Buffers incoming bytes and yields complete messages.
#[derive(Debug)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
    /// Position where we've consumed up to
    read_pos: usize,
}

impl Default for EventStreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStreamDecoder {
    /// Create a new decoder with default buffer capacity
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MIN_BUFFER_CAPACITY),
            read_pos: 0,
        }
    }

    /// Append bytes to the buffer
    pub fn push(&mut self, data: &[u8]) {
        if self.read_pos > self.buffer.len() / 2 && self.read_pos > MIN_BUFFER_CAPACITY {
            self.buffer.drain(..self.read_pos);
            self.read_pos = 0;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Get the number of undecoded bytes in the buffer
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// Try to decode the next frame
    ///
    /// Returns `Ok(None)` if more data is needed.
    ///
    /// # Errors
    ///
    /// Returns a `FrameError` on checksum mismatch, out-of-range lengths, or
    /// malformed headers. The decoder cannot resynchronize after an error.
    pub fn decode(&mut self) -> Result<Option<EventMessage>, FrameError> {
        let available = self.available();
        if available < PRELUDE_SIZE {
            return Ok(None);
        }

        let start = self.read_pos;
        let prelude = &self.buffer[start..start + PRELUDE_SIZE];
        let total_len = read_u32(&prelude[0..4]) as usize;
        let headers_len = read_u32(&prelude[4..8]) as usize;
        let expected_prelude_crc = read_u32(&prelude[8..12]);

        let actual_prelude_crc = compute_checksum(&prelude[0..8]);
        if actual_prelude_crc != expected_prelude_crc {
            return Err(FrameError::PreludeChecksum {
                expected: expected_prelude_crc,
                actual: actual_prelude_crc,
            });
        }

        if total_len > MAX_FRAME_SIZE {
            return Err(FrameError::InvalidLength(format!(
                "frame size {total_len} exceeds maximum {MAX_FRAME_SIZE}"
            )));
        }
        if headers_len > MAX_HEADERS_SIZE
            || total_len < PRELUDE_SIZE + headers_len + TRAILER_SIZE
        {
            return Err(FrameError::InvalidLength(format!(
                "headers length {headers_len} does not fit frame of {total_len} bytes"
            )));
        }

        if available < total_len {
            return Ok(None);
        }

        let frame = &self.buffer[start..start + total_len];
        let crc_offset = total_len - TRAILER_SIZE;
        let expected_message_crc = read_u32(&frame[crc_offset..]);
        let actual_message_crc = compute_checksum(&frame[..crc_offset]);
        if actual_message_crc != expected_message_crc {
            return Err(FrameError::MessageChecksum {
                expected: expected_message_crc,
                actual: actual_message_crc,
            });
        }

        let headers_end = PRELUDE_SIZE + headers_len;
        let headers = parse_headers(&frame[PRELUDE_SIZE..headers_end])?;
        let payload = Bytes::copy_from_slice(&frame[headers_end..crc_offset]);

        self.read_pos = start + total_len;

        Ok(Some(EventMessage { headers, payload }))
    }
}

fn take<'a>(block: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8], FrameError> {
    let end = *pos + len;
    let slice = block
        .get(*pos..end)
        .ok_or_else(|| FrameError::InvalidHeader("header block truncated".to_string()))?;
    *pos = end;
    Ok(slice)
}

fn parse_headers(block: &[u8]) -> Result<Vec<(String, HeaderValue)>, FrameError> {
    let mut headers = Vec::new();
    let mut pos = 0;

    while pos < block.len() {
        let name_len = take(block, &mut pos, 1)?[0] as usize;
        let name = std::str::from_utf8(take(block, &mut pos, name_len)?)
            .map_err(|e| FrameError::InvalidHeader(format!("header name: {e}")))?
            .to_string();
        let type_tag = take(block, &mut pos, 1)?[0];

        let value = match type_tag {
            0 => HeaderValue::Bool(true),
            1 => HeaderValue::Bool(false),
            2 => HeaderValue::Byte(i8::from_be_bytes([take(block, &mut pos, 1)?[0]])),
            3 => {
                let b = take(block, &mut pos, 2)?;
                HeaderValue::Short(i16::from_be_bytes([b[0], b[1]]))
            }
            4 => {
                let b = take(block, &mut pos, 4)?;
                HeaderValue::Int(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
            }
            5 | 8 => {
                let b = take(block, &mut pos, 8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(b);
                let v = i64::from_be_bytes(raw);
                if type_tag == 5 {
                    HeaderValue::Long(v)
                } else {
                    HeaderValue::Timestamp(v)
                }
            }
            6 | HEADER_TYPE_STRING => {
                let b = take(block, &mut pos, 2)?;
                let len = u16::from_be_bytes([b[0], b[1]]) as usize;
                let data = take(block, &mut pos, len)?;
                if type_tag == 6 {
                    HeaderValue::Bytes(data.to_vec())
                } else {
                    let s = std::str::from_utf8(data)
                        .map_err(|e| FrameError::InvalidHeader(format!("{name}: {e}")))?;
                    HeaderValue::String(s.to_string())
                }
            }
            9 => {
                let mut raw = [0u8; 16];
                raw.copy_from_slice(take(block, &mut pos, 16)?);
                HeaderValue::Uuid(raw)
            }
            other => {
                return Err(FrameError::InvalidHeader(format!(
                    "{name}: unknown value type {other}"
                )))
            }
        };

        headers.push((name, value));
    }

    Ok(headers)
}

/// Encode a frame with string headers
///
/// Rejects names, values or frames whose lengths do not fit their fields.
#[cfg(test)]
pub(crate) fn encode(headers: &[(&str, &str)], payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut header_block = Vec::new();
    for (name, value) in headers {
        let name_len = u8::try_from(name.len())
            .map_err(|_| FrameError::InvalidLength(format!("header name {} bytes", name.len())))?;
        let value_len = u16::try_from(value.len()).map_err(|_| {
            FrameError::InvalidLength(format!("header {name}: value {} bytes", value.len()))
        })?;
        header_block.push(name_len);
        header_block.extend_from_slice(name.as_bytes());
        header_block.push(HEADER_TYPE_STRING);
        header_block.extend_from_slice(&value_len.to_be_bytes());
        header_block.extend_from_slice(value.as_bytes());
    }

    if header_block.len() > MAX_HEADERS_SIZE {
        return Err(FrameError::InvalidLength(format!(
            "headers {} bytes",
            header_block.len()
        )));
    }
    let total = PRELUDE_SIZE + header_block.len() + payload.len() + TRAILER_SIZE;
    if total > MAX_FRAME_SIZE {
        return Err(FrameError::InvalidLength(format!("frame {total} bytes")));
    }

    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(&u32::try_from(total).unwrap_or(u32::MAX).to_be_bytes());
    buf.extend_from_slice(&u32::try_from(header_block.len()).unwrap_or(u32::MAX).to_be_bytes());
    let prelude_crc = compute_checksum(&buf);
    buf.extend_from_slice(&prelude_crc.to_be_bytes());
    buf.extend_from_slice(&header_block);
    buf.extend_from_slice(payload);
    let message_crc = compute_checksum(&buf);
    buf.extend_from_slice(&message_crc.to_be_bytes());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_frame(payload: &[u8]) -> Vec<u8> {
        encode(
            &[
                (":message-type", "event"),
                (":event-type", "chunk"),
                (":content-type", "application/json"),
            ],
            payload,
        )
        .unwrap()
    }

    #[test]
    fn test_decode_single_frame() {
        let mut decoder = EventStreamDecoder::new();
        decoder.push(&chunk_frame(b"{\"bytes\":\"e30=\"}"));

        let msg = decoder.decode().unwrap().unwrap();
        assert_eq!(msg.header(":message-type"), Some("event"));
        assert_eq!(msg.header(":event-type"), Some("chunk"));
        assert_eq!(msg.header(":missing"), None);
        assert_eq!(&msg.payload[..], b"{\"bytes\":\"e30=\"}");
        assert_eq!(decoder.available(), 0);
        assert!(decoder.decode().unwrap().is_none());
    }

    #[test]
    fn test_frames_split_across_pushes() {
        let mut bytes = chunk_frame(b"first");
        bytes.extend(chunk_frame(b"second"));

        let mut decoder = EventStreamDecoder::new();
        let mut payloads = Vec::new();
        for piece in bytes.chunks(5) {
            decoder.push(piece);
            while let Some(msg) = decoder.decode().unwrap() {
                payloads.push(msg.payload);
            }
        }

        assert_eq!(payloads, vec![Bytes::from_static(b"first"), Bytes::from_static(b"second")]);
    }

    #[test]
    fn test_incomplete_frame_waits() {
        let frame = chunk_frame(b"payload");
        let mut decoder = EventStreamDecoder::new();
        decoder.push(&frame[..frame.len() - 1]);
        assert!(decoder.decode().unwrap().is_none());

        decoder.push(&frame[frame.len() - 1..]);
        assert!(decoder.decode().unwrap().is_some());
    }

    #[test]
    fn test_corrupted_payload_fails_message_checksum() {
        let mut frame = chunk_frame(b"payload");
        let idx = frame.len() - 6;
        frame[idx] ^= 0xff;

        let mut decoder = EventStreamDecoder::new();
        decoder.push(&frame);
        assert!(matches!(
            decoder.decode(),
            Err(FrameError::MessageChecksum { .. })
        ));
    }

    #[test]
    fn test_corrupted_prelude_fails() {
        let mut frame = chunk_frame(b"payload");
        frame[3] ^= 0x01;

        let mut decoder = EventStreamDecoder::new();
        decoder.push(&frame);
        assert!(matches!(
            decoder.decode(),
            Err(FrameError::PreludeChecksum { .. })
        ));
    }

    #[test]
    fn test_encode_rejects_lengths_that_do_not_fit() {
        let long_name = "x".repeat(300);
        assert!(matches!(
            encode(&[(long_name.as_str(), "v")], b"{}"),
            Err(FrameError::InvalidLength(_))
        ));

        let long_value = "v".repeat(usize::from(u16::MAX) + 1);
        assert!(matches!(
            encode(&[("name", long_value.as_str())], b"{}"),
            Err(FrameError::InvalidLength(_))
        ));

        let max_name = "x".repeat(usize::from(u8::MAX));
        let frame = encode(&[(max_name.as_str(), "v")], b"{}").unwrap();
        let mut decoder = EventStreamDecoder::new();
        decoder.push(&frame);
        let msg = decoder.decode().unwrap().unwrap();
        assert_eq!(msg.header(&max_name), Some("v"));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut prelude = Vec::new();
        prelude.extend_from_slice(&((MAX_FRAME_SIZE + 1) as u32).to_be_bytes());
        prelude.extend_from_slice(&0u32.to_be_bytes());
        let crc = crc32fast::hash(&prelude);
        prelude.extend_from_slice(&crc.to_be_bytes());

        let mut decoder = EventStreamDecoder::new();
        decoder.push(&prelude);
        assert!(matches!(decoder.decode(), Err(FrameError::InvalidLength(_))));
    }

    #[test]
    fn test_non_string_headers() {
        let mut block = Vec::new();
        block.push(4);
        block.extend_from_slice(b"flag");
        block.push(0);
        block.push(5);
        block.extend_from_slice(b"count");
        block.push(4);
        block.extend_from_slice(&42i32.to_be_bytes());

        let headers = parse_headers(&block).unwrap();
        assert_eq!(
            headers,
            vec![
                ("flag".to_string(), HeaderValue::Bool(true)),
                ("count".to_string(), HeaderValue::Int(42)),
            ]
        );
    }

    #[test]
    fn test_truncated_header_block() {
        let block = [10u8, b'a', b'b'];
        assert!(matches!(parse_headers(&block), Err(FrameError::InvalidHeader(_))));
    }
}
