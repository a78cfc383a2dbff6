//! Frame header codec.
//!
//! ```text
//! +--------+----------+----------+------------------+
//! | type   | len lo   | len hi   |  payload (len)   |
//! +--------+----------+----------+------------------+
//! ```
//!
//! Encoding and decoding are plain bit transforms. Whether a header is
//! acceptable is decided by [`FrameHeader::is_acceptable`], which the
//! reassembler consults before committing to a payload.

use crate::{FRAME_TYPE_JSON, HEADER_SIZE, MAX_PAYLOAD_SIZE};

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload kind.
    pub frame_type: u8,
    /// Payload length in bytes.
    pub length: u16,
}

impl FrameHeader {
    /// Creates a header.
    pub const fn new(frame_type: u8, length: u16) -> Self {
        Self { frame_type, length }
    }

    /// Creates a header for a JSON payload of `length` bytes.
    pub const fn json(length: u16) -> Self {
        Self::new(FRAME_TYPE_JSON, length)
    }

    /// Encodes the header as `[type, len & 0xFF, len >> 8]`.
    pub const fn encode(&self) -> [u8; HEADER_SIZE] {
        let [lo, hi] = self.length.to_le_bytes();
        [self.frame_type, lo, hi]
    }

    /// Decodes a header; the inverse of [`encode`](Self::encode).
    pub const fn decode(bytes: &[u8; HEADER_SIZE]) -> Self {
        Self {
            frame_type: bytes[0],
            length: u16::from_le_bytes([bytes[1], bytes[2]]),
        }
    }

    /// Returns true if a receiver should trust this header.
    ///
    /// Only JSON frames with a length in `1..=MAX_PAYLOAD_SIZE` qualify.
    pub const fn is_acceptable(&self) -> bool {
        self.frame_type == FRAME_TYPE_JSON && self.length >= 1 && self.length <= MAX_PAYLOAD_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_is_little_endian() {
        assert_eq!(FrameHeader::json(20).encode(), [0x00, 0x14, 0x00]);
        assert_eq!(FrameHeader::json(5000).encode(), [0x00, 0x88, 0x13]);
        assert_eq!(FrameHeader::new(0x02, 0x0102).encode(), [0x02, 0x02, 0x01]);
    }

    #[test]
    fn decode_inverts_encode() {
        for header in [
            FrameHeader::json(1),
            FrameHeader::json(256),
            FrameHeader::new(0xff, u16::MAX),
        ] {
            assert_eq!(FrameHeader::decode(&header.encode()), header);
        }
    }

    #[test]
    fn acceptance_window() {
        assert!(FrameHeader::json(1).is_acceptable());
        assert!(FrameHeader::json(MAX_PAYLOAD_SIZE).is_acceptable());
        assert!(!FrameHeader::json(0).is_acceptable());
        assert!(!FrameHeader::json(MAX_PAYLOAD_SIZE + 1).is_acceptable());
        assert!(!FrameHeader::new(0x01, 10).is_acceptable());
    }
}
