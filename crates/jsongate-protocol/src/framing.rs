//! Whole-frame encoding and chunk splitting.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{ProtocolError, ProtocolResult};
use crate::header::FrameHeader;
use crate::{FRAME_TYPE_JSON, HEADER_SIZE, MAX_PAYLOAD_SIZE};

/// A complete frame as emitted by the reassembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    frame_type: u8,
    payload: Bytes,
}

impl Frame {
    /// Creates a frame from its parts.
    pub fn new(frame_type: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            frame_type,
            payload: payload.into(),
        }
    }

    /// Returns the frame type.
    pub fn frame_type(&self) -> u8 {
        self.frame_type
    }

    /// Returns true if the payload is JSON text.
    pub fn is_json(&self) -> bool {
        self.frame_type == FRAME_TYPE_JSON
    }

    /// Returns the raw payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Decodes the payload as UTF-8 JSON.
    pub fn decode_json<T: DeserializeOwned>(&self) -> ProtocolResult<T> {
        if !self.is_json() {
            return Err(ProtocolError::NotJson(self.frame_type));
        }
        let text = std::str::from_utf8(&self.payload)?;
        Ok(serde_json::from_str(text)?)
    }
}

/// Encodes a frame: header followed by `payload`.
///
/// Fails if the payload is empty or longer than [`MAX_PAYLOAD_SIZE`], the
/// same window a receiver accepts.
pub fn encode_frame(frame_type: u8, payload: &[u8]) -> ProtocolResult<Bytes> {
    if payload.is_empty() {
        return Err(ProtocolError::EmptyPayload);
    }
    let length = u16::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_PAYLOAD_SIZE)
        .ok_or(ProtocolError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE as usize,
        })?;

    let mut buffer = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    buffer.put_slice(&FrameHeader::new(frame_type, length).encode());
    buffer.put_slice(payload);
    Ok(buffer.freeze())
}

/// Serializes `message` to compact JSON and frames it as type `0x00`.
///
/// # Example
///
/// ```rust
/// use jsongate_protocol::{Command, encode_json};
///
/// let bytes = encode_json(&Command::GetConfig).unwrap();
/// assert_eq!(&bytes[..3], &[0x00, 20, 0x00]);
/// assert_eq!(&bytes[3..], br#"{"cmd":"get_config"}"#);
/// ```
pub fn encode_json<T: Serialize + ?Sized>(message: &T) -> ProtocolResult<Bytes> {
    let json = serde_json::to_vec(message)?;
    encode_frame(FRAME_TYPE_JSON, &json)
}

/// Splits an encoded frame into pieces of at most `mtu` bytes, in order.
///
/// The pieces share the frame's buffer.
pub fn split_chunks(frame: &Bytes, mtu: usize) -> ProtocolResult<Vec<Bytes>> {
    if mtu == 0 {
        return Err(ProtocolError::InvalidMtu(mtu));
    }
    Ok((0..frame.len())
        .step_by(mtu)
        .map(|start| frame.slice(start..(start + mtu).min(frame.len())))
        .collect())
}
