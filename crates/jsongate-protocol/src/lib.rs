//! Chunked, length-delimited JSON framing for notification links.
//!
//! This crate defines the wire protocol spoken between a host and a device
//! over an MTU-constrained characteristic that delivers data as
//! notifications of arbitrary size.
//!
//! # Protocol Overview
//!
//! Every message travels as one frame:
//! - 1 byte: frame type (`0x00` = UTF-8 JSON, other values reserved)
//! - 2 bytes: payload length (u16, little-endian, `1..=5000`)
//! - N bytes: payload
//!
//! The sender splits a frame into chunks of at most `mtu` bytes and writes
//! them one by one. The receiver feeds every notification into a
//! [`Reassembler`], which buffers partial data, emits complete frames and
//! resynchronises on the next `0x00` byte when it meets a corrupt header.
//!
//! # Example
//!
//! ```rust
//! use jsongate_protocol::{Command, Reassembler, encode_json, split_chunks};
//!
//! let frame = encode_json(&Command::GetConfig).unwrap();
//! let mut reassembler = Reassembler::new();
//!
//! let mut frames = Vec::new();
//! for chunk in split_chunks(&frame, 7).unwrap() {
//!     frames.extend(reassembler.push(&chunk));
//! }
//!
//! let command: Command = frames[0].decode_json().unwrap();
//! assert_eq!(command, Command::GetConfig);
//! ```

mod chunker;
mod command;
mod error;
mod framing;
mod header;
mod reassembler;
mod transport;

pub use chunker::{OutboundChunker, SendReport};
pub use command::{CMD_FIELD, Command};
pub use error::{
    ChunkerError, ChunkerResult, ProtocolError, ProtocolResult, TransportError, TransportResult,
};
pub use framing::{Frame, encode_frame, encode_json, split_chunks};
pub use header::FrameHeader;
pub use reassembler::{ReassemblyStats, Reassembler};
pub use transport::{ChannelTransport, ChunkTransport};

/// Size of the frame header in bytes.
pub const HEADER_SIZE: usize = 3;

/// Frame type carrying a UTF-8 JSON payload.
pub const FRAME_TYPE_JSON: u8 = 0x00;

/// Largest payload a frame may carry, in bytes.
pub const MAX_PAYLOAD_SIZE: u16 = 5000;

/// Default transport write size, small enough for reliable delivery.
pub const DEFAULT_MTU: usize = 100;
