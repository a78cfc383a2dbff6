//! Protocol error types.

use thiserror::Error;

/// Result type for framing operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Result type for transport writes.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for outbound sends.
pub type ChunkerResult<T> = Result<T, ChunkerError>;

/// Errors raised while encoding or decoding a single frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload exceeds the frame length window.
    #[error("payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Zero-length payloads cannot be framed.
    #[error("empty payload")]
    EmptyPayload,

    /// Failed to serialize or parse JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON frame payload is not valid UTF-8.
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Frame was expected to carry JSON but has another type.
    #[error("frame type {0:#04x} does not carry JSON")]
    NotJson(u8),

    /// Chunk size must be at least one byte.
    #[error("invalid MTU: {0}")]
    InvalidMtu(usize),
}

/// Errors reported by a chunk transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer went away; no further writes are possible.
    #[error("transport disconnected")]
    Disconnected,

    /// The write was rejected by the underlying stack.
    #[error("write rejected: {0}")]
    Rejected(String),

    /// IO error from the underlying stack.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Creates a rejected-write error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

/// Errors raised by [`crate::OutboundChunker`].
#[derive(Debug, Error)]
pub enum ChunkerError {
    /// The message could not be framed; nothing was written.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A chunk write failed; the remaining chunks were not written.
    #[error("send failed at chunk {chunk}: {source}")]
    SendFailed {
        chunk: usize,
        #[source]
        source: TransportError,
    },
}
