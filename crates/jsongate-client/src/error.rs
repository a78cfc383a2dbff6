//! Client error types.

use jsongate_device::DeviceError;
use jsongate_protocol::{ChunkerError, ProtocolError, TransportError};
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Message could not be framed (too large, empty, not serializable).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A chunk write failed; the message was not fully sent.
    #[error("send failed at chunk {chunk}: {source}")]
    SendFailed {
        chunk: usize,
        #[source]
        source: TransportError,
    },

    /// In-process device endpoint error.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// A query is already waiting for its response.
    #[error("a request is already pending")]
    AlreadyPending,

    /// Input could not be parsed (CLI arguments, hex dumps).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A background task ended abnormally.
    #[error("task failed: {0}")]
    Task(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ChunkerError> for ClientError {
    fn from(err: ChunkerError) -> Self {
        match err {
            ChunkerError::Protocol(err) => Self::Protocol(err),
            ChunkerError::SendFailed { chunk, source } => Self::SendFailed { chunk, source },
        }
    }
}

impl ClientError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Returns true if the message exceeded the frame size limit.
    pub fn is_payload_too_large(&self) -> bool {
        matches!(self, Self::Protocol(ProtocolError::PayloadTooLarge { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunker_errors_keep_their_kind() {
        let too_large: ClientError = ChunkerError::Protocol(ProtocolError::PayloadTooLarge {
            size: 6000,
            max: 5000,
        })
        .into();
        assert!(too_large.is_payload_too_large());

        let failed: ClientError = ChunkerError::SendFailed {
            chunk: 3,
            source: TransportError::Disconnected,
        }
        .into();
        assert!(matches!(failed, ClientError::SendFailed { chunk: 3, .. }));
        assert_eq!(
            failed.to_string(),
            "send failed at chunk 3: transport disconnected"
        );
    }
}
