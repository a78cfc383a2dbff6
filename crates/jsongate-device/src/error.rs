//! Device error types.

use thiserror::Error;

use jsongate_protocol::{ChunkerError, ProtocolError};

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors that can occur on the device side.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Protocol error (framing, encoding).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A reply could not be written.
    #[error("reply failed: {0}")]
    Reply(#[from] ChunkerError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl DeviceError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if the host side of the link has gone away.
    pub fn is_disconnected(&self) -> bool {
        matches!(
            self,
            Self::Reply(ChunkerError::SendFailed {
                source: jsongate_protocol::TransportError::Disconnected,
                ..
            })
        )
    }
}
