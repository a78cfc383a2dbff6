//! Chunk transport abstraction.
//!
//! A transport accepts one write of at most MTU bytes at a time. Physical
//! links (a BLE characteristic, a serial port) live outside this crate;
//! [`ChannelTransport`] connects two endpoints in-process.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{TransportError, TransportResult};

/// Sink for outbound chunks.
///
/// `write_chunk` must resolve only once the chunk has been handed to the
/// link; callers rely on that to sequence writes.
pub trait ChunkTransport: Send + Sync {
    /// Writes one chunk.
    fn write_chunk(&self, chunk: Bytes) -> impl Future<Output = TransportResult<()>> + Send;
}

impl<T: ChunkTransport> ChunkTransport for Arc<T> {
    fn write_chunk(&self, chunk: Bytes) -> impl Future<Output = TransportResult<()>> + Send {
        (**self).write_chunk(chunk)
    }
}

/// Transport that forwards every chunk into a bounded channel.
///
/// The receiving half plays the role of the peer's notification stream.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelTransport {
    /// Wraps an existing sender.
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx }
    }

    /// Creates a transport and the receiver its chunks arrive on.
    pub fn pair(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Returns true once the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl ChunkTransport for ChannelTransport {
    async fn write_chunk(&self, chunk: Bytes) -> TransportResult<()> {
        self.tx
            .send(chunk)
            .await
            .map_err(|_| TransportError::Disconnected)
    }
}
