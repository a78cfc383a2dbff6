//! Outbound framing and chunked writes.

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::DEFAULT_MTU;
use crate::error::{ChunkerError, ChunkerResult, ProtocolError, ProtocolResult};
use crate::framing::{encode_json, split_chunks};
use crate::transport::ChunkTransport;

/// What a completed send put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    /// Header plus payload length.
    pub frame_len: usize,
    /// Number of chunk writes issued.
    pub chunks: usize,
}

/// Frames messages and writes them in MTU-sized chunks.
///
/// Each chunk write is awaited before the next one is issued, and a whole
/// frame is written under a lock so two concurrent sends never interleave
/// their chunks.
#[derive(Debug)]
pub struct OutboundChunker<T> {
    transport: T,
    mtu: usize,
    write_lock: Mutex<()>,
}

impl<T: ChunkTransport> OutboundChunker<T> {
    /// Creates a chunker writing pieces of at most `mtu` bytes.
    pub fn new(transport: T, mtu: usize) -> ProtocolResult<Self> {
        if mtu == 0 {
            return Err(ProtocolError::InvalidMtu(mtu));
        }
        Ok(Self {
            transport,
            mtu,
            write_lock: Mutex::new(()),
        })
    }

    /// Creates a chunker using [`DEFAULT_MTU`].
    pub fn with_default_mtu(transport: T) -> Self {
        Self {
            transport,
            mtu: DEFAULT_MTU,
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the chunk size.
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Serializes `message` to JSON, frames it and writes it.
    ///
    /// Framing errors are returned before anything is written. A failed
    /// chunk write aborts the send; the caller may retry the whole message.
    pub async fn send<M: Serialize + ?Sized>(&self, message: &M) -> ChunkerResult<SendReport> {
        let frame = encode_json(message)?;
        self.send_frame(frame).await
    }

    /// Writes an already encoded frame.
    pub async fn send_frame(&self, frame: Bytes) -> ChunkerResult<SendReport> {
        let frame_len = frame.len();
        let chunks = split_chunks(&frame, self.mtu)?;
        let total = chunks.len();

        let _guard = self.write_lock.lock().await;
        debug!(frame_len, chunks = total, mtu = self.mtu, "sending frame");

        for (index, chunk) in chunks.into_iter().enumerate() {
            if let Err(source) = self.transport.write_chunk(chunk).await {
                warn!(chunk = index, total, error = %source, "chunk write failed");
                return Err(ChunkerError::SendFailed {
                    chunk: index,
                    source,
                });
            }
        }

        Ok(SendReport {
            frame_len,
            chunks: total,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::error::TransportError;
    use crate::{ChannelTransport, Command, Reassembler, TransportResult};

    /// Records writes and fails the n-th one.
    struct FlakyTransport {
        writes: std::sync::Mutex<Vec<Bytes>>,
        fail_at: usize,
        attempts: AtomicUsize,
    }

    impl FlakyTransport {
        fn failing_at(fail_at: usize) -> Self {
            Self {
                writes: std::sync::Mutex::new(Vec::new()),
                fail_at,
                attempts: AtomicUsize::new(0),
            }
        }
    }

    impl ChunkTransport for FlakyTransport {
        async fn write_chunk(&self, chunk: Bytes) -> TransportResult<()> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt == self.fail_at {
                return Err(TransportError::rejected("GATT busy"));
            }
            self.writes.lock().unwrap().push(chunk);
            Ok(())
        }
    }

    #[tokio::test]
    async fn small_message_is_one_chunk() {
        let (transport, mut rx) = ChannelTransport::pair(8);
        let chunker = OutboundChunker::with_default_mtu(transport);

        let report = chunker.send(&Command::GetConfig).await.unwrap();
        assert_eq!(report, SendReport { frame_len: 23, chunks: 1 });

        let chunk = rx.recv().await.unwrap();
        assert_eq!(&chunk[..3], &[0x00, 20, 0x00]);
    }

    #[tokio::test]
    async fn large_message_is_split_and_reassembles() {
        let (transport, mut rx) = ChannelTransport::pair(64);
        let chunker = OutboundChunker::new(transport, 20).unwrap();
        let message = json!({"cmd": "save_config", "config": {"ssid": "a".repeat(300)}});

        let report = chunker.send(&message).await.unwrap();
        assert!(report.chunks > 1);
        drop(chunker);

        let mut reassembler = Reassembler::new();
        let mut frames = Vec::new();
        let mut sizes = Vec::new();
        while let Some(chunk) = rx.recv().await {
            sizes.push(chunk.len());
            frames.extend(reassembler.push(&chunk));
        }

        assert_eq!(sizes.len(), report.chunks);
        assert!(sizes.iter().all(|&len| len <= 20));
        assert_eq!(sizes.iter().sum::<usize>(), report.frame_len);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].decode_json::<serde_json::Value>().unwrap(), message);
    }

    #[tokio::test]
    async fn oversized_message_writes_nothing() {
        let transport = FlakyTransport::failing_at(usize::MAX);
        let chunker = OutboundChunker::new(transport, 100).unwrap();
        let message = json!({"blob": "x".repeat(6000)});

        let result = chunker.send(&message).await;
        assert!(matches!(
            result,
            Err(ChunkerError::Protocol(ProtocolError::PayloadTooLarge { .. }))
        ));
        assert!(chunker.transport().writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_write_aborts_remaining_chunks() {
        let transport = FlakyTransport::failing_at(2);
        let chunker = OutboundChunker::new(transport, 10).unwrap();
        let message = json!({"data": "y".repeat(100)});

        let result = chunker.send(&message).await;
        assert!(matches!(
            result,
            Err(ChunkerError::SendFailed { chunk: 2, .. })
        ));
        assert_eq!(chunker.transport().writes.lock().unwrap().len(), 2);
        assert_eq!(chunker.transport().attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn zero_mtu_is_rejected() {
        let (transport, _rx) = ChannelTransport::pair(1);
        assert!(matches!(
            OutboundChunker::new(transport, 0),
            Err(ProtocolError::InvalidMtu(0))
        ));
    }

    #[tokio::test]
    async fn concurrent_sends_do_not_interleave() {
        let (tx, mut rx) = mpsc::channel(1);
        let chunker = Arc::new(OutboundChunker::new(ChannelTransport::new(tx), 4).unwrap());

        let first = {
            let chunker = Arc::clone(&chunker);
            tokio::spawn(async move { chunker.send(&json!({"n": "first"})).await })
        };
        let second = {
            let chunker = Arc::clone(&chunker);
            tokio::spawn(async move { chunker.send(&json!({"n": "second"})).await })
        };

        let collector = tokio::spawn(async move {
            let mut reassembler = Reassembler::new();
            let mut frames = Vec::new();
            while let Some(chunk) = rx.recv().await {
                frames.extend(reassembler.push(&chunk));
            }
            (frames, reassembler.stats())
        });

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();
        drop(chunker);

        let (frames, stats) = collector.await.unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(stats.resyncs, 0);
    }
}
