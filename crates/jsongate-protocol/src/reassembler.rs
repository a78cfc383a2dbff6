//! Streaming frame reassembly.
//!
//! Notifications arrive in arbitrary sizes: one may carry half a header,
//! another the tail of one frame and two more after it. [`Reassembler`]
//! buffers whatever it is given and hands back every frame completed so far.
//!
//! States:
//! - `AwaitingHeader`: need 3 bytes. A header that is not type `0x00` or has
//!   a length outside `1..=5000` triggers a resync: skip to the next `0x00`
//!   byte after the buffer start, or keep only the last byte if there is none.
//! - `AwaitingPayload`: header accepted, need `length` more bytes.
//!
//! Resync may lose the frame that contained the corruption, but the buffer
//! never holds more than one maximal frame plus the current run of non-zero
//! garbage.

use bytes::{Buf, BytesMut};
use tracing::{debug, warn};

use crate::framing::Frame;
use crate::header::FrameHeader;
use crate::{FRAME_TYPE_JSON, HEADER_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingHeader,
    AwaitingPayload(FrameHeader),
}

/// Diagnostic counters since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblyStats {
    /// Frames emitted.
    pub frames: u64,
    /// Corrupt headers encountered.
    pub resyncs: u64,
    /// Bytes discarded while resynchronising.
    pub skipped_bytes: u64,
}

/// Per-connection reassembly state.
#[derive(Debug)]
pub struct Reassembler {
    buffer: BytesMut,
    state: State,
    stats: ReassemblyStats,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    /// Creates an empty reassembler waiting for a header.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
            state: State::AwaitingHeader,
            stats: ReassemblyStats::default(),
        }
    }

    /// Discards buffered bytes and partial frames.
    ///
    /// Must be called whenever a new connection is established so nothing
    /// from the previous one leaks into it.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = State::AwaitingHeader;
        self.stats = ReassemblyStats::default();
    }

    /// Number of bytes received but not yet part of an emitted frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true while a header has been accepted and its payload is
    /// still incomplete.
    pub fn is_awaiting_payload(&self) -> bool {
        matches!(self.state, State::AwaitingPayload(_))
    }

    /// Returns the diagnostic counters.
    pub fn stats(&self) -> ReassemblyStats {
        self.stats
    }

    /// Consumes one notification and returns every frame it completes.
    ///
    /// Never fails: corrupt headers are skipped and logged.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        if chunk.is_empty() {
            debug!("ignoring empty notification");
            return Vec::new();
        }

        debug!(
            len = chunk.len(),
            buffered = self.buffer.len(),
            "chunk received"
        );
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame() {
            frames.push(frame);
        }
        frames
    }

    fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match self.state {
                State::AwaitingHeader => {
                    if self.buffer.len() < HEADER_SIZE {
                        return None;
                    }

                    let header =
                        FrameHeader::decode(&[self.buffer[0], self.buffer[1], self.buffer[2]]);
                    if !header.is_acceptable() {
                        if self.resync(header) {
                            continue;
                        }
                        return None;
                    }

                    self.buffer.advance(HEADER_SIZE);
                    self.state = State::AwaitingPayload(header);
                    debug!(
                        frame_type = header.frame_type,
                        length = header.length,
                        "header accepted"
                    );
                }
                State::AwaitingPayload(header) => {
                    let length = usize::from(header.length);
                    if self.buffer.len() < length {
                        debug!(
                            have = self.buffer.len(),
                            want = length,
                            "waiting for payload"
                        );
                        return None;
                    }

                    let payload = self.buffer.split_to(length).freeze();
                    self.state = State::AwaitingHeader;
                    self.stats.frames += 1;
                    return Some(Frame::new(header.frame_type, payload));
                }
            }
        }
    }

    /// Drops bytes up to the next candidate header start.
    ///
    /// Returns true if a candidate was found and parsing can continue.
    fn resync(&mut self, header: FrameHeader) -> bool {
        self.stats.resyncs += 1;

        let next_start = self.buffer[1..]
            .iter()
            .position(|&b| b == FRAME_TYPE_JSON)
            .map(|pos| pos + 1);

        let skip = match next_start {
            Some(offset) => offset,
            None => self.buffer.len() - 1,
        };
        self.buffer.advance(skip);
        self.stats.skipped_bytes += skip as u64;

        warn!(
            frame_type = header.frame_type,
            length = header.length,
            skipped = skip,
            found = next_start.is_some(),
            "invalid header, resynchronising"
        );

        next_start.is_some()
    }
}
