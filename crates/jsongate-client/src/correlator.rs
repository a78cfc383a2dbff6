//! Single-slot request/response correlation.
//!
//! At most one query is outstanding per link. The pending entry holds a
//! predicate and a oneshot sender; whichever path takes the entry out of the
//! slot first (the router offering a matching reply, the timeout, a reset)
//! decides the outcome. The slot lock is never held across an `.await`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use jsongate_protocol::{
    ChunkTransport, ChunkerError, Command, OutboundChunker, TransportError, encode_json,
};

use crate::error::{ClientError, ClientResult};

/// Predicate deciding whether an inbound command answers the pending query.
pub type MatchPredicate = Box<dyn Fn(&Command) -> bool + Send + Sync>;

/// How a query ended.
#[derive(Debug)]
pub enum QueryOutcome {
    /// A matching reply arrived before the deadline.
    Matched(Command),
    /// No matching reply in time. Callers carry on with what they have.
    TimedOut,
    /// The request could not be written; the slot was cleared.
    SendFailed {
        /// Index of the chunk whose write failed.
        chunk: usize,
        /// The transport's error.
        source: TransportError,
    },
    /// The pending query was dropped by a connection reset.
    Cancelled,
}

impl QueryOutcome {
    /// Returns the matched command, if any.
    pub fn into_matched(self) -> Option<Command> {
        match self {
            Self::Matched(command) => Some(command),
            _ => None,
        }
    }

    /// Returns true for [`QueryOutcome::TimedOut`].
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

struct Pending {
    id: u64,
    predicate: MatchPredicate,
    tx: oneshot::Sender<Command>,
}

/// Owns the single in-flight request slot.
#[derive(Default)]
pub struct RequestCorrelator {
    slot: Mutex<Option<Pending>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for RequestCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCorrelator")
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl RequestCorrelator {
    /// Creates an empty correlator.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Pending>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true while a query is waiting for its reply.
    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }

    /// Offers an inbound command to the pending query.
    ///
    /// Returns true if the command matched and resolved the query.
    pub fn offer(&self, command: &Command) -> bool {
        let mut slot = self.lock();
        let matches = slot
            .as_ref()
            .is_some_and(|pending| (pending.predicate)(command));
        if !matches {
            return false;
        }
        let Some(pending) = slot.take() else {
            return false;
        };
        // Sent under the lock so a timeout that finds the slot empty can
        // always observe the value.
        let delivered = pending.tx.send(command.clone()).is_ok();
        debug!(id = pending.id, cmd = ?command.name(), delivered, "pending query resolved");
        delivered
    }

    /// Drops the pending query, if any. Its caller sees
    /// [`QueryOutcome::Cancelled`].
    pub fn cancel(&self) -> bool {
        let mut slot = self.lock();
        match slot.take() {
            Some(pending) => {
                debug!(id = pending.id, "pending query cancelled");
                drop(pending);
                true
            }
            None => false,
        }
    }

    /// Sends `message` and waits for the first inbound command accepted by
    /// `predicate`, or until `timeout` elapses. The timeout also bounds
    /// writing the request.
    ///
    /// Fails with [`ClientError::AlreadyPending`] while another query is
    /// outstanding, and with a protocol error if the message cannot be
    /// framed. In both cases nothing is written and the slot is untouched.
    pub async fn query<T, M, P>(
        &self,
        chunker: &OutboundChunker<T>,
        message: &M,
        predicate: P,
        timeout: Duration,
    ) -> ClientResult<QueryOutcome>
    where
        T: ChunkTransport,
        M: Serialize + ?Sized,
        P: Fn(&Command) -> bool + Send + Sync + 'static,
    {
        let frame = encode_json(message)?;
        let (id, mut rx) = self.arm(Box::new(predicate))?;
        let _guard = SlotGuard {
            correlator: self,
            id,
        };
        let deadline = Instant::now() + timeout;

        // The deadline covers the write as well as the reply.
        let exchange = async {
            chunker.send_frame(frame).await?;
            Ok::<_, ChunkerError>((&mut rx).await)
        };

        let result = tokio::time::timeout_at(deadline, exchange).await;
        match result {
            Ok(Ok(Ok(command))) => Ok(QueryOutcome::Matched(command)),
            Ok(Ok(Err(_))) => Ok(QueryOutcome::Cancelled),
            Ok(Err(ChunkerError::SendFailed { chunk, source })) => {
                warn!(id, chunk, error = %source, "query request not sent");
                self.clear(id);
                Ok(QueryOutcome::SendFailed { chunk, source })
            }
            Ok(Err(ChunkerError::Protocol(err))) => {
                self.clear(id);
                Err(err.into())
            }
            Err(_) => {
                if self.clear(id) {
                    debug!(id, ?timeout, "query timed out");
                    return Ok(QueryOutcome::TimedOut);
                }
                // The slot was taken between the deadline and the lock.
                match rx.try_recv() {
                    Ok(command) => Ok(QueryOutcome::Matched(command)),
                    Err(_) => Ok(QueryOutcome::Cancelled),
                }
            }
        }
    }

    fn arm(&self, predicate: MatchPredicate) -> ClientResult<(u64, oneshot::Receiver<Command>)> {
        let mut slot = self.lock();
        if slot.is_some() {
            return Err(ClientError::AlreadyPending);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        *slot = Some(Pending { id, predicate, tx });
        debug!(id, "query armed");
        Ok((id, rx))
    }

    /// Clears the slot if it still holds query `id`.
    fn clear(&self, id: u64) -> bool {
        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|pending| pending.id == id) {
            slot.take();
            true
        } else {
            false
        }
    }
}

/// Frees the slot when a query future is dropped before completing.
struct SlotGuard<'a> {
    correlator: &'a RequestCorrelator,
    id: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.correlator.clear(self.id);
    }
}
