//! One connection to a device.
//!
//! A [`Link`] is the shared half: the outbound chunker, the request slot and
//! the router. [`Inbound`] owns the reassembler and is the only thing that
//! feeds it. [`Session`] wires both to a transport and a notification
//! stream.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use jsongate_core::DeviceConfig;
use jsongate_protocol::{
    ChunkTransport, Command, Frame, OutboundChunker, ReassemblyStats, Reassembler, SendReport,
};

use crate::config::LinkSettings;
use crate::correlator::{QueryOutcome, RequestCorrelator};
use crate::error::{ClientError, ClientResult};
use crate::router::{MessageRouter, RouteOutcome};

/// Outbound side and routing state of a connection.
#[derive(Debug)]
pub struct Link<T> {
    chunker: OutboundChunker<T>,
    correlator: RequestCorrelator,
    router: MessageRouter,
    query_timeout: Duration,
}

impl<T: ChunkTransport> Link<T> {
    /// Creates a link over `transport`.
    pub fn new(
        transport: T,
        settings: &LinkSettings,
        router: MessageRouter,
    ) -> ClientResult<Self> {
        settings.validate()?;
        Ok(Self {
            chunker: OutboundChunker::new(transport, settings.mtu)?,
            correlator: RequestCorrelator::new(),
            router,
            query_timeout: settings.query_timeout(),
        })
    }

    /// Returns the request correlator.
    pub fn correlator(&self) -> &RequestCorrelator {
        &self.correlator
    }

    /// Returns the outbound chunker.
    pub fn chunker(&self) -> &OutboundChunker<T> {
        &self.chunker
    }

    /// Sends a command without waiting for a reply.
    pub async fn send(&self, command: &Command) -> ClientResult<SendReport> {
        Ok(self.chunker.send(command).await?)
    }

    /// Sends `command` and waits for the first reply accepted by `predicate`.
    pub async fn query<P>(
        &self,
        command: &Command,
        predicate: P,
        timeout: Duration,
    ) -> ClientResult<QueryOutcome>
    where
        P: Fn(&Command) -> bool + Send + Sync + 'static,
    {
        self.correlator
            .query(&self.chunker, command, predicate, timeout)
            .await
    }

    /// Asks the device for its configuration.
    ///
    /// Returns `Ok(None)` when no `config_data` arrives within the query
    /// timeout or the query is cancelled; callers keep whatever they had.
    pub async fn fetch_config(&self) -> ClientResult<Option<Map<String, Value>>> {
        let outcome = self
            .query(
                &Command::GetConfig,
                |reply| matches!(reply, Command::ConfigData { .. }),
                self.query_timeout,
            )
            .await?;

        match outcome {
            QueryOutcome::Matched(Command::ConfigData { fields }) => Ok(Some(fields)),
            QueryOutcome::Matched(other) => {
                warn!(cmd = ?other.name(), "unexpected reply to get_config");
                Ok(None)
            }
            QueryOutcome::TimedOut => {
                warn!(
                    timeout = ?self.query_timeout,
                    "no config_data received, keeping stale data"
                );
                Ok(None)
            }
            QueryOutcome::Cancelled => Ok(None),
            QueryOutcome::SendFailed { chunk, source } => {
                Err(ClientError::SendFailed { chunk, source })
            }
        }
    }

    /// Fetches the configuration and parses it into a [`DeviceConfig`].
    pub async fn fetch_device_config(&self) -> ClientResult<Option<DeviceConfig>> {
        match self.fetch_config().await? {
            Some(fields) => DeviceConfig::from_fields(&fields)
                .map(Some)
                .map_err(|e| ClientError::invalid_input(format!("bad config_data: {}", e))),
            None => Ok(None),
        }
    }

    /// Pushes a configuration to the device.
    ///
    /// The `save_ok` acknowledgement arrives through the router's ack
    /// callback.
    pub async fn save_config(&self, config: &DeviceConfig) -> ClientResult<SendReport> {
        self.send(&Command::save_config(config.to_save_fields())).await
    }

    /// Pushes a configuration and waits for the device's `save_ok`.
    ///
    /// Returns false if no acknowledgement arrived in time.
    pub async fn save_config_confirmed(&self, config: &DeviceConfig) -> ClientResult<bool> {
        let command = Command::save_config(config.to_save_fields());
        let outcome = self
            .query(
                &command,
                |reply| matches!(reply, Command::SaveOk),
                self.query_timeout,
            )
            .await?;

        match outcome {
            QueryOutcome::Matched(_) => Ok(true),
            QueryOutcome::TimedOut | QueryOutcome::Cancelled => Ok(false),
            QueryOutcome::SendFailed { chunk, source } => {
                Err(ClientError::SendFailed { chunk, source })
            }
        }
    }

    fn route(&self, frame: &Frame) -> RouteOutcome {
        self.router.route(frame, &self.correlator)
    }
}

/// Inbound half of a connection: reassembles notifications and routes the
/// frames they complete.
#[derive(Debug)]
pub struct Inbound<T> {
    link: Arc<Link<T>>,
    reassembler: Reassembler,
}

impl<T: ChunkTransport> Inbound<T> {
    /// Creates the inbound half for `link`.
    pub fn new(link: Arc<Link<T>>) -> Self {
        Self {
            link,
            reassembler: Reassembler::new(),
        }
    }

    /// Processes one notification. Returns the number of frames it
    /// completed.
    pub fn on_notification(&mut self, chunk: &[u8]) -> usize {
        let frames = self.reassembler.push(chunk);
        for frame in &frames {
            let outcome = self.link.route(frame);
            debug!(
                frame_type = frame.frame_type(),
                len = frame.payload().len(),
                ?outcome,
                "frame routed"
            );
        }
        frames.len()
    }

    /// Starts from a clean state, as on a new connection. Any pending query
    /// resolves as cancelled.
    pub fn reset(&mut self) {
        self.reassembler.reset();
        self.link.correlator().cancel();
    }

    /// Returns the reassembly counters.
    pub fn stats(&self) -> ReassemblyStats {
        self.reassembler.stats()
    }

    /// Feeds notifications until the stream closes.
    ///
    /// A closed stream means the connection is gone, so the pending query is
    /// cancelled before returning.
    pub async fn run(mut self, mut notifications: mpsc::Receiver<Bytes>) -> ReassemblyStats {
        while let Some(chunk) = notifications.recv().await {
            self.on_notification(&chunk);
        }
        self.link.correlator().cancel();

        let stats = self.stats();
        info!(
            frames = stats.frames,
            resyncs = stats.resyncs,
            skipped_bytes = stats.skipped_bytes,
            "notification stream closed"
        );
        stats
    }
}

/// An established connection with its notification pump running.
#[derive(Debug)]
pub struct Session<T> {
    link: Arc<Link<T>>,
    pump: JoinHandle<ReassemblyStats>,
}

impl<T: ChunkTransport + 'static> Session<T> {
    /// Sets up a link over `transport`, starts routing `notifications` and
    /// waits the settle delay before handing the session back.
    pub async fn establish(
        transport: T,
        notifications: mpsc::Receiver<Bytes>,
        settings: &LinkSettings,
        router: MessageRouter,
    ) -> ClientResult<Self> {
        let link = Arc::new(Link::new(transport, settings, router)?);
        let mut inbound = Inbound::new(Arc::clone(&link));
        inbound.reset();
        let pump = tokio::spawn(inbound.run(notifications));

        // The peer's stack needs a moment after subscribing.
        tokio::time::sleep(settings.settle_delay()).await;
        info!(mtu = settings.mtu, "session established");

        Ok(Self { link, pump })
    }

    /// Returns the link.
    pub fn link(&self) -> &Arc<Link<T>> {
        &self.link
    }

    /// Waits for the notification stream to close and returns the final
    /// reassembly counters.
    pub async fn closed(self) -> ClientResult<ReassemblyStats> {
        self.pump
            .await
            .map_err(|e| ClientError::Task(e.to_string()))
    }

    /// Stops the pump and cancels any pending query.
    pub fn disconnect(self) {
        self.pump.abort();
        self.link.correlator().cancel();
        info!("session disconnected");
    }
}
