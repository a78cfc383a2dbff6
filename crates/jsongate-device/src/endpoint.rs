//! Device side of the link.
//!
//! Reassembles host writes, hands each command to the [`DeviceHandler`] and
//! sends its reply back as notifications of at most the configured MTU.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use jsongate_protocol::{ChunkTransport, Command, OutboundChunker, ReassemblyStats, Reassembler};

use crate::config::EndpointConfig;
use crate::error::{DeviceError, DeviceResult};
use crate::handler::DeviceHandler;

/// One device connection.
#[derive(Debug)]
pub struct DeviceEndpoint<T> {
    name: String,
    reassembler: Reassembler,
    chunker: OutboundChunker<T>,
    handler: Arc<DeviceHandler>,
}

impl<T: ChunkTransport> DeviceEndpoint<T> {
    /// Creates an endpoint replying through `transport`.
    pub fn new(
        transport: T,
        config: &EndpointConfig,
        handler: Arc<DeviceHandler>,
    ) -> DeviceResult<Self> {
        config.validate()?;
        Ok(Self {
            name: config.name.clone(),
            reassembler: Reassembler::new(),
            chunker: OutboundChunker::new(transport, config.mtu)?,
            handler,
        })
    }

    /// Returns the handler.
    pub fn handler(&self) -> &Arc<DeviceHandler> {
        &self.handler
    }

    /// Returns the reassembly counters.
    pub fn stats(&self) -> ReassemblyStats {
        self.reassembler.stats()
    }

    /// Processes one host write. Returns the number of replies sent.
    ///
    /// Every frame the write completes is handled. Undecodable frames are
    /// dropped and a failed reply is logged; only a disconnected host stops
    /// processing early, and that error is returned.
    pub async fn on_notification(&mut self, chunk: &[u8]) -> DeviceResult<usize> {
        let mut replies = 0;
        for frame in self.reassembler.push(chunk) {
            let command = match frame.decode_json::<Command>() {
                Ok(command) => command,
                Err(err) => {
                    warn!(device = %self.name, error = %err, "dropping undecodable frame");
                    continue;
                }
            };

            let Some(reply) = self.handler.handle(command).await else {
                continue;
            };
            match self.chunker.send(&reply).await {
                Ok(report) => {
                    debug!(
                        device = %self.name,
                        cmd = ?reply.name(),
                        frame_len = report.frame_len,
                        chunks = report.chunks,
                        "reply sent"
                    );
                    replies += 1;
                }
                Err(err) => {
                    let err = DeviceError::from(err);
                    if err.is_disconnected() {
                        return Err(err);
                    }
                    warn!(device = %self.name, cmd = ?reply.name(), error = %err, "reply failed");
                }
            }
        }
        Ok(replies)
    }

    /// Serves host writes until the stream closes or the host disappears.
    pub async fn run(
        mut self,
        mut writes: mpsc::Receiver<Bytes>,
    ) -> DeviceResult<ReassemblyStats> {
        info!(device = %self.name, mtu = self.chunker.mtu(), "device endpoint running");

        while let Some(chunk) = writes.recv().await {
            match self.on_notification(&chunk).await {
                Ok(_) => {}
                Err(err) => {
                    info!(device = %self.name, error = %err, "host disconnected");
                    break;
                }
            }
        }

        let stats = self.stats();
        info!(
            device = %self.name,
            frames = stats.frames,
            resyncs = stats.resyncs,
            "device endpoint stopped"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use jsongate_protocol::{ChannelTransport, encode_json, split_chunks};

    fn endpoint(mtu: usize) -> (DeviceEndpoint<ChannelTransport>, mpsc::Receiver<Bytes>) {
        let (transport, rx) = ChannelTransport::pair(256);
        let config = EndpointConfig::default().with_mtu(mtu);
        let endpoint = DeviceEndpoint::new(transport, &config, Arc::default()).unwrap();
        (endpoint, rx)
    }

    fn replies(rx: &mut mpsc::Receiver<Bytes>) -> Vec<Value> {
        let mut reassembler = Reassembler::new();
        let mut out = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            for frame in reassembler.push(&chunk) {
                out.push(frame.decode_json().unwrap());
            }
        }
        out
    }

    #[tokio::test]
    async fn answers_get_config_in_mtu_chunks() {
        let (mut endpoint, mut rx) = endpoint(20);
        let request = encode_json(&Command::GetConfig).unwrap();

        let mut sent = 0;
        for chunk in split_chunks(&request, 5).unwrap() {
            sent += endpoint.on_notification(&chunk).await.unwrap();
        }
        assert_eq!(sent, 1);

        let mut sizes = Vec::new();
        let mut reassembler = Reassembler::new();
        let mut frames = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            sizes.push(chunk.len());
            frames.extend(reassembler.push(&chunk));
        }
        assert!(sizes.len() > 1);
        assert!(sizes.iter().all(|&len| len <= 20));
        assert_eq!(frames.len(), 1);
        let reply: Value = frames[0].decode_json().unwrap();
        assert_eq!(reply["cmd"], "config_data");
        assert_eq!(reply["ntpServer"], "pool.ntp.org");
    }

    #[tokio::test]
    async fn save_then_get_in_one_write() {
        let (mut endpoint, mut rx) = endpoint(100);
        let mut wire = encode_json(&json!({"cmd": "save_config", "config": {"ssid": "lab"}}))
            .unwrap()
            .to_vec();
        wire.extend_from_slice(&encode_json(&Command::GetConfig).unwrap());

        assert_eq!(endpoint.on_notification(&wire).await.unwrap(), 2);

        let replies = replies(&mut rx);
        assert_eq!(replies[0], json!({"cmd": "save_ok"}));
        assert_eq!(replies[1]["ssid"], "lab");
        assert_eq!(endpoint.handler().saves(), 1);
    }

    #[tokio::test]
    async fn bad_frames_are_skipped() {
        let (mut endpoint, mut rx) = endpoint(100);
        let mut wire = vec![0x00, 0x04, 0x00, b'{', b'n', b'o', b'!'];
        wire.extend_from_slice(&encode_json(&json!({"cmd": "hello"})).unwrap());
        wire.extend_from_slice(&encode_json(&Command::GetConfig).unwrap());

        assert_eq!(endpoint.on_notification(&wire).await.unwrap(), 1);
        assert_eq!(replies(&mut rx).len(), 1);
        assert_eq!(endpoint.stats().frames, 3);
    }

    #[tokio::test]
    async fn failed_reply_does_not_drop_later_frames() {
        let mut stored = jsongate_core::DeviceConfig::default();
        stored.ssid = "x".repeat(5000);
        let handler = Arc::new(DeviceHandler::new(crate::new_shared_config(stored)));
        let (transport, mut rx) = ChannelTransport::pair(256);
        let mut endpoint =
            DeviceEndpoint::new(transport, &EndpointConfig::default(), Arc::clone(&handler))
                .unwrap();

        let mut wire = encode_json(&Command::GetConfig).unwrap().to_vec();
        wire.extend_from_slice(
            &encode_json(&json!({"cmd": "save_config", "config": {"ssid": "short"}})).unwrap(),
        );

        // config_data is too large to frame, save_ok still goes out
        assert_eq!(endpoint.on_notification(&wire).await.unwrap(), 1);
        assert_eq!(replies(&mut rx), vec![json!({"cmd": "save_ok"})]);
        assert_eq!(endpoint.stats().frames, 2);
        assert_eq!(handler.saves(), 1);
        assert_eq!(handler.snapshot().await.ssid, "short");
    }

    #[tokio::test]
    async fn run_stops_when_host_goes_away() {
        let (endpoint, rx) = endpoint(100);
        drop(rx);
        let (host, writes) = mpsc::channel(4);

        let task = tokio::spawn(endpoint.run(writes));
        host.send(encode_json(&Command::GetConfig).unwrap())
            .await
            .unwrap();

        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats.frames, 1);
    }

    #[tokio::test]
    async fn run_ends_with_the_write_stream() {
        let (endpoint, _rx) = endpoint(100);
        let (host, writes) = mpsc::channel::<Bytes>(4);
        drop(host);

        let stats = endpoint.run(writes).await.unwrap();
        assert_eq!(stats, ReassemblyStats::default());
    }
}
