//! Dispatch of reassembled frames.
//!
//! JSON frames are classified by their `cmd` field. Data updates and
//! acknowledgements go to registered callbacks, every command is offered to
//! the pending query, and anything unrecognised is logged and ignored so
//! either side can introduce new commands.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use jsongate_protocol::{Command, Frame};

use crate::correlator::RequestCorrelator;

/// Callback for `config_data` updates.
pub type UpdateCallback = Box<dyn Fn(&Map<String, Value>) + Send + Sync>;

/// Callback for `save_ok` acknowledgements.
pub type AckCallback = Box<dyn Fn() + Send + Sync>;

/// Handler for a reserved non-JSON frame type.
pub type BinaryHandler = Box<dyn Fn(&Frame) + Send + Sync>;

/// What the router did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A callback ran, the pending query resolved, or both.
    Delivered {
        /// Whether the pending query was resolved.
        resolved: bool,
    },
    /// Valid command that nothing handles.
    Ignored,
    /// JSON payload could not be decoded; the frame was dropped.
    Dropped,
    /// Non-JSON frame, handed to its registered handler if there is one.
    Binary {
        /// Whether a handler was registered for the type.
        handled: bool,
    },
}

/// Routes frames to callbacks and the request correlator.
#[derive(Default)]
pub struct MessageRouter {
    on_update: Option<UpdateCallback>,
    on_ack: Option<AckCallback>,
    binary: HashMap<u8, BinaryHandler>,
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut binary: Vec<_> = self.binary.keys().collect();
        binary.sort();
        f.debug_struct("MessageRouter")
            .field("on_update", &self.on_update.is_some())
            .field("on_ack", &self.on_ack.is_some())
            .field("binary", &binary)
            .finish()
    }
}

impl MessageRouter {
    /// Creates a router with no callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the `config_data` callback.
    pub fn on_update(
        mut self,
        callback: impl Fn(&Map<String, Value>) + Send + Sync + 'static,
    ) -> Self {
        self.on_update = Some(Box::new(callback));
        self
    }

    /// Builder: set the `save_ok` callback.
    pub fn on_ack(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_ack = Some(Box::new(callback));
        self
    }

    /// Builder: handle frames of a reserved type.
    ///
    /// Replaces any handler already registered for `frame_type`.
    pub fn register_binary(
        mut self,
        frame_type: u8,
        handler: impl Fn(&Frame) + Send + Sync + 'static,
    ) -> Self {
        self.binary.insert(frame_type, Box::new(handler));
        self
    }

    /// Routes one reassembled frame.
    pub fn route(&self, frame: &Frame, correlator: &RequestCorrelator) -> RouteOutcome {
        if !frame.is_json() {
            return self.route_binary(frame);
        }

        match frame.decode_json::<Command>() {
            Ok(command) => self.dispatch(command, correlator),
            Err(err) => {
                warn!(
                    len = frame.payload().len(),
                    error = %err,
                    "dropping undecodable frame"
                );
                RouteOutcome::Dropped
            }
        }
    }

    /// Dispatches a decoded command.
    ///
    /// Callbacks run before the pending query is resolved, so a caller
    /// woken by the reply sees state its callback already applied.
    pub fn dispatch(&self, command: Command, correlator: &RequestCorrelator) -> RouteOutcome {
        let handled = match &command {
            Command::ConfigData { fields } => match &self.on_update {
                Some(callback) => {
                    callback(fields);
                    true
                }
                None => false,
            },
            Command::SaveOk => match &self.on_ack {
                Some(callback) => {
                    callback();
                    true
                }
                None => false,
            },
            Command::GetConfig | Command::SaveConfig { .. } => {
                debug!(cmd = ?command.name(), "ignoring host-bound command");
                false
            }
            Command::Unknown { cmd, .. } => {
                debug!(?cmd, "ignoring unknown command");
                false
            }
        };

        let resolved = correlator.offer(&command);
        if handled || resolved {
            RouteOutcome::Delivered { resolved }
        } else {
            RouteOutcome::Ignored
        }
    }

    fn route_binary(&self, frame: &Frame) -> RouteOutcome {
        let frame_type = frame.frame_type();
        match self.binary.get(&frame_type) {
            Some(handler) => {
                handler(frame);
                RouteOutcome::Binary { handled: true }
            }
            None => {
                debug!(
                    frame_type,
                    len = frame.payload().len(),
                    "no handler for binary frame"
                );
                RouteOutcome::Binary { handled: false }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use bytes::Bytes;
    use jsongate_protocol::{ChannelTransport, OutboundChunker};

    use super::*;

    fn json_frame(text: &str) -> Frame {
        Frame::new(0, Bytes::copy_from_slice(text.as_bytes()))
    }

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        (Arc::clone(&count), count)
    }

    #[test]
    fn config_data_reaches_update_callback() {
        let (seen, hits) = counter();
        let router = MessageRouter::new().on_update(move |fields| {
            assert_eq!(fields["ssid"], "home");
            hits.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = router.route(
            &json_frame(r#"{"cmd":"config_data","ssid":"home"}"#),
            &RequestCorrelator::new(),
        );

        assert_eq!(outcome, RouteOutcome::Delivered { resolved: false });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn save_ok_reaches_ack_callback() {
        let (seen, hits) = counter();
        let router = MessageRouter::new().on_ack(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = router.route(
            &json_frame(r#"{"cmd":"save_ok"}"#),
            &RequestCorrelator::new(),
        );
        assert_eq!(outcome, RouteOutcome::Delivered { resolved: false });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_and_unhandled_commands_are_ignored() {
        let router = MessageRouter::new();
        let correlator = RequestCorrelator::new();

        for text in [
            r#"{"cmd":"sensor_data","slot":1}"#,
            r#"{"no_cmd":true}"#,
            r#"{"cmd":"config_data"}"#,
            r#"{"cmd":"get_config"}"#,
        ] {
            assert_eq!(
                router.route(&json_frame(text), &correlator),
                RouteOutcome::Ignored
            );
        }
    }

    #[test]
    fn malformed_payload_is_dropped() {
        let (seen, hits) = counter();
        let router = MessageRouter::new().on_ack(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        let correlator = RequestCorrelator::new();

        assert_eq!(
            router.route(&json_frame("{not json"), &correlator),
            RouteOutcome::Dropped
        );
        assert_eq!(
            router.route(&Frame::new(0, Bytes::from_static(&[0xff, 0xfe])), &correlator),
            RouteOutcome::Dropped
        );

        // Later frames are unaffected.
        router.route(&json_frame(r#"{"cmd":"save_ok"}"#), &correlator);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn binary_frames_use_registered_handler() {
        let (seen, hits) = counter();
        let router = MessageRouter::new().register_binary(0x02, move |frame| {
            assert_eq!(&frame.payload()[..], &[1, 2, 3]);
            hits.fetch_add(1, Ordering::SeqCst);
        });
        let correlator = RequestCorrelator::new();

        let handled = router.route(
            &Frame::new(0x02, Bytes::from_static(&[1, 2, 3])),
            &correlator,
        );
        let unhandled = router.route(&Frame::new(0x05, Bytes::from_static(&[9])), &correlator);

        assert_eq!(handled, RouteOutcome::Binary { handled: true });
        assert_eq!(unhandled, RouteOutcome::Binary { handled: false });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn matching_reply_resolves_pending_query() {
        let (seen, hits) = counter();
        let router = Arc::new(MessageRouter::new().on_update(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        }));
        let correlator = Arc::new(RequestCorrelator::new());
        let (transport, mut rx) = ChannelTransport::pair(8);
        let chunker = OutboundChunker::with_default_mtu(transport);

        let device = {
            let router = Arc::clone(&router);
            let correlator = Arc::clone(&correlator);
            tokio::spawn(async move {
                rx.recv().await.unwrap();
                router.route(&json_frame(r#"{"cmd":"config_data","ssid":"x"}"#), &correlator)
            })
        };

        let outcome = correlator
            .query(
                &chunker,
                &Command::GetConfig,
                |c| c.is("config_data"),
                Duration::from_secs(2),
            )
            .await
            .unwrap();

        assert_eq!(
            device.await.unwrap(),
            RouteOutcome::Delivered { resolved: true }
        );
        assert!(matches!(
            outcome.into_matched(),
            Some(Command::ConfigData { .. })
        ));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
