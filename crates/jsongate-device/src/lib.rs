//! Device endpoint for the jsongate link.
//!
//! Plays the peripheral's part: it reassembles host writes, answers
//! `get_config` with its stored configuration and applies `save_config`
//! patches, replying through its own chunker.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use jsongate_device::{DeviceEndpoint, DeviceHandler, EndpointConfig};
//! use jsongate_protocol::ChannelTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (notify, _host_inbox) = ChannelTransport::pair(64);
//!     let (_host, writes) = tokio::sync::mpsc::channel(64);
//!
//!     let handler = Arc::new(DeviceHandler::default());
//!     let endpoint = DeviceEndpoint::new(notify, &EndpointConfig::default(), handler)?;
//!     endpoint.run(writes).await?;
//!     Ok(())
//! }
//! ```

mod config;
mod endpoint;
mod error;
mod handler;

pub use config::{DEFAULT_DEVICE_NAME, EndpointConfig};
pub use endpoint::DeviceEndpoint;
pub use error::{DeviceError, DeviceResult};
pub use handler::{DeviceHandler, SharedConfig, new_shared_config};
