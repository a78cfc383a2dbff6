//! Command handling.
//!
//! Answers `get_config` with the stored configuration and applies
//! `save_config` patches. Other commands get no reply.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use jsongate_core::DeviceConfig;
use jsongate_protocol::{Command, encode_json};

/// Device configuration shared between the handler and its owner.
pub type SharedConfig = Arc<RwLock<DeviceConfig>>;

/// Creates a shared configuration.
pub fn new_shared_config(config: DeviceConfig) -> SharedConfig {
    Arc::new(RwLock::new(config))
}

/// Turns host commands into replies.
#[derive(Debug)]
pub struct DeviceHandler {
    config: SharedConfig,
    saves: AtomicU64,
}

impl Default for DeviceHandler {
    fn default() -> Self {
        Self::new(new_shared_config(DeviceConfig::default()))
    }
}

impl DeviceHandler {
    /// Creates a handler over `config`.
    pub fn new(config: SharedConfig) -> Self {
        Self {
            config,
            saves: AtomicU64::new(0),
        }
    }

    /// Returns the shared configuration.
    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Returns a copy of the current configuration.
    pub async fn snapshot(&self) -> DeviceConfig {
        self.config.read().await.clone()
    }

    /// Number of `save_config` commands applied.
    pub fn saves(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    /// Handles one command, returning the reply to send, if any.
    ///
    /// A `save_config` is rejected as a whole and not acknowledged when its
    /// values have the wrong types or when the resulting `config_data` would
    /// not fit in one frame.
    pub async fn handle(&self, command: Command) -> Option<Command> {
        match command {
            Command::GetConfig => {
                let config = self.config.read().await;
                debug!(sensors = config.configured_sensors(), "handling get_config");
                Some(Command::config_data(config.to_fields()))
            }
            Command::SaveConfig { config: patch } => {
                let mut config = self.config.write().await;
                let mut merged = config.clone();
                if let Err(err) = merged.merge(&patch) {
                    warn!(error = %err, "rejecting save_config");
                    return None;
                }
                if let Err(err) = encode_json(&Command::config_data(merged.to_fields())) {
                    warn!(error = %err, "rejecting save_config, config_data would not fit");
                    return None;
                }

                *config = merged;
                self.saves.fetch_add(1, Ordering::Relaxed);
                info!(keys = patch.len(), "configuration saved");
                Some(Command::SaveOk)
            }
            other => {
                debug!(cmd = ?other.name(), "no reply for command");
                None
            }
        }
    }
}
