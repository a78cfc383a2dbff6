//! Client configuration.
//!
//! Settings live in a single `config.toml` file at
//! `~/.config/jsongate/config.toml` by default:
//!
//! ```toml
//! debug = false
//! log_format = "compact"   # or "pretty", "json"
//!
//! [link]
//! mtu = 100
//! query_timeout_ms = 2000
//! settle_delay_ms = 200
//! channel_capacity = 64
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use jsongate_core::{TracingConfig, TracingOutputFormat};
use jsongate_protocol::DEFAULT_MTU;

use crate::error::{ClientError, ClientResult};

/// Configuration for the jsongate client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// Log output format.
    pub log_format: TracingOutputFormat,

    /// Link settings.
    pub link: LinkSettings,
}

/// Settings for one link session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Largest single transport write, in bytes.
    pub mtu: usize,

    /// How long a query waits for its response, in milliseconds.
    pub query_timeout_ms: u64,

    /// Pause after subscribing before the first command, in milliseconds.
    pub settle_delay_ms: u64,

    /// Buffered chunks for in-process channel transports.
    pub channel_capacity: usize,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            query_timeout_ms: 2000,
            settle_delay_ms: 200,
            channel_capacity: 64,
        }
    }
}

impl LinkSettings {
    /// Query timeout as a duration.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Settle delay as a duration.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Builder: set the MTU.
    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// Builder: set the query timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Builder: set the settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Checks that the settings can drive a link.
    pub fn validate(&self) -> ClientResult<()> {
        if self.mtu == 0 {
            return Err(ClientError::config("link.mtu must be at least 1"));
        }
        if self.query_timeout_ms == 0 {
            return Err(ClientError::config("link.query_timeout_ms must be positive"));
        }
        if self.channel_capacity == 0 {
            return Err(ClientError::config("link.channel_capacity must be at least 1"));
        }
        Ok(())
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if absent.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::config(format!("failed to read config: {}", e)))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ClientError::config(format!("failed to parse config: {}", e)))?;
        config.link.validate()?;
        Ok(config)
    }

    /// Tracing setup for this configuration. `debug` from the command line
    /// adds to the file's `debug`, it never turns it off.
    pub fn tracing(&self, debug: bool) -> TracingConfig {
        let config = if debug || self.debug {
            TracingConfig::debug()
        } else {
            TracingConfig::default()
        };
        config.with_format(self.log_format)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("jsongate")
    }
}
