//! Endpoint configuration.

use jsongate_protocol::DEFAULT_MTU;

use crate::error::{DeviceError, DeviceResult};

/// Name the endpoint advertises.
pub const DEFAULT_DEVICE_NAME: &str = "E-PAPER-C6";

/// Device endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Advertised device name, used in logs.
    pub name: String,

    /// Largest notification the endpoint sends, in bytes.
    pub mtu: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DEVICE_NAME.to_string(),
            mtu: DEFAULT_MTU,
        }
    }
}

impl EndpointConfig {
    /// Creates a configuration with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder: set the MTU.
    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// Checks the configuration.
    pub fn validate(&self) -> DeviceResult<()> {
        if self.mtu == 0 {
            return Err(DeviceError::config("mtu must be at least 1"));
        }
        if self.name.is_empty() {
            return Err(DeviceError::config("device name must not be empty"));
        }
        Ok(())
    }
}
