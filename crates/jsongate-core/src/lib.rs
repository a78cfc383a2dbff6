//! Core types: device configuration model, tracing setup

pub mod device;
pub mod tracing;

pub use device::{DeviceConfig, SENSOR_SLOTS, SensorSlot};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
