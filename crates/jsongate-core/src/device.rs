//! Typed view of the device configuration exchanged over the link.
//!
//! The host fetches it with `get_config` (answered by `config_data`) and
//! pushes edits with `save_config`. Field names are the wire names used by
//! the device firmware, so most are camelCase while `module_map` is not.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Number of sensor slots the device exposes.
pub const SENSOR_SLOTS: usize = 16;

/// Full device configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceConfig {
    /// Wi-Fi network name.
    pub ssid: String,
    /// Wi-Fi password. Write-only: never included in `config_data`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// NTP server host.
    pub ntp_server: String,
    /// GMT offset in seconds.
    pub gmt: i64,
    /// Daylight-saving offset in seconds.
    pub dst: i64,
    /// `auto` or `manual`.
    pub dns_mode: String,
    pub dns_primary: String,
    pub dns_secondary: String,
    /// Base URL of the calendar/events backend.
    pub tempus_url: String,
    /// Seconds of inactivity before the device stops advertising.
    pub ble_timeout: u32,
    /// Seconds between sensor polls.
    pub sensor_interval: u32,
    /// UI language code.
    pub lang: String,
    /// Sensor display style index.
    pub style: u32,
    /// Opaque module layout string owned by the device.
    #[serde(rename = "module_map")]
    pub module_map: String,
    pub sensors: Vec<SensorSlot>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password: None,
            ntp_server: "pool.ntp.org".to_string(),
            gmt: 3600,
            dst: 3600,
            dns_mode: "auto".to_string(),
            dns_primary: "8.8.8.8".to_string(),
            dns_secondary: "1.1.1.1".to_string(),
            tempus_url: String::new(),
            ble_timeout: 15,
            sensor_interval: 60,
            lang: "en".to_string(),
            style: 0,
            module_map: String::new(),
            sensors: vec![SensorSlot::default(); SENSOR_SLOTS],
        }
    }
}

/// One sensor slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SensorSlot {
    pub label: String,
    pub url: String,
    pub unit: String,
    /// Raw value is divided by this before display.
    pub divisor: f64,
    /// Decimal places shown.
    pub decimals: u32,
    pub enabled: bool,
    /// Source kind: `prometheus` or `json`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Path into the response document when `kind == "json"`.
    pub json_path: String,
}

impl Default for SensorSlot {
    fn default() -> Self {
        Self {
            label: String::new(),
            url: String::new(),
            unit: String::new(),
            divisor: 1.0,
            decimals: 1,
            enabled: false,
            kind: "prometheus".to_string(),
            json_path: String::new(),
        }
    }
}

impl SensorSlot {
    /// A slot counts as configured when it is enabled and labelled.
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.label.is_empty()
    }
}

impl DeviceConfig {
    /// Builds a config from the fields of a `config_data` message.
    ///
    /// Missing fields take their defaults; the `cmd` discriminant and unknown
    /// fields are ignored.
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        let mut config: Self = serde_json::from_value(Value::Object(fields.clone()))?;
        config.normalize_sensors();
        Ok(config)
    }

    /// Fields for a `config_data` reply, without the password.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut public = self.clone();
        public.password = None;
        match serde_json::to_value(public) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Fields for a `save_config` request. The password is sent only when
    /// one is set, so the device keeps its stored one otherwise.
    pub fn to_save_fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Applies a `save_config` object.
    ///
    /// Only keys present with a non-null value overwrite the current ones.
    /// `sensors` replaces slots in order and never more than
    /// [`SENSOR_SLOTS`]; slots past the end of the patch are kept.
    pub fn merge(&mut self, patch: &Map<String, Value>) -> Result<(), serde_json::Error> {
        let mut current = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        for (key, value) in patch {
            if value.is_null() || key == "sensors" {
                continue;
            }
            current.insert(key.clone(), value.clone());
        }

        let mut merged: Self = serde_json::from_value(Value::Object(current))?;
        merged.normalize_sensors();

        if let Some(Value::Array(slots)) = patch.get("sensors") {
            for (index, slot) in slots.iter().take(SENSOR_SLOTS).enumerate() {
                merged.sensors[index] = serde_json::from_value(slot.clone())?;
            }
        }

        *self = merged;
        Ok(())
    }

    /// Number of enabled, labelled sensor slots.
    pub fn configured_sensors(&self) -> usize {
        self.sensors.iter().filter(|s| s.is_configured()).count()
    }

    fn normalize_sensors(&mut self) {
        self.sensors.truncate(SENSOR_SLOTS);
        self.sensors.resize(SENSOR_SLOTS, SensorSlot::default());
    }
}
