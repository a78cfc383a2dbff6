//! JSON commands carried in type `0x00` frames.
//!
//! Every payload is an object whose `cmd` field names the command. Known
//! names decode to dedicated variants; anything else is kept verbatim in
//! [`Command::Unknown`] so newer peers can add commands without breaking
//! older ones.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Name of the discriminant field.
pub const CMD_FIELD: &str = "cmd";

const GET_CONFIG: &str = "get_config";
const SAVE_CONFIG: &str = "save_config";
const CONFIG_DATA: &str = "config_data";
const SAVE_OK: &str = "save_ok";

/// A decoded command payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Host asks the device for its configuration.
    GetConfig,

    /// Host pushes configuration changes.
    SaveConfig {
        /// Keys to overwrite on the device.
        config: Map<String, Value>,
    },

    /// Device reports its configuration.
    ConfigData {
        /// All payload fields except `cmd`.
        fields: Map<String, Value>,
    },

    /// Device acknowledges a `save_config`.
    SaveOk,

    /// Unrecognised or malformed payload.
    Unknown {
        /// The `cmd` value, if the payload had a string one.
        cmd: Option<String>,
        /// The untouched payload.
        payload: Value,
    },
}

impl Command {
    /// Creates a `save_config` command.
    pub fn save_config(config: Map<String, Value>) -> Self {
        Self::SaveConfig { config }
    }

    /// Creates a `config_data` command.
    pub fn config_data(fields: Map<String, Value>) -> Self {
        Self::ConfigData { fields }
    }

    /// Classifies a decoded JSON payload by its `cmd` field.
    pub fn from_value(value: Value) -> Self {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Self::Unknown {
                    cmd: None,
                    payload: other,
                };
            }
        };

        let name = match map.get(CMD_FIELD) {
            Some(Value::String(name)) => name.clone(),
            _ => {
                return Self::Unknown {
                    cmd: None,
                    payload: Value::Object(map),
                };
            }
        };

        match name.as_str() {
            GET_CONFIG => Self::GetConfig,
            SAVE_OK => Self::SaveOk,
            CONFIG_DATA => {
                map.remove(CMD_FIELD);
                Self::ConfigData { fields: map }
            }
            SAVE_CONFIG => match map.remove("config") {
                None => Self::SaveConfig { config: Map::new() },
                Some(Value::Object(config)) => Self::SaveConfig { config },
                Some(other) => {
                    map.insert("config".to_string(), other);
                    Self::Unknown {
                        cmd: Some(name),
                        payload: Value::Object(map),
                    }
                }
            },
            _ => Self::Unknown {
                cmd: Some(name),
                payload: Value::Object(map),
            },
        }
    }

    /// Converts the command back to its wire JSON.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        match self {
            Self::GetConfig => {
                map.insert(CMD_FIELD.to_string(), GET_CONFIG.into());
            }
            Self::SaveOk => {
                map.insert(CMD_FIELD.to_string(), SAVE_OK.into());
            }
            Self::SaveConfig { config } => {
                map.insert(CMD_FIELD.to_string(), SAVE_CONFIG.into());
                map.insert("config".to_string(), Value::Object(config.clone()));
            }
            Self::ConfigData { fields } => {
                map.extend(fields.clone());
                map.insert(CMD_FIELD.to_string(), CONFIG_DATA.into());
            }
            Self::Unknown { payload, .. } => return payload.clone(),
        }
        Value::Object(map)
    }

    /// Returns the command name, if there is one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::GetConfig => Some(GET_CONFIG),
            Self::SaveConfig { .. } => Some(SAVE_CONFIG),
            Self::ConfigData { .. } => Some(CONFIG_DATA),
            Self::SaveOk => Some(SAVE_OK),
            Self::Unknown { cmd, .. } => cmd.as_deref(),
        }
    }

    /// Returns true if the command is named `name`.
    pub fn is(&self, name: &str) -> bool {
        self.name() == Some(name)
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}
