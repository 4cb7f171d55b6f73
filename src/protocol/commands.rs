use serde::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;

use super::codes::deserialize_code;

/*
    Commands accepted by the controller over the websocket:

    config      -- change a persisted setting, selected by `target`
    rstDevice   -- reboot the controller
    rstWifi     -- forget the WiFi credentials and reboot into the config portal
    ac*         -- change one aspect of the unit state; the controller fills in
                   the rest from its last known state before writing to the unit

    Every config change except `period` sets `resetNeeded` on the controller.
*/

/// A command sent to the controller. Serialized as a JSON object tagged by `command`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "command", rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Command {
    Config(ConfigCommand),

    RstDevice,
    RstWifi,

    /// Setpoint in whole degrees Celsius
    AcTemp { temp: i32 },

    AcPower { power: bool },

    AcMode {
        #[serde(deserialize_with = "deserialize_code")]
        mode: u8,
    },

    AcFan {
        #[serde(deserialize_with = "deserialize_code")]
        fan: u8,
    },

    AcSwingV {
        #[serde(rename = "swingV")]
        swing_v: bool,
    },

    AcSwingH {
        #[serde(rename = "swingH")]
        swing_h: bool,
    },
}

impl Command {
    /// Wire name of the command (the `command` field)
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

mod config {
    use std::fmt;

    use super::*;

    /// `config` command, tagged by `target`.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize, IntoStaticStr)]
    #[serde(tag = "target", rename_all = "camelCase")]
    #[strum(serialize_all = "camelCase")]
    pub enum ConfigCommand {
        /// Sensor broadcast period in seconds (1-120)
        Period { value: u8 },

        /// HTTP basic auth on the web UI
        HttpEnable { value: bool },

        HttpControlEnable { value: bool },
        MqttControlEnable { value: bool },

        HttpAccessData(Credentials),
        MqttAccessData(Credentials),

        MqttData(MqttSettings),

        Hostname { value: String },
    }

    impl ConfigCommand {
        pub fn target(&self) -> &'static str {
            self.into()
        }
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Credentials {
        pub username: String,
        pub password: Password,
    }

    /// A password on its way to the controller. Never printed.
    #[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Password(String);

    impl Password {
        pub fn new(password: impl Into<String>) -> Self {
            Self(password.into())
        }
    }

    impl fmt::Debug for Password {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("--omitted--")
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MqttSettings {
        pub broker: String,
        pub sub_topic: String,
        pub pub_topic: String,
        pub testament_topic: String,
    }
}

pub use config::{ConfigCommand, Credentials, MqttSettings, Password};
