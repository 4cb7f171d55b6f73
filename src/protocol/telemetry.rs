use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};

use super::codes::deserialize_code;

/// Inbound message discriminant (the `type` field).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum MessageType {
    Sensor,
    Config,
    Rssi,
    StartTime,
    Info,
}

/// A message pushed by the device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Telemetry {
    Sensor(SensorReport),
    Config(ConfigReport),
    Rssi(RssiReport),
    StartTime(StartTimeReport),
    Info(DeviceInfo),
}

impl Telemetry {
    pub fn kind(&self) -> MessageType {
        match self {
            Telemetry::Sensor(_) => MessageType::Sensor,
            Telemetry::Config(_) => MessageType::Config,
            Telemetry::Rssi(_) => MessageType::Rssi,
            Telemetry::StartTime(_) => MessageType::StartTime,
            Telemetry::Info(_) => MessageType::Info,
        }
    }
}

/// `sensor` -- live state of the unit.
///
/// Temperatures and the setpoint are in tenths of a degree Celsius.
/// `mode` and `fan` are the raw codes as reported; see [super::codes].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorReport {
    pub power: bool,

    #[serde(deserialize_with = "deserialize_code")]
    pub mode: u8,

    #[serde(deserialize_with = "deserialize_code")]
    pub fan: u8,

    pub setpoint: i32,

    pub swing_v: bool,
    pub swing_h: bool,

    pub temp_inside: i32,
    pub temp_outside: i32,
    pub temp_coil: i32,

    pub fan_rpm: u32,

    /// Compressor is not running
    pub idle: bool,
}

/// `config` -- persisted controller settings.
///
/// Passwords are write-only and never part of this message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigReport {
    /// Sensor broadcast period in seconds
    pub period: u32,

    pub hostname: String,

    pub http_security_enable: bool,

    #[serde(rename = "httpSecurityUser")]
    pub http_user: String,

    pub http_control_enable: bool,
    pub mqtt_control_enable: bool,

    pub mqtt_user: String,
    pub mqtt_broker: String,
    pub mqtt_sub_topic: String,
    pub mqtt_pub_topic: String,
    pub mqtt_testament_topic: String,

    /// Some settings only take effect after a restart of the controller
    pub reset_needed: bool,
}

/// `rssi` -- WiFi signal strength in dBm.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RssiReport {
    pub value: i32,
}

/// `startTime` -- boot time of the controller as a unix timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTimeReport {
    #[serde(rename = "startTime")]
    pub start_time: i64,
}

/// `info` -- static hardware/firmware description.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    pub ip_address: String,
    pub cpu_mhz: u32,
    pub flash_mhz: u32,
    pub wifi_network: String,
    pub chip_id: u32,
    pub core_ver: String,
    pub sdk_ver: String,

    #[serde(rename = "lastRst")]
    pub last_reset: String,
}
