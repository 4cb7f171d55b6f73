//! Seams between the protocol core and whatever renders the UI.

use crate::protocol::{
    codes::{AcMode, FanSpeed},
    telemetry::{DeviceInfo, MessageType},
};
use crate::state::Temperature;

/// Receives every change to the displayed state.
///
/// All setters default to doing nothing, so a sink only implements the
/// fields it renders.
pub trait ProjectionSink {
    // sensor

    fn set_power(&mut self, _on: bool) {}

    fn set_mode(&mut self, _mode: AcMode) {}

    fn set_fan(&mut self, _fan: FanSpeed) {}

    /// `None` is the "no value" display (`--°C`) used in dry and fan modes.
    fn set_setpoint(&mut self, _setpoint: Option<Temperature>) {}

    /// Enables or disables the temperature step buttons.
    fn set_temperature_controls_enabled(&mut self, _enabled: bool) {}

    fn set_swing_v(&mut self, _on: bool) {}

    fn set_swing_h(&mut self, _on: bool) {}

    fn set_temp_inside(&mut self, _temp: Temperature) {}

    fn set_temp_outside(&mut self, _temp: Temperature) {}

    fn set_temp_coil(&mut self, _temp: Temperature) {}

    fn set_fan_rpm(&mut self, _rpm: u32) {}

    /// Compressor indicator: idle style when `true`, running style otherwise.
    fn set_compressor_idle(&mut self, _idle: bool) {}

    // config

    fn set_period(&mut self, _seconds: u8) {}

    fn set_hostname(&mut self, _hostname: &str) {}

    fn set_http_security_enabled(&mut self, _enabled: bool) {}

    fn set_http_user(&mut self, _user: &str) {}

    fn set_http_control_enabled(&mut self, _enabled: bool) {}

    fn set_mqtt_control_enabled(&mut self, _enabled: bool) {}

    fn set_mqtt_user(&mut self, _user: &str) {}

    fn set_mqtt_broker(&mut self, _broker: &str) {}

    fn set_mqtt_sub_topic(&mut self, _topic: &str) {}

    fn set_mqtt_pub_topic(&mut self, _topic: &str) {}

    fn set_mqtt_testament_topic(&mut self, _topic: &str) {}

    /// Persistent "restart required" banner.
    fn set_restart_required(&mut self, _required: bool) {}

    // rssi

    fn set_rssi(&mut self, _dbm: i32) {}

    // startTime

    fn set_uptime(&mut self, _uptime: &str) {}

    fn set_started_at(&mut self, _started_at: &str) {}

    // info

    fn set_device_info(&mut self, _info: &DeviceInfo) {}

    // lifecycle

    /// Blocking "connection lost" indicator.
    fn show_connection_lost(&mut self) {}

    /// Called once a message has been fully applied.
    fn message_applied(&mut self, _kind: MessageType) {}
}

/// A sink that renders nothing.
impl ProjectionSink for () {}

/// Interactive yes/no confirmation.
pub trait Prompt {
    fn confirm(&mut self, question: &str) -> bool;
}

/// Answers every confirmation the same way.
#[derive(Clone, Copy, Debug)]
pub struct AutoConfirm(pub bool);

impl Prompt for AutoConfirm {
    fn confirm(&mut self, _question: &str) -> bool {
        self.0
    }
}
