//! Local projection of the device state, as shown by the UI.
//!
//! Each inbound message type owns one group of fields. A message only ever
//! replaces its own group, so the groups can arrive in any order.

use std::fmt;

use crate::protocol::{
    codes::{AcMode, FanSpeed},
    telemetry::{ConfigReport, DeviceInfo, SensorReport},
};

pub const PERIOD_MIN: u8 = 1;
pub const PERIOD_MAX: u8 = 120;

/// A temperature in tenths of a degree Celsius, displayed as `22°C` / `22.5°C`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Temperature(i32);

impl Temperature {
    pub fn from_tenths(tenths: i32) -> Self {
        Self(tenths)
    }

    pub fn from_degrees(degrees: i32) -> Self {
        Self(degrees * 10)
    }

    pub fn tenths(self) -> i32 {
        self.0
    }

    /// Nearest whole degree, halves rounded up
    pub fn whole_degrees(self) -> i32 {
        self.0.saturating_add(5).div_euclid(10)
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 10 == 0 {
            write!(f, "{}°C", self.0 / 10)
        } else {
            write!(f, "{:.1}°C", f64::from(self.0) / 10.0)
        }
    }
}

/// Fields owned by `sensor` messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SensorState {
    pub power: bool,
    pub mode: AcMode,
    pub fan: FanSpeed,
    pub setpoint: Temperature,

    /// `setpoint` was adjusted locally and the unit has not reported it back yet.
    /// The next `sensor` message always replaces it.
    pub setpoint_provisional: bool,

    pub swing_v: bool,
    pub swing_h: bool,

    pub temp_inside: Temperature,
    pub temp_outside: Temperature,
    pub temp_coil: Temperature,

    pub fan_rpm: u32,
    pub idle: bool,
}

impl SensorState {
    pub fn temperature_controls_enabled(&self) -> bool {
        self.mode.has_setpoint()
    }

    /// Setpoint as displayed; `None` while the mode ignores it.
    pub fn displayed_setpoint(&self) -> Option<Temperature> {
        self.temperature_controls_enabled().then_some(self.setpoint)
    }
}

impl From<&SensorReport> for SensorState {
    fn from(report: &SensorReport) -> Self {
        Self {
            power: report.power,
            mode: AcMode::from_code(report.mode),
            fan: FanSpeed::from_code(report.fan),
            setpoint: Temperature::from_tenths(report.setpoint),
            setpoint_provisional: false,
            swing_v: report.swing_v,
            swing_h: report.swing_h,
            temp_inside: Temperature::from_tenths(report.temp_inside),
            temp_outside: Temperature::from_tenths(report.temp_outside),
            temp_coil: Temperature::from_tenths(report.temp_coil),
            fan_rpm: report.fan_rpm,
            idle: report.idle,
        }
    }
}

/// Fields owned by `config` messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigState {
    pub period: u8,
    pub hostname: String,

    pub http_security_enable: bool,
    pub http_user: String,
    pub http_control_enable: bool,

    pub mqtt_control_enable: bool,
    pub mqtt_user: String,
    pub mqtt_broker: String,
    pub mqtt_sub_topic: String,
    pub mqtt_pub_topic: String,
    pub mqtt_testament_topic: String,

    pub reset_needed: bool,
}

impl From<&ConfigReport> for ConfigState {
    fn from(report: &ConfigReport) -> Self {
        Self {
            period: clamp_period(report.period),
            hostname: report.hostname.clone(),
            http_security_enable: report.http_security_enable,
            http_user: report.http_user.clone(),
            http_control_enable: report.http_control_enable,
            mqtt_control_enable: report.mqtt_control_enable,
            mqtt_user: report.mqtt_user.clone(),
            mqtt_broker: report.mqtt_broker.clone(),
            mqtt_sub_topic: report.mqtt_sub_topic.clone(),
            mqtt_pub_topic: report.mqtt_pub_topic.clone(),
            mqtt_testament_topic: report.mqtt_testament_topic.clone(),
            reset_needed: report.reset_needed,
        }
    }
}

/// Clamp a period in seconds to the range of the period slider.
pub fn clamp_period(seconds: u32) -> u8 {
    // PERIOD_MAX fits in a u8, so the conversion cannot fail after the clamp
    u8::try_from(seconds.clamp(PERIOD_MIN.into(), PERIOD_MAX.into())).unwrap_or(PERIOD_MAX)
}

/// The UI-state projection. Created empty, filled in as messages arrive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Projection {
    pub sensor: Option<SensorState>,
    pub config: Option<ConfigState>,

    /// WiFi signal strength in dBm
    pub rssi: Option<i32>,

    /// Controller boot time (unix seconds)
    pub start_time: Option<i64>,

    pub device_info: Option<DeviceInfo>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the temperature step buttons are usable.
    /// They stay disabled until the first `sensor` message.
    pub fn temperature_controls_enabled(&self) -> bool {
        self.sensor.as_ref().is_some_and(SensorState::temperature_controls_enabled)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_display() {
        assert_eq!(Temperature::from_tenths(220).to_string(), "22°C");
        assert_eq!(Temperature::from_tenths(225).to_string(), "22.5°C");
        assert_eq!(Temperature::from_tenths(80).to_string(), "8°C");
        assert_eq!(Temperature::from_tenths(-5).to_string(), "-0.5°C");
        assert_eq!(Temperature::from_tenths(-30).to_string(), "-3°C");
    }

    #[test]
    fn test_whole_degrees() {
        assert_eq!(Temperature::from_tenths(220).whole_degrees(), 22);
        assert_eq!(Temperature::from_tenths(224).whole_degrees(), 22);
        assert_eq!(Temperature::from_tenths(225).whole_degrees(), 23);
        assert_eq!(Temperature::from_tenths(-4).whole_degrees(), 0);
        assert_eq!(Temperature::from_tenths(i32::MAX).whole_degrees(), i32::MAX / 10);
        assert_eq!(Temperature::from_tenths(i32::MIN).whole_degrees(), i32::MIN.div_euclid(10));
    }

    #[test]
    fn test_clamp_period() {
        assert_eq!(clamp_period(0), 1);
        assert_eq!(clamp_period(5), 5);
        assert_eq!(clamp_period(120), 120);
        assert_eq!(clamp_period(600), 120);
    }

    #[test]
    fn test_sensor_state_from_report() {
        let report = SensorReport {
            power: true,
            mode: 50,
            fan: 65,
            setpoint: 240,
            swing_v: true,
            swing_h: false,
            temp_inside: 215,
            temp_outside: -20,
            temp_coil: 120,
            fan_rpm: 900,
            idle: false,
        };

        let state = SensorState::from(&report);
        assert_eq!(state.mode, AcMode::Dry);
        assert_eq!(state.fan, FanSpeed::Auto);
        assert!(!state.temperature_controls_enabled());
        assert_eq!(state.displayed_setpoint(), None);
        assert_eq!(state.setpoint, Temperature::from_degrees(24));
    }
}
