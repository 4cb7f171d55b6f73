//! Inbound side: routes device messages to their handlers.

use tracing::{debug, info, warn};

use crate::{
    protocol::{
        codec::{self, DecodeError},
        codes::{AcMode, FanSpeed},
        telemetry::{ConfigReport, DeviceInfo, MessageType, SensorReport, Telemetry},
    },
    sink::ProjectionSink,
    state::{ConfigState, Projection, SensorState},
    uptime::{format_started_at, UptimeClock},
};

/// Applies device messages to the projection, one handler per message type.
///
/// A handler validates and converts its whole payload before touching the
/// projection, so a rejected message leaves no trace.
#[derive(Debug, Default)]
pub struct TelemetryDispatcher {
    uptime: UptimeClock,
}

impl TelemetryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and apply one inbound text frame.
    ///
    /// Errors are logged here and returned for the caller's information only;
    /// the dispatcher stays usable either way.
    pub fn dispatch_text<S>(&mut self, text: &str, projection: &mut Projection, sink: &mut S, now: i64) -> Result<MessageType, DecodeError>
    where
        S: ProjectionSink + ?Sized,
    {
        let result = codec::decode(text)
            .and_then(|message| self.apply(message, projection, sink, now));

        if let Err(err) = &result {
            warn!("dropped inbound message: {err}");
            debug!(text, "dropped message text");
        }

        result
    }

    /// Apply an already decoded message.
    pub fn apply<S>(&mut self, message: Telemetry, projection: &mut Projection, sink: &mut S, now: i64) -> Result<MessageType, DecodeError>
    where
        S: ProjectionSink + ?Sized,
    {
        let kind = message.kind();
        debug!(%kind, "applying message");

        match message {
            Telemetry::Sensor(report) => apply_sensor(&report, projection, sink),
            Telemetry::Config(report) => apply_config(&report, projection, sink),
            Telemetry::Rssi(report) => {
                projection.rssi = Some(report.value);
                sink.set_rssi(report.value);
            },
            Telemetry::StartTime(report) => self.apply_start_time(report.start_time, projection, sink, now)?,
            Telemetry::Info(info) => apply_info(info, projection, sink),
        }

        sink.message_applied(kind);

        Ok(kind)
    }

    fn apply_start_time<S>(&mut self, start_time: i64, projection: &mut Projection, sink: &mut S, now: i64) -> Result<(), DecodeError>
    where
        S: ProjectionSink + ?Sized,
    {
        let started_at = format_started_at(start_time)
            .ok_or(DecodeError::Rejected { kind: MessageType::StartTime, reason: "start time out of range" })?;

        if projection.start_time.is_some_and(|previous| previous != start_time) {
            info!(start_time, "controller start time changed");
        }

        projection.start_time = Some(start_time);
        self.uptime.set_start(start_time);

        if let Some(uptime) = self.uptime.uptime(now) {
            sink.set_uptime(&uptime);
        }
        sink.set_started_at(&started_at);

        Ok(())
    }

    /// Periodic uptime refresh. Produces nothing once the clock is stopped
    /// or before the start time is known.
    pub fn tick<S>(&mut self, sink: &mut S, now: i64) -> Option<String>
    where
        S: ProjectionSink + ?Sized,
    {
        let uptime = self.uptime.uptime(now)?;
        sink.set_uptime(&uptime);

        Some(uptime)
    }

    /// Stop the uptime clock for good.
    pub fn stop_clock(&mut self) {
        self.uptime.stop();
    }
}

fn apply_sensor<S>(report: &SensorReport, projection: &mut Projection, sink: &mut S)
where
    S: ProjectionSink + ?Sized,
{
    let state = SensorState::from(report);

    if let AcMode::Unknown(code) = state.mode {
        warn!(code, "unknown mode code");
    }
    if let FanSpeed::Unknown(code) = state.fan {
        warn!(code, "unknown fan code");
    }

    let was_enabled = projection.temperature_controls_enabled();
    let enabled = state.temperature_controls_enabled();
    if projection.sensor.is_some() && was_enabled != enabled {
        debug!(mode = %state.mode, enabled, "temperature controls toggled");
    }

    sink.set_power(state.power);
    sink.set_mode(state.mode);
    sink.set_fan(state.fan);
    sink.set_setpoint(state.displayed_setpoint());
    sink.set_temperature_controls_enabled(enabled);
    sink.set_swing_v(state.swing_v);
    sink.set_swing_h(state.swing_h);
    sink.set_temp_inside(state.temp_inside);
    sink.set_temp_outside(state.temp_outside);
    sink.set_temp_coil(state.temp_coil);
    sink.set_fan_rpm(state.fan_rpm);
    sink.set_compressor_idle(state.idle);

    projection.sensor = Some(state);
}

fn apply_config<S>(report: &ConfigReport, projection: &mut Projection, sink: &mut S)
where
    S: ProjectionSink + ?Sized,
{
    let state = ConfigState::from(report);

    if u32::from(state.period) != report.period {
        warn!(reported = report.period, applied = state.period, "period out of range, clamped");
    }

    sink.set_period(state.period);
    sink.set_hostname(&state.hostname);
    sink.set_http_security_enabled(state.http_security_enable);
    sink.set_http_user(&state.http_user);
    sink.set_http_control_enabled(state.http_control_enable);
    sink.set_mqtt_control_enabled(state.mqtt_control_enable);
    sink.set_mqtt_user(&state.mqtt_user);
    sink.set_mqtt_broker(&state.mqtt_broker);
    sink.set_mqtt_sub_topic(&state.mqtt_sub_topic);
    sink.set_mqtt_pub_topic(&state.mqtt_pub_topic);
    sink.set_mqtt_testament_topic(&state.mqtt_testament_topic);

    // sticky until a config message says otherwise
    sink.set_restart_required(state.reset_needed);
    if state.reset_needed {
        info!("controller restart required for settings to take effect");
    }

    projection.config = Some(state);
}

fn apply_info<S>(info: DeviceInfo, projection: &mut Projection, sink: &mut S)
where
    S: ProjectionSink + ?Sized,
{
    if projection.device_info.as_ref().is_some_and(|previous| *previous != info) {
        debug!("device info replaced");
    }

    sink.set_device_info(&info);
    projection.device_info = Some(info);
}
