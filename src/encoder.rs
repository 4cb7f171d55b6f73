//! Outbound side: turns UI interactions into commands.

use tracing::{debug, info};

use crate::{
    protocol::{
        codes::{AcMode, FanSpeed},
        commands::{Command, ConfigCommand, Credentials, MqttSettings},
    },
    sink::{ProjectionSink, Prompt},
    state::{clamp_period, Projection, Temperature},
};

/// Setpoint range accepted by the unit, in whole degrees Celsius
pub const SETPOINT_MIN: i32 = 10;
pub const SETPOINT_MAX: i32 = 32;

pub const CONFIRM_HOSTNAME: &str = "Change hostname?";
pub const CONFIRM_RESET_DEVICE: &str = "Reset device?";
pub const CONFIRM_RESET_WIFI: &str = "Reset wifi?";

/// A committed user interaction.
///
/// Widgets that fire continuously (the period slider) report only the final
/// value on release. Toggles carry the new state of the switch.
#[derive(Clone, Debug, PartialEq)]
pub enum UiEvent {
    PeriodReleased(u32),
    HttpSecurityToggled(bool),
    HttpControlToggled(bool),
    MqttControlToggled(bool),
    HttpAccessSubmitted(Credentials),
    MqttAccessSubmitted(Credentials),
    MqttDataSubmitted(MqttSettings),
    HostnameSubmitted(String),
    ResetDevicePressed,
    ResetWifiPressed,

    /// Setpoint up/down buttons, in whole degrees
    TemperatureStep(i32),
    PowerToggled(bool),
    ModeSelected(AcMode),
    FanSelected(FanSpeed),
    SwingVToggled(bool),
    SwingHToggled(bool),
}

/// What became of a UI event.
#[derive(Clone, Debug, PartialEq)]
pub enum Encoded {
    Send(Command),

    /// The user declined the confirmation
    Canceled,

    /// Not applicable in the current state
    Ignored(&'static str),
}

/// Builds exactly one command per interaction.
///
/// The only state it touches is the optimistic setpoint; everything else
/// waits for the device to report back.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommandEncoder;

impl CommandEncoder {
    pub fn new() -> Self {
        Self
    }

    pub fn encode<S, P>(&self, event: UiEvent, projection: &mut Projection, sink: &mut S, prompt: &mut P) -> Encoded
    where
        S: ProjectionSink + ?Sized,
        P: Prompt + ?Sized,
    {
        let command = match event {
            UiEvent::PeriodReleased(seconds) => {
                let value = clamp_period(seconds);
                if u32::from(value) != seconds {
                    debug!(seconds, value, "period clamped");
                }
                Command::Config(ConfigCommand::Period { value })
            },
            UiEvent::HttpSecurityToggled(value) => Command::Config(ConfigCommand::HttpEnable { value }),
            UiEvent::HttpControlToggled(value) => Command::Config(ConfigCommand::HttpControlEnable { value }),
            UiEvent::MqttControlToggled(value) => Command::Config(ConfigCommand::MqttControlEnable { value }),
            UiEvent::HttpAccessSubmitted(credentials) => Command::Config(ConfigCommand::HttpAccessData(credentials)),
            UiEvent::MqttAccessSubmitted(credentials) => Command::Config(ConfigCommand::MqttAccessData(credentials)),
            UiEvent::MqttDataSubmitted(settings) => Command::Config(ConfigCommand::MqttData(settings)),

            UiEvent::HostnameSubmitted(value) => {
                if !prompt.confirm(CONFIRM_HOSTNAME) {
                    info!(hostname = %value, "hostname change canceled");
                    return Encoded::Canceled;
                }
                Command::Config(ConfigCommand::Hostname { value })
            },
            UiEvent::ResetDevicePressed => {
                if !prompt.confirm(CONFIRM_RESET_DEVICE) {
                    info!("device reset canceled");
                    return Encoded::Canceled;
                }
                Command::RstDevice
            },
            UiEvent::ResetWifiPressed => {
                if !prompt.confirm(CONFIRM_RESET_WIFI) {
                    info!("wifi reset canceled");
                    return Encoded::Canceled;
                }
                Command::RstWifi
            },

            UiEvent::TemperatureStep(delta) => match step_setpoint(delta, projection, sink) {
                Ok(temp) => Command::AcTemp { temp },
                Err(reason) => {
                    info!(delta, "temperature step ignored: {reason}");
                    return Encoded::Ignored(reason);
                },
            },
            UiEvent::PowerToggled(power) => Command::AcPower { power },
            UiEvent::ModeSelected(mode) => Command::AcMode { mode: mode.code() },
            UiEvent::FanSelected(fan) => Command::AcFan { fan: fan.code() },
            UiEvent::SwingVToggled(swing_v) => Command::AcSwingV { swing_v },
            UiEvent::SwingHToggled(swing_h) => Command::AcSwingH { swing_h },
        };

        debug!(?command, "encoded {}", command.name());

        Encoded::Send(command)
    }
}

/// Move the setpoint by `delta` whole degrees and show it right away.
///
/// The displayed value is provisional until the next `sensor` message.
fn step_setpoint<S>(delta: i32, projection: &mut Projection, sink: &mut S) -> Result<i32, &'static str>
where
    S: ProjectionSink + ?Sized,
{
    let sensor = projection.sensor.as_mut().ok_or("no sensor data yet")?;

    if !sensor.temperature_controls_enabled() {
        return Err("temperature controls disabled in this mode");
    }

    let target = sensor.setpoint.whole_degrees()
        .saturating_add(delta)
        .clamp(SETPOINT_MIN, SETPOINT_MAX);

    sensor.setpoint = Temperature::from_degrees(target);
    sensor.setpoint_provisional = true;
    sink.set_setpoint(Some(sensor.setpoint));

    Ok(target)
}


#[cfg(test)]
mod tests {
    use crate::{
        protocol::{commands::Password, telemetry::SensorReport},
        sink::testing::{Recorder, ScriptedPrompt, SinkEvent},
        state::SensorState,
    };

    use super::*;

    fn projection_with(mode: AcMode, setpoint: i32) -> Projection {
        let report = SensorReport {
            power: true,
            mode: mode.code(),
            fan: FanSpeed::Auto.code(),
            setpoint,
            swing_v: false,
            swing_h: false,
            temp_inside: 240,
            temp_outside: 310,
            temp_coil: 90,
            fan_rpm: 1100,
            idle: false,
        };

        Projection {
            sensor: Some(SensorState::from(&report)),
            ..Projection::default()
        }
    }

    fn encode(event: UiEvent, projection: &mut Projection, prompt: &mut ScriptedPrompt) -> (Encoded, Vec<SinkEvent>) {
        let mut sink = Recorder::default();
        let encoded = CommandEncoder::new().encode(event, projection, &mut sink, prompt);
        (encoded, sink.events)
    }

    #[test]
    fn test_temperature_step_clamps_and_shows_sent_value() {
        for setpoint in (50..=400).step_by(5) {
            for delta in -30..=30 {
                let mut projection = projection_with(AcMode::Cool, setpoint);
                let (encoded, events) = encode(UiEvent::TemperatureStep(delta), &mut projection, &mut ScriptedPrompt::default());

                let previous = Temperature::from_tenths(setpoint).whole_degrees();
                let expected = (previous + delta).clamp(SETPOINT_MIN, SETPOINT_MAX);
                assert_eq!(encoded, Encoded::Send(Command::AcTemp { temp: expected }), "{setpoint} {delta:+}");

                let shown = Temperature::from_degrees(expected);
                assert_eq!(events, vec![SinkEvent::Setpoint(Some(shown))]);

                let sensor = projection.sensor.as_ref().unwrap();
                assert_eq!(sensor.setpoint, shown);
                assert!(sensor.setpoint_provisional);
            }
        }
    }

    #[test]
    fn test_temperature_step_from_half_degree() {
        let cases = [(225, 1, 24), (225, -1, 22), (225, 0, 23), (215, 1, 23), (215, -1, 21), (315, 1, 32), (105, -1, 10)];

        for (setpoint, delta, expected) in cases {
            let mut projection = projection_with(AcMode::Heat, setpoint);
            let (encoded, events) = encode(UiEvent::TemperatureStep(delta), &mut projection, &mut ScriptedPrompt::default());

            assert_eq!(encoded, Encoded::Send(Command::AcTemp { temp: expected }), "{setpoint} {delta:+}");
            assert_eq!(events, vec![SinkEvent::Setpoint(Some(Temperature::from_degrees(expected)))]);
        }
    }

    #[test]
    fn test_temperature_step_from_extreme_setpoint() {
        for (setpoint, delta, expected) in [(i32::MAX, 1, SETPOINT_MAX), (i32::MAX, i32::MAX, SETPOINT_MAX), (i32::MIN, -1, SETPOINT_MIN), (i32::MIN, i32::MIN, SETPOINT_MIN)] {
            let mut projection = projection_with(AcMode::Cool, setpoint);
            let (encoded, _) = encode(UiEvent::TemperatureStep(delta), &mut projection, &mut ScriptedPrompt::default());

            assert_eq!(encoded, Encoded::Send(Command::AcTemp { temp: expected }), "{setpoint} {delta:+}");
            assert_eq!(projection.sensor.unwrap().setpoint, Temperature::from_degrees(expected));
        }
    }

    #[test]
    fn test_optimistic_setpoint_is_superseded() {
        use crate::{dispatcher::TelemetryDispatcher, protocol::telemetry::Telemetry};

        let mut projection = projection_with(AcMode::Heat, 220);
        let (encoded, _) = encode(UiEvent::TemperatureStep(1), &mut projection, &mut ScriptedPrompt::default());
        assert_eq!(encoded, Encoded::Send(Command::AcTemp { temp: 23 }));

        // the unit refused the change and still reports 22
        let mut report = authoritative(220);
        report.mode = AcMode::Heat.code();
        TelemetryDispatcher::new()
            .apply(Telemetry::Sensor(report), &mut projection, &mut Recorder::default(), 0)
            .unwrap();

        let sensor = projection.sensor.as_ref().unwrap();
        assert_eq!(sensor.setpoint, Temperature::from_degrees(22));
        assert!(!sensor.setpoint_provisional);
    }

    fn authoritative(setpoint: i32) -> SensorReport {
        SensorReport {
            power: true,
            mode: AcMode::Auto.code(),
            fan: FanSpeed::Speed3.code(),
            setpoint,
            swing_v: false,
            swing_h: true,
            temp_inside: 200,
            temp_outside: 50,
            temp_coil: 350,
            fan_rpm: 1200,
            idle: false,
        }
    }

    #[test]
    fn test_temperature_step_ignored() {
        let mut empty = Projection::new();
        let (encoded, events) = encode(UiEvent::TemperatureStep(1), &mut empty, &mut ScriptedPrompt::default());
        assert!(matches!(encoded, Encoded::Ignored(_)));
        assert!(events.is_empty());
        assert_eq!(empty, Projection::new());

        for mode in [AcMode::Dry, AcMode::Fan] {
            let mut projection = projection_with(mode, 240);
            let before = projection.clone();

            let (encoded, events) = encode(UiEvent::TemperatureStep(-1), &mut projection, &mut ScriptedPrompt::default());
            assert!(matches!(encoded, Encoded::Ignored(_)));
            assert!(events.is_empty());
            assert_eq!(projection, before);
        }
    }

    #[test]
    fn test_confirmations() {
        let cases = [
            (UiEvent::HostnameSubmitted("attic".into()), CONFIRM_HOSTNAME, Command::Config(ConfigCommand::Hostname { value: "attic".into() })),
            (UiEvent::ResetDevicePressed, CONFIRM_RESET_DEVICE, Command::RstDevice),
            (UiEvent::ResetWifiPressed, CONFIRM_RESET_WIFI, Command::RstWifi),
        ];

        for (event, question, command) in cases {
            let mut declined = ScriptedPrompt::answering(false);
            let (encoded, _) = encode(event.clone(), &mut Projection::new(), &mut declined);
            assert_eq!(encoded, Encoded::Canceled);
            assert_eq!(declined.asked, vec![question.to_string()]);

            let mut accepted = ScriptedPrompt::answering(true);
            let (encoded, _) = encode(event, &mut Projection::new(), &mut accepted);
            assert_eq!(encoded, Encoded::Send(command));
            assert_eq!(accepted.asked.len(), 1);
        }
    }

    #[test]
    fn test_plain_commands_do_not_prompt() {
        let credentials = Credentials { username: "admin".into(), password: Password::new("pw") };
        let settings = MqttSettings {
            broker: "broker.lan".into(),
            sub_topic: "ac/set".into(),
            pub_topic: "ac/state".into(),
            testament_topic: "ac/lwt".into(),
        };

        let cases = [
            (UiEvent::PeriodReleased(15), Command::Config(ConfigCommand::Period { value: 15 })),
            (UiEvent::PeriodReleased(0), Command::Config(ConfigCommand::Period { value: 1 })),
            (UiEvent::PeriodReleased(500), Command::Config(ConfigCommand::Period { value: 120 })),
            (UiEvent::HttpSecurityToggled(true), Command::Config(ConfigCommand::HttpEnable { value: true })),
            (UiEvent::HttpControlToggled(false), Command::Config(ConfigCommand::HttpControlEnable { value: false })),
            (UiEvent::MqttControlToggled(true), Command::Config(ConfigCommand::MqttControlEnable { value: true })),
            (UiEvent::HttpAccessSubmitted(credentials.clone()), Command::Config(ConfigCommand::HttpAccessData(credentials.clone()))),
            (UiEvent::MqttAccessSubmitted(credentials.clone()), Command::Config(ConfigCommand::MqttAccessData(credentials))),
            (UiEvent::MqttDataSubmitted(settings.clone()), Command::Config(ConfigCommand::MqttData(settings))),
            (UiEvent::PowerToggled(false), Command::AcPower { power: false }),
            (UiEvent::ModeSelected(AcMode::Auto), Command::AcMode { mode: 49 }),
            (UiEvent::ModeSelected(AcMode::Heat), Command::AcMode { mode: 52 }),
            (UiEvent::FanSelected(FanSpeed::Auto), Command::AcFan { fan: 65 }),
            (UiEvent::FanSelected(FanSpeed::Speed2), Command::AcFan { fan: 52 }),
            (UiEvent::SwingVToggled(true), Command::AcSwingV { swing_v: true }),
            (UiEvent::SwingHToggled(false), Command::AcSwingH { swing_h: false }),
        ];

        for (event, command) in cases {
            let mut prompt = ScriptedPrompt::answering(false);
            let mut projection = projection_with(AcMode::Cool, 230);
            let before = projection.clone();

            let (encoded, events) = encode(event, &mut projection, &mut prompt);
            assert_eq!(encoded, Encoded::Send(command));
            assert!(prompt.asked.is_empty());
            assert!(events.is_empty());
            assert_eq!(projection, before);
        }
    }
}
