//! Emulator for the controller firmware, for testing clients without hardware.
//!
//! A single device task owns the emulated state. Connected clients talk to it
//! over a request channel and receive its broadcasts (periodic `sensor` and
//! `rssi` pushes, config echoes, restarts) over an `async_broadcast` channel.

use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_broadcast::{InactiveReceiver, RecvError, Sender, TrySendError};
use futures::{SinkExt, StreamExt};
use rand::Rng;
use thiserror::Error;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    sync::{mpsc, oneshot},
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request as HandshakeRequest, Response as HandshakeResponse},
        http::StatusCode,
    },
};
use tracing::{debug, error, info, warn};

use crate::{
    client::unix_now,
    config::{framed, Frame, WS_PATH},
    encoder::{SETPOINT_MAX, SETPOINT_MIN},
    protocol::{
        codec,
        codes::{AcMode, MODE_AUTO_ALIAS},
        commands::{Command, ConfigCommand, Credentials, MqttSettings, Password},
        telemetry::{ConfigReport, DeviceInfo, RssiReport, SensorReport, StartTimeReport, Telemetry},
    },
    state::clamp_period,
};

pub const RSSI_INTERVAL: Duration = Duration::from_secs(30);


/// The air conditioner as seen through the serial link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitState {
    pub power: bool,

    /// Mode code as the unit reports it; auto comes back as `'0'`
    pub mode: u8,
    pub fan: u8,

    /// Tenths of a degree
    pub setpoint: i32,
    pub swing_v: bool,
    pub swing_h: bool,

    pub temp_inside: i32,
    pub temp_outside: i32,
    pub temp_coil: i32,
    pub fan_rpm: u32,
    pub idle: bool,
}

impl Default for UnitState {
    fn default() -> Self {
        Self {
            power: false,
            mode: MODE_AUTO_ALIAS,
            fan: b'A',
            setpoint: 270,
            swing_v: false,
            swing_h: false,
            temp_inside: 245,
            temp_outside: 180,
            temp_coil: 230,
            fan_rpm: 0,
            idle: true,
        }
    }
}

impl UnitState {
    fn report(&self) -> SensorReport {
        SensorReport {
            power: self.power,
            mode: self.mode,
            fan: self.fan,
            setpoint: self.setpoint,
            swing_v: self.swing_v,
            swing_h: self.swing_h,
            temp_inside: self.temp_inside,
            temp_outside: self.temp_outside,
            temp_coil: self.temp_coil,
            fan_rpm: self.fan_rpm,
            idle: self.idle,
        }
    }

    fn set_power(&mut self, power: bool) {
        self.power = power;
        self.idle = !power;
        self.fan_rpm = if power { 1150 } else { 0 };
    }
}

/// Persisted controller settings.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceSettings {
    pub period: u8,
    pub hostname: String,

    pub http_security_enable: bool,
    pub http_user: String,
    pub http_password: Password,
    pub http_control_enable: bool,

    pub mqtt_control_enable: bool,
    pub mqtt_user: String,
    pub mqtt_password: Password,
    pub mqtt: MqttSettings,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            period: 15,
            hostname: "daikin".into(),
            http_security_enable: false,
            http_user: "admin".into(),
            http_password: Password::new("admin"),
            http_control_enable: true,
            mqtt_control_enable: false,
            mqtt_user: String::new(),
            mqtt_password: Password::new(""),
            mqtt: MqttSettings {
                broker: String::new(),
                sub_topic: "daikin/set".into(),
                pub_topic: "daikin/state".into(),
                testament_topic: "daikin/status".into(),
            },
        }
    }
}

/// What the rest of the world needs to hear after a change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reaction {
    None,
    Sensor,
    Config,
    Rssi,

    /// The controller rebooted; every client connection is dropped
    Restart,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EditError {
    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("missing value for `{0}`")]
    MissingValue(String),

    #[error("invalid value `{value}` for `{field}`")]
    InvalidValue {
        field: String,
        value: String,
    },
}

/// Emulated controller: unit state, settings and firmware bookkeeping.
#[derive(Clone, Debug)]
pub struct Device {
    pub unit: UnitState,
    pub settings: DeviceSettings,
    pub reset_needed: bool,
    pub start_time: i64,

    /// Signal strength around which the reported rssi wanders
    pub rssi: i32,
    last_reset: String,
}

impl Device {
    pub fn new(start_time: i64) -> Self {
        Self {
            unit: UnitState::default(),
            settings: DeviceSettings::default(),
            reset_needed: false,
            start_time,
            rssi: -62,
            last_reset: "Power on".into(),
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.settings.period.max(1).into())
    }

    /// Messages pushed to a freshly connected client, in firmware order.
    pub fn greeting(&self) -> Vec<Telemetry> {
        vec![
            self.config(),
            self.sensor(),
            self.info(),
            Telemetry::StartTime(StartTimeReport { start_time: self.start_time }),
            self.rssi(),
        ]
    }

    pub fn sensor(&self) -> Telemetry {
        Telemetry::Sensor(self.unit.report())
    }

    pub fn config(&self) -> Telemetry {
        let settings = &self.settings;

        Telemetry::Config(ConfigReport {
            period: settings.period.into(),
            hostname: settings.hostname.clone(),
            http_security_enable: settings.http_security_enable,
            http_user: settings.http_user.clone(),
            http_control_enable: settings.http_control_enable,
            mqtt_control_enable: settings.mqtt_control_enable,
            mqtt_user: settings.mqtt_user.clone(),
            mqtt_broker: settings.mqtt.broker.clone(),
            mqtt_sub_topic: settings.mqtt.sub_topic.clone(),
            mqtt_pub_topic: settings.mqtt.pub_topic.clone(),
            mqtt_testament_topic: settings.mqtt.testament_topic.clone(),
            reset_needed: self.reset_needed,
        })
    }

    pub fn info(&self) -> Telemetry {
        Telemetry::Info(DeviceInfo {
            hostname: Some(self.settings.hostname.clone()),
            ip_address: "127.0.0.1".into(),
            cpu_mhz: 80,
            flash_mhz: 40,
            wifi_network: "emulated".into(),
            chip_id: 0x00c0ffee,
            core_ver: "2_7_4".into(),
            sdk_ver: "2.2.2-dev(38a443e)".into(),
            last_reset: self.last_reset.clone(),
        })
    }

    pub fn rssi(&self) -> Telemetry {
        let jitter = rand::thread_rng().gen_range(-3..=3);
        Telemetry::Rssi(RssiReport { value: self.rssi + jitter })
    }

    /// Handle a text frame from a client. Anything that is not a known command is ignored.
    pub fn handle_text(&mut self, text: &str, now: i64) -> Reaction {
        match serde_json::from_str::<Command>(text) {
            Ok(command) => self.apply(command, now),
            Err(err) => {
                warn!("ignoring client message: {err}");
                Reaction::None
            }
        }
    }

    pub fn apply(&mut self, command: Command, now: i64) -> Reaction {
        debug!(?command, "applying {}", command.name());

        let unit = match command {
            Command::Config(config) => {
                self.apply_config(config);
                return Reaction::Config;
            },
            Command::RstDevice => {
                info!("resetting device");
                self.restart(now, "Software/System restart");
                return Reaction::Restart;
            },
            Command::RstWifi => {
                info!("resetting wifi");
                self.restart(now, "Software/System restart");
                return Reaction::Restart;
            },
            command => {
                self.apply_unit(command);
                &self.unit
            },
        };

        debug!(?unit, "unit updated");

        Reaction::Sensor
    }

    fn apply_unit(&mut self, command: Command) {
        let unit = &mut self.unit;

        match command {
            Command::AcTemp { temp } => unit.setpoint = temp.clamp(SETPOINT_MIN, SETPOINT_MAX) * 10,
            Command::AcPower { power } => unit.set_power(power),
            Command::AcMode { mode } => {
                unit.mode = match AcMode::from_code(mode) {
                    AcMode::Auto => MODE_AUTO_ALIAS,
                    _ => mode,
                };
            },
            Command::AcFan { fan } => unit.fan = fan,
            Command::AcSwingV { swing_v } => unit.swing_v = swing_v,
            Command::AcSwingH { swing_h } => unit.swing_h = swing_h,
            other => warn!("{} is not a unit command", other.name()),
        }
    }

    fn apply_config(&mut self, config: ConfigCommand) {
        let settings = &mut self.settings;
        let target = config.target();

        match config {
            ConfigCommand::Period { value } => {
                settings.period = clamp_period(value.into());
                info!("updating period to {}", settings.period);
                return;
            },
            ConfigCommand::HttpEnable { value } => settings.http_security_enable = value,
            ConfigCommand::HttpControlEnable { value } => settings.http_control_enable = value,
            ConfigCommand::MqttControlEnable { value } => settings.mqtt_control_enable = value,
            ConfigCommand::HttpAccessData(Credentials { username, password }) => {
                settings.http_user = username;
                settings.http_password = password;
            },
            ConfigCommand::MqttAccessData(Credentials { username, password }) => {
                settings.mqtt_user = username;
                settings.mqtt_password = password;
            },
            ConfigCommand::MqttData(mqtt) => settings.mqtt = mqtt,
            ConfigCommand::Hostname { value } => settings.hostname = value,
        }

        info!("updated {target}, restart needed");
        self.reset_needed = true;
    }

    fn restart(&mut self, now: i64, reason: &str) {
        self.start_time = now;
        self.reset_needed = false;
        self.last_reset = reason.to_string();
    }

    /// Manual edit of the emulated unit, e.g. `mode 50`, `idle false`, `inside 231`.
    pub fn edit(&mut self, line: &str, now: i64) -> Result<Reaction, EditError> {
        let mut words = line.split_whitespace();

        let Some(field) = words.next() else {
            return Ok(Reaction::None);
        };
        let value = words.next();

        match field {
            "rssi" => {
                self.rssi = parse_value(field, value)?;
                return Ok(Reaction::Rssi);
            },
            "restart" => {
                self.restart(now, "External System");
                return Ok(Reaction::Restart);
            },
            _ => (),
        }

        let unit = &mut self.unit;

        match field {
            "power" => unit.set_power(parse_flag(field, value)?),
            "mode" => unit.mode = parse_code(field, value)?,
            "fan" => unit.fan = parse_code(field, value)?,
            "setpoint" => unit.setpoint = parse_value(field, value)?,
            "inside" => unit.temp_inside = parse_value(field, value)?,
            "outside" => unit.temp_outside = parse_value(field, value)?,
            "coil" => unit.temp_coil = parse_value(field, value)?,
            "rpm" => unit.fan_rpm = parse_value(field, value)?,
            "idle" => unit.idle = parse_flag(field, value)?,
            "swingv" => unit.swing_v = parse_flag(field, value)?,
            "swingh" => unit.swing_h = parse_flag(field, value)?,
            other => return Err(EditError::UnknownField(other.to_string())),
        }

        Ok(Reaction::Sensor)
    }
}

fn require<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, EditError> {
    value.ok_or_else(|| EditError::MissingValue(field.to_string()))
}

fn invalid(field: &str, value: &str) -> EditError {
    EditError::InvalidValue { field: field.to_string(), value: value.to_string() }
}

fn parse_value<T: FromStr>(field: &str, value: Option<&str>) -> Result<T, EditError> {
    let value = require(field, value)?;
    value.parse().map_err(|_| invalid(field, value))
}

fn parse_flag(field: &str, value: Option<&str>) -> Result<bool, EditError> {
    match require(field, value)? {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => Err(invalid(field, other)),
    }
}

/// A raw code, either numeric (`50`) or a single character (`A`)
fn parse_code(field: &str, value: Option<&str>) -> Result<u8, EditError> {
    let value = require(field, value)?;

    if let Ok(code) = value.parse() {
        return Ok(code);
    }

    match value.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(invalid(field, value)),
    }
}


/// Broadcast from the device task to every connected client.
#[derive(Clone, Debug)]
pub enum DevicePush {
    Message(String),
    Restart,
}

#[derive(Debug)]
enum Request {
    Greet(oneshot::Sender<Vec<String>>),
    Command(String),
    Edit(String),
}

/// Shared handle to a running device task.
#[derive(Clone)]
pub struct DeviceHandle {
    requests: mpsc::Sender<Request>,

    // kept so the broadcast channel stays open with no clients connected
    pushes: InactiveReceiver<DevicePush>,
}

impl DeviceHandle {
    /// Start the device task.
    pub fn spawn(device: Device) -> Self {
        let (requests_send, requests_recv) = mpsc::channel(32);

        let (mut pushes_send, pushes_recv) = async_broadcast::broadcast(64);
        pushes_send.set_overflow(true);

        tokio::spawn(device_task(device, requests_recv, pushes_send));

        Self {
            requests: requests_send,
            pushes: pushes_recv.deactivate(),
        }
    }

    async fn request(&self, request: Request) -> Result<()> {
        self.requests.send(request).await.map_err(|_| anyhow!("device task stopped"))
    }

    /// Initial messages for a new client.
    pub async fn greet(&self) -> Result<Vec<String>> {
        let (reply_send, reply_recv) = oneshot::channel();
        self.request(Request::Greet(reply_send)).await?;

        reply_recv.await.context("device task stopped")
    }

    pub async fn command(&self, text: String) -> Result<()> {
        self.request(Request::Command(text)).await
    }

    pub async fn edit(&self, line: String) -> Result<()> {
        self.request(Request::Edit(line)).await
    }

    pub fn subscribe(&self) -> async_broadcast::Receiver<DevicePush> {
        self.pushes.activate_cloned()
    }
}

fn encode_all(messages: &[Telemetry]) -> Vec<String> {
    messages.iter()
        .filter_map(|message| match codec::encode_telemetry(message) {
            Ok(text) => Some(text),
            Err(err) => {
                error!("failed to encode {}: {err}", message.kind());
                None
            }
        })
        .collect()
}

fn push(pushes: &Sender<DevicePush>, push: DevicePush) {
    match pushes.try_broadcast(push) {
        Ok(_) => (),
        // nobody connected
        Err(TrySendError::Inactive(_)) => (),
        Err(err) => warn!("broadcast failed: {err}"),
    }
}

fn push_message(pushes: &Sender<DevicePush>, message: Telemetry) {
    for text in encode_all(&[message]) {
        push(pushes, DevicePush::Message(text));
    }
}

fn periodic(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn device_task(mut device: Device, mut requests: mpsc::Receiver<Request>, pushes: Sender<DevicePush>) {
    info!("device started, sensor period {:?}", device.period());

    let mut rssi = periodic(RSSI_INTERVAL);
    let mut sensor = periodic(device.period());

    loop {
        let reaction = select! {
            request = requests.recv() => match request {
                Some(Request::Greet(reply)) => {
                    let _ = reply.send(encode_all(&device.greeting()));
                    Reaction::None
                },
                Some(Request::Command(text)) => device.handle_text(&text, unix_now()),
                Some(Request::Edit(line)) => match device.edit(&line, unix_now()) {
                    Ok(reaction) => reaction,
                    Err(err) => {
                        warn!("edit `{line}`: {err}");
                        Reaction::None
                    },
                },
                None => break,
            },

            _ = rssi.tick() => Reaction::Rssi,
            _ = sensor.tick() => Reaction::Sensor,
        };

        match reaction {
            Reaction::None => (),
            Reaction::Sensor => push_message(&pushes, device.sensor()),
            Reaction::Rssi => push_message(&pushes, device.rssi()),
            Reaction::Config => {
                push_message(&pushes, device.config());

                if sensor.period() != device.period() {
                    sensor = periodic(device.period());
                }
            },
            Reaction::Restart => {
                push(&pushes, DevicePush::Restart);
                sensor = periodic(device.period());
            },
        }
    }

    debug!("device task stopped");
}


/// Accept websocket clients on `listener` until it fails.
pub async fn serve(listener: TcpListener, device: DeviceHandle) -> Result<()> {
    loop {
        let (stream, addr) = listener.accept().await.context("failed to accept connection")?;

        stream.set_nodelay(true)?;

        let device = device.clone();
        tokio::spawn(async move {
            if let Err(err) = serve_client(stream, addr, device).await {
                warn!("client {addr}: {err:#}");
            }
        });

        info!("new connection from {addr}");
    }
}

fn check_path(request: &HandshakeRequest, response: HandshakeResponse) -> Result<HandshakeResponse, ErrorResponse> {
    if request.uri().path() == WS_PATH {
        return Ok(response);
    }

    let mut error = ErrorResponse::new(Some(format!("no websocket at {}", request.uri().path())));
    *error.status_mut() = StatusCode::NOT_FOUND;

    Err(error)
}

async fn serve_client(stream: TcpStream, addr: SocketAddr, device: DeviceHandle) -> Result<()> {
    let stream = accept_hdr_async(stream, check_path).await
        .with_context(|| format!("websocket handshake with {addr} failed"))?;

    let mut channel = framed(stream);

    // subscribe first so nothing broadcast after the greeting is missed
    let mut pushes = device.subscribe();

    for text in device.greet().await? {
        channel.send(text).await?;
    }

    loop {
        select! {
            frame = channel.next() => match frame {
                Some(Ok(Frame::Text(text))) => device.command(text).await?,
                Some(Ok(Frame::Close)) | None => break,
                Some(Err(err)) => return Err(err.into()),
            },

            push = pushes.recv() => match push {
                Ok(DevicePush::Message(text)) => channel.send(text).await?,
                Ok(DevicePush::Restart) => {
                    info!("device restarting, dropping client {addr}");
                    break;
                },
                Err(RecvError::Overflowed(skipped)) => warn!("client {addr} fell behind, {skipped} messages skipped"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    let _ = channel.close().await;
    info!("client {addr} disconnected");

    Ok(())
}
