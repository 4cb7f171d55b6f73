use std::{fmt::Display, io::IsTerminal, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use daikinws::{
    client::{run_session, Input},
    config::{parse_endpoint, DEFAULT_HOST},
    encoder::UiEvent,
    protocol::{
        codes::{AcMode, FanSpeed},
        commands::{Credentials, MqttSettings, Password},
        telemetry::{DeviceInfo, MessageType},
    },
    session::{Outcome, Session},
    sink::{ProjectionSink, Prompt},
    state::Temperature,
    trace::init_tracing,
};
use dialoguer::{theme::ColorfulTheme, Confirm};
use tokio::{
    sync::{mpsc, oneshot},
    task::block_in_place,
    time::sleep,
};
use tracing::{info, warn};
use url::Url;

/// Pause before reconnecting, so an unreachable controller is not hammered
const RELOAD_PAUSE: Duration = Duration::from_secs(1);


/// Terminal client for the Daikin websocket controller
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Controller host (optionally host:port), or a full ws:// or wss:// URL
    #[arg(default_value = DEFAULT_HOST)]
    endpoint: String,

    /// Answer yes to every confirmation
    #[arg(long, short)]
    yes: bool,

    #[command(subcommand)]
    action: Option<Action>,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Show the controller state as it changes (default)
    Watch,

    /// Perform one interaction once the controller has reported its state, then exit
    #[command(subcommand)]
    Send(SendAction),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl From<Toggle> for bool {
    fn from(toggle: Toggle) -> Self {
        matches!(toggle, Toggle::On)
    }
}

#[derive(Subcommand, Debug)]
enum SendAction {
    Power { state: Toggle },

    /// auto, dry, cool, heat or fan
    Mode { mode: AcMode },

    /// auto or 1-5
    Fan { speed: FanSpeed },

    /// Move the setpoint by whole degrees
    Temp {
        #[arg(allow_negative_numbers = true)]
        delta: i32,
    },

    SwingV { state: Toggle },
    SwingH { state: Toggle },

    /// Sensor broadcast period in seconds (1-120)
    Period { seconds: u32 },

    HttpSecurity { state: Toggle },
    HttpControl { state: Toggle },
    MqttControl { state: Toggle },

    HttpAccess { username: String, password: String },
    MqttAccess { username: String, password: String },

    Mqtt {
        broker: String,
        sub_topic: String,
        pub_topic: String,
        testament_topic: String,
    },

    Hostname { name: String },

    ResetDevice,
    ResetWifi,

    /// Send a JSON command object as is
    Raw { json: String },
}

impl SendAction {
    fn into_input(self) -> Result<Input> {
        let event = match self {
            SendAction::Power { state } => UiEvent::PowerToggled(state.into()),
            SendAction::Mode { mode } => UiEvent::ModeSelected(mode),
            SendAction::Fan { speed } => UiEvent::FanSelected(speed),
            SendAction::Temp { delta } => UiEvent::TemperatureStep(delta),
            SendAction::SwingV { state } => UiEvent::SwingVToggled(state.into()),
            SendAction::SwingH { state } => UiEvent::SwingHToggled(state.into()),
            SendAction::Period { seconds } => UiEvent::PeriodReleased(seconds),
            SendAction::HttpSecurity { state } => UiEvent::HttpSecurityToggled(state.into()),
            SendAction::HttpControl { state } => UiEvent::HttpControlToggled(state.into()),
            SendAction::MqttControl { state } => UiEvent::MqttControlToggled(state.into()),
            SendAction::HttpAccess { username, password } => {
                UiEvent::HttpAccessSubmitted(Credentials { username, password: Password::new(password) })
            },
            SendAction::MqttAccess { username, password } => {
                UiEvent::MqttAccessSubmitted(Credentials { username, password: Password::new(password) })
            },
            SendAction::Mqtt { broker, sub_topic, pub_topic, testament_topic } => {
                UiEvent::MqttDataSubmitted(MqttSettings { broker, sub_topic, pub_topic, testament_topic })
            },
            SendAction::Hostname { name } => UiEvent::HostnameSubmitted(name),
            SendAction::ResetDevice => UiEvent::ResetDevicePressed,
            SendAction::ResetWifi => UiEvent::ResetWifiPressed,
            SendAction::Raw { json } => {
                let command = serde_json::from_str(&json).context("raw command is not valid JSON")?;
                return Ok(Input::Raw(command));
            },
        };

        Ok(Input::Event(event))
    }
}


/// Prints every projection change as a line on stdout.
struct ConsoleSink {
    /// Fired once the first `sensor` message has been applied
    ready: Option<oneshot::Sender<()>>,
    restart_required: bool,
}

impl ConsoleSink {
    fn new(ready: Option<oneshot::Sender<()>>) -> Self {
        Self { ready, restart_required: false }
    }

    fn show(&self, field: &str, value: impl Display) {
        println!("{:>18}  {}", field.dimmed(), value.to_string().bold());
    }

    fn show_flag(&self, field: &str, on: bool) {
        self.show(field, if on { "on".green() } else { "off".normal() });
    }
}

impl ProjectionSink for ConsoleSink {
    fn set_power(&mut self, on: bool) { self.show_flag("power", on) }
    fn set_mode(&mut self, mode: AcMode) { self.show("mode", mode) }
    fn set_fan(&mut self, fan: FanSpeed) { self.show("fan", fan) }

    fn set_setpoint(&mut self, setpoint: Option<Temperature>) {
        match setpoint {
            Some(setpoint) => self.show("setpoint", setpoint),
            None => self.show("setpoint", "--°C"),
        }
    }

    fn set_temperature_controls_enabled(&mut self, enabled: bool) {
        self.show("temp controls", if enabled { "enabled" } else { "disabled" });
    }

    fn set_swing_v(&mut self, on: bool) { self.show_flag("swing vertical", on) }
    fn set_swing_h(&mut self, on: bool) { self.show_flag("swing horizontal", on) }
    fn set_temp_inside(&mut self, temp: Temperature) { self.show("inside", temp) }
    fn set_temp_outside(&mut self, temp: Temperature) { self.show("outside", temp) }
    fn set_temp_coil(&mut self, temp: Temperature) { self.show("coil", temp) }
    fn set_fan_rpm(&mut self, rpm: u32) { self.show("fan speed", format!("{rpm} rpm")) }

    fn set_compressor_idle(&mut self, idle: bool) {
        self.show("compressor", if idle { "idle".yellow() } else { "running".green() });
    }

    fn set_period(&mut self, seconds: u8) { self.show("period", format!("{seconds} s")) }
    fn set_hostname(&mut self, hostname: &str) { self.show("hostname", hostname) }
    fn set_http_security_enabled(&mut self, enabled: bool) { self.show_flag("http security", enabled) }
    fn set_http_user(&mut self, user: &str) { self.show("http user", user) }
    fn set_http_control_enabled(&mut self, enabled: bool) { self.show_flag("http control", enabled) }
    fn set_mqtt_control_enabled(&mut self, enabled: bool) { self.show_flag("mqtt control", enabled) }
    fn set_mqtt_user(&mut self, user: &str) { self.show("mqtt user", user) }
    fn set_mqtt_broker(&mut self, broker: &str) { self.show("mqtt broker", broker) }
    fn set_mqtt_sub_topic(&mut self, topic: &str) { self.show("mqtt sub topic", topic) }
    fn set_mqtt_pub_topic(&mut self, topic: &str) { self.show("mqtt pub topic", topic) }
    fn set_mqtt_testament_topic(&mut self, topic: &str) { self.show("mqtt testament", topic) }

    fn set_restart_required(&mut self, required: bool) {
        if required {
            println!("{}", " restart required for the new settings to take effect ".on_yellow().black());
        } else if self.restart_required {
            println!("{}", "restart no longer required".dimmed());
        }
        self.restart_required = required;
    }

    fn set_rssi(&mut self, dbm: i32) { self.show("wifi signal", format!("({dbm}dBm)")) }
    fn set_uptime(&mut self, uptime: &str) { self.show("uptime", uptime) }
    fn set_started_at(&mut self, started_at: &str) { self.show("started at", started_at) }

    fn set_device_info(&mut self, info: &DeviceInfo) {
        if let Some(hostname) = &info.hostname {
            self.show("device", hostname);
        }
        self.show("ip address", &info.ip_address);
        self.show("wifi network", &info.wifi_network);
        self.show("cpu", format!("{} MHz", info.cpu_mhz));
        self.show("flash", format!("{} MHz", info.flash_mhz));
        self.show("chip id", info.chip_id);
        self.show("core version", &info.core_ver);
        self.show("sdk version", &info.sdk_ver);
        self.show("last reset", &info.last_reset);
    }

    fn show_connection_lost(&mut self) {
        println!("{}", " connection lost ".on_red().bright_white().bold());
    }

    fn message_applied(&mut self, kind: MessageType) {
        if kind == MessageType::Sensor {
            if let Some(ready) = self.ready.take() {
                let _ = ready.send(());
            }
        }
    }
}


/// Confirmation on the terminal, or a fixed answer when there is none.
struct TerminalPrompt {
    assume_yes: bool,
}

impl Prompt for TerminalPrompt {
    fn confirm(&mut self, question: &str) -> bool {
        let question = question.replace('\n', " ");

        if self.assume_yes {
            info!("{question} yes (--yes)");
            return true;
        }

        if !(std::io::stdin().is_terminal() && std::io::stdout().is_terminal()) {
            warn!("{question} no (not a terminal)");
            return false;
        }

        let answer = block_in_place(|| {
            Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(question)
                .default(false)
                .interact()
        });

        answer.unwrap_or_else(|err| {
            warn!("confirmation failed: {err}");
            false
        })
    }
}


#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();

    let endpoint = parse_endpoint(&args.endpoint)
        .with_context(|| format!("invalid endpoint {}", args.endpoint))?;

    match args.action.unwrap_or(Action::Watch) {
        Action::Watch => watch(&endpoint, args.yes).await,
        Action::Send(action) => send(&endpoint, args.yes, action.into_input()?).await,
    }
}

/// Reloading builds a new session on a new connection, like reloading the page.
async fn watch(endpoint: &Url, assume_yes: bool) -> Result<()> {
    // the terminal never produces input in this mode
    let (_inputs, mut inputs_recv) = mpsc::channel(1);

    loop {
        let mut session = Session::new(ConsoleSink::new(None), TerminalPrompt { assume_yes });

        match run_session(endpoint, &mut session, &mut inputs_recv).await? {
            Outcome::Reload => {
                info!("reloading");
                sleep(RELOAD_PAUSE).await;
            },
            Outcome::Exit => return Ok(()),
        }
    }
}

async fn send(endpoint: &Url, assume_yes: bool, input: Input) -> Result<()> {
    let (ready_send, ready_recv) = oneshot::channel();
    let (inputs, mut inputs_recv) = mpsc::channel(1);

    let mut session = Session::new(ConsoleSink::new(Some(ready_send)), TerminalPrompt { assume_yes });

    let runner = run_session(endpoint, &mut session, &mut inputs_recv);
    tokio::pin!(runner);

    let outcome = tokio::select! {
        outcome = &mut runner => {
            outcome?;
            bail!("connection ended before the controller reported its state");
        },
        ready = ready_recv => {
            ready.context("session ended before the controller reported its state")?;

            inputs.send(input).await.map_err(|_| anyhow!("session ended before the command was sent"))?;
            drop(inputs);

            runner.await?
        },
    };

    info!(?outcome, "done");

    Ok(())
}
