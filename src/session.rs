//! One connection's worth of client state.
//!
//! A session is created for every connection attempt and thrown away when the
//! connection ends; reloading means building a fresh one. It is driven by a
//! single task (see [crate::client]) and never blocks.

use std::{collections::VecDeque, time::Duration};

use serde_json::Value;
use strum_macros::Display;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    dispatcher::TelemetryDispatcher,
    encoder::{CommandEncoder, Encoded, UiEvent},
    protocol::{codec, commands::Command, telemetry::MessageType},
    sink::{ProjectionSink, Prompt},
    state::Projection,
};

/// Delay between a confirmed device reset and the reload, while the controller reboots
pub const RESET_RELOAD_DELAY: Duration = Duration::from_secs(5);

pub const CONFIRM_RELOAD: &str = "Websocket connection closed!\nReload page?";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// How a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Start over with a new session on a new connection
    Reload,
    Exit,
}

/// A message waiting to be written to the channel.
#[derive(Clone, Debug, PartialEq)]
pub enum Outbound {
    Command(Command),
    Raw(Value),
}

impl Outbound {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        match self {
            Outbound::Command(command) => codec::encode(command),
            Outbound::Raw(value) => serde_json::to_string(value),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RawCommandError {
    #[error("raw command must be a JSON object")]
    NotAnObject,

    #[error("raw command has no string `command` field")]
    MissingCommand,

    #[error("connection is {0}")]
    NotOpen(ConnectionState),
}

pub struct Session<S, P> {
    state: ConnectionState,
    outcome: Option<Outcome>,

    projection: Projection,
    dispatcher: TelemetryDispatcher,
    encoder: CommandEncoder,

    sink: S,
    prompt: P,

    outbox: VecDeque<Outbound>,
    reload_after: Option<Duration>,
}

impl<S: ProjectionSink, P: Prompt> Session<S, P> {
    pub fn new(sink: S, prompt: P) -> Self {
        Self {
            state: ConnectionState::Connecting,
            outcome: None,
            projection: Projection::new(),
            dispatcher: TelemetryDispatcher::new(),
            encoder: CommandEncoder::new(),
            sink,
            prompt,
            outbox: VecDeque::new(),
            reload_after: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// The channel is established. The device starts pushing on its own.
    pub fn on_open(&mut self) {
        match self.state {
            ConnectionState::Connecting => {
                self.state = ConnectionState::Open;
                debug!("session open");
            },
            other => warn!("open event while {other}, ignored"),
        }
    }

    /// An inbound text frame.
    pub fn on_text(&mut self, text: &str, now: i64) -> Option<MessageType> {
        if self.state != ConnectionState::Open {
            debug!(state = %self.state, "inbound message dropped");
            return None;
        }

        self.dispatcher.dispatch_text(text, &mut self.projection, &mut self.sink, now).ok()
    }

    /// A user interaction. Queues at most one command.
    pub fn on_ui_event(&mut self, event: UiEvent) -> Encoded {
        if self.state != ConnectionState::Open {
            info!(state = %self.state, ?event, "ui event dropped");
            return Encoded::Ignored("connection not open");
        }

        let encoded = self.encoder.encode(event, &mut self.projection, &mut self.sink, &mut self.prompt);

        if let Encoded::Send(command) = &encoded {
            if *command == Command::RstDevice {
                self.reload_after = Some(RESET_RELOAD_DELAY);
            }
            self.outbox.push_back(Outbound::Command(command.clone()));
        }

        encoded
    }

    /// Queue an arbitrary command object built by a collaborator.
    pub fn submit_raw(&mut self, command: Value) -> Result<(), RawCommandError> {
        if self.state != ConnectionState::Open {
            return Err(RawCommandError::NotOpen(self.state));
        }

        let object = command.as_object().ok_or(RawCommandError::NotAnObject)?;
        let name = object.get("command")
            .and_then(Value::as_str)
            .ok_or(RawCommandError::MissingCommand)?;

        debug!(name, "raw command queued");
        self.outbox.push_back(Outbound::Raw(command));

        Ok(())
    }

    /// Periodic uptime refresh.
    pub fn on_tick(&mut self, now: i64) -> Option<String> {
        self.dispatcher.tick(&mut self.sink, now)
    }

    /// The channel closed, for whatever reason. Stops the uptime clock, shows
    /// the blocking indicator and asks whether to reload.
    pub fn on_close(&mut self) -> Outcome {
        if let Some(outcome) = self.outcome {
            return outcome;
        }

        self.shutdown();
        self.sink.show_connection_lost();

        let outcome = if self.prompt.confirm(CONFIRM_RELOAD) {
            Outcome::Reload
        } else {
            Outcome::Exit
        };

        info!(?outcome, "connection lost");
        self.outcome = Some(outcome);

        outcome
    }

    /// The delay scheduled after a device reset has run out.
    pub fn on_reload_due(&mut self) -> Outcome {
        self.finish(Outcome::Reload)
    }

    /// Close without asking, e.g. when the UI goes away.
    pub fn finish(&mut self, outcome: Outcome) -> Outcome {
        if let Some(outcome) = self.outcome {
            return outcome;
        }

        self.shutdown();
        self.outcome = Some(outcome);

        outcome
    }

    fn shutdown(&mut self) {
        self.state = ConnectionState::Closed;
        self.dispatcher.stop_clock();

        if !self.outbox.is_empty() {
            debug!(count = self.outbox.len(), "discarding unsent commands");
            self.outbox.clear();
        }
        self.reload_after = None;
    }

    /// Commands queued since the last call, oldest first.
    pub fn take_outbound(&mut self) -> Vec<Outbound> {
        self.outbox.drain(..).collect()
    }

    /// A reload requested since the last call, with its delay.
    pub fn take_reload(&mut self) -> Option<Duration> {
        self.reload_after.take()
    }
}
