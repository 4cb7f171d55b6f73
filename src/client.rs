//! Drives a [Session] over a websocket connection.

use std::{future, pin::Pin};

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{
    sync::mpsc,
    time::{interval_at, sleep, Instant, MissedTickBehavior, Sleep},
};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    config::{self, ChannelStream, Frame},
    encoder::UiEvent,
    session::{Outcome, Session},
    sink::{ProjectionSink, Prompt},
    uptime::UPTIME_REFRESH,
};

/// Something the user interface wants done.
#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    Event(UiEvent),

    /// A command object built outside the encoder
    Raw(Value),
}

impl From<UiEvent> for Input {
    fn from(event: UiEvent) -> Self {
        Input::Event(event)
    }
}

/// Current unix time in seconds
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Run one session to completion.
///
/// Everything happens on the calling task: inbound frames, UI input, the
/// uptime refresh and a pending reload are handled one at a time. A failed
/// connection attempt ends the session the same way a dropped connection does.
///
/// Returns once the connection is gone, the reload delay after a device reset
/// has run out, or `inputs` has been closed.
pub async fn run_session<S, P>(endpoint: &Url, session: &mut Session<S, P>, inputs: &mut mpsc::Receiver<Input>) -> Result<Outcome>
where
    S: ProjectionSink,
    P: Prompt,
{
    info!("connecting to {endpoint}");

    let mut channel = match config::open(endpoint).await {
        Ok(channel) => channel,
        Err(err) => {
            warn!("failed to connect to {endpoint}: {err}");
            return Ok(session.on_close());
        }
    };

    session.on_open();
    info!("connected to {endpoint}");

    let mut uptime = interval_at(Instant::now() + UPTIME_REFRESH, UPTIME_REFRESH);
    uptime.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut reload: Option<Pin<Box<Sleep>>> = None;
    let mut inputs_open = true;

    loop {
        tokio::select! {
            frame = channel.next() => match frame {
                Some(Ok(Frame::Text(text))) => {
                    session.on_text(&text, unix_now());
                },
                Some(Ok(Frame::Close)) | None => {
                    info!("connection closed by the controller");
                    break;
                },
                Some(Err(err)) => {
                    warn!("connection error: {err}");
                    break;
                },
            },

            input = inputs.recv(), if inputs_open => match input {
                Some(Input::Event(event)) => {
                    session.on_ui_event(event);
                },
                Some(Input::Raw(command)) => {
                    if let Err(err) = session.submit_raw(command) {
                        warn!("raw command rejected: {err}");
                    }
                },
                None => {
                    debug!("ui input closed");
                    inputs_open = false;

                    // with a device reset in progress, wait for the reload
                    if reload.is_none() {
                        flush(&mut channel, session).await;
                        let _ = channel.close().await;
                        return Ok(session.finish(Outcome::Exit));
                    }
                },
            },

            _ = uptime.tick() => {
                session.on_tick(unix_now());
            },

            _ = reload_due(&mut reload) => {
                info!("reloading after device reset");
                let _ = channel.close().await;
                return Ok(session.on_reload_due());
            },
        }

        if !flush(&mut channel, session).await {
            break;
        }

        if let Some(delay) = session.take_reload() {
            debug!(?delay, "reload scheduled");
            reload = Some(Box::pin(sleep(delay)));
        }
    }

    Ok(session.on_close())
}

/// Write out everything the session has queued. Returns `false` if the
/// connection failed.
async fn flush<S, P>(channel: &mut Box<dyn ChannelStream>, session: &mut Session<S, P>) -> bool
where
    S: ProjectionSink,
    P: Prompt,
{
    for outbound in session.take_outbound() {
        debug!(?outbound, "send");

        let text = match outbound.to_text() {
            Ok(text) => text,
            Err(err) => {
                error!("failed to encode {outbound:?}: {err}");
                continue;
            }
        };

        if let Err(err) = channel.send(text).await {
            warn!("send failed: {err}");
            return false;
        }
    }

    true
}

async fn reload_due(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(timer) => timer.as_mut().await,
        None => future::pending().await,
    }
}
