use std::time::SystemTime;

use anyhow::{Context, Result};
use clap::Parser;
use colored::{ColoredString, Colorize};
use daikinws::{
    config::{self, parse_endpoint, Frame, DEFAULT_HOST},
    protocol::{codec::decode, telemetry::MessageType},
    trace::init_tracing,
};
use futures::StreamExt;


/// Print every frame the controller sends, with timing and how it decodes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Controller host (optionally host:port), or a full ws:// or wss:// URL
    #[arg(default_value = DEFAULT_HOST)]
    endpoint: String,

    /// Only print frames that fail to decode
    #[arg(long)]
    errors_only: bool,
}

fn delta_ms(since: Option<SystemTime>) -> u128 {
    since
        .and_then(|since| since.elapsed().ok())
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0)
}

fn coloured(kind: MessageType, line: String) -> ColoredString {
    match kind {
        MessageType::Sensor => line.green(),
        MessageType::Config => line.cyan(),
        MessageType::Rssi => line.dimmed(),
        MessageType::StartTime => line.purple(),
        MessageType::Info => line.blue(),
    }
}


#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();

    let endpoint = parse_endpoint(&args.endpoint)
        .with_context(|| format!("invalid endpoint {}", args.endpoint))?;

    let mut channel = config::open(&endpoint).await
        .with_context(|| format!("failed to connect to {endpoint}"))?;

    eprintln!("connected to {endpoint}");

    let start_time = SystemTime::now();
    let mut last_frame_time: Option<SystemTime> = None;

    while let Some(frame) = channel.next().await {
        let start_delta_ms = delta_ms(Some(start_time));
        let last_frame_delta_ms = delta_ms(last_frame_time);
        last_frame_time = Some(SystemTime::now());

        let text = match frame.context("connection error")? {
            Frame::Text(text) => text,
            Frame::Close => {
                println!("{}", format!("[{start_delta_ms:8}, {last_frame_delta_ms:8}] closed by controller").on_red().bright_white());
                break;
            },
        };

        match decode(&text) {
            Ok(message) if !args.errors_only => {
                let kind = message.kind();
                let line = format!("[{start_delta_ms:8}, {last_frame_delta_ms:8}] {kind: <10} {text}");
                println!("{}", coloured(kind, line));
            },
            Ok(_) => {},
            Err(err) => {
                let line = format!("[{start_delta_ms:8}, {last_frame_delta_ms:8}] {err}: {text}");
                println!("{}", line.on_red().bright_white());
            },
        }
    }

    Ok(())
}
