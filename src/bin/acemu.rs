use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use daikinws::{
    client::unix_now,
    config::WS_PATH,
    emulator::{serve, Device, DeviceHandle},
    trace::init_tracing,
};
use futures::StreamExt;
use tokio::net::TcpListener;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{info, warn};

/// Emulator for the Daikin websocket controller
///
/// Serves the controller's websocket on `/ws`. Lines on stdin edit the
/// emulated unit, e.g. `inside 243`, `mode 51`, `fan A`, `power off`, `rssi -71` or
/// `restart`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(default_value = "127.0.0.1:8080")]
    listen: SocketAddr,
}


#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();

    let listener = TcpListener::bind(args.listen).await
        .with_context(|| format!("failed to listen on {}", args.listen))?;

    info!("listening on ws://{}{WS_PATH}", listener.local_addr()?);

    let device = DeviceHandle::spawn(Device::new(unix_now()));

    tokio::spawn(edit_from_stdin(device.clone()));

    serve(listener, device).await
}

async fn edit_from_stdin(device: DeviceHandle) {
    let mut lines = FramedRead::new(tokio::io::stdin(), LinesCodec::new());

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("stdin: {err}");
                break;
            },
        };

        if line.trim().is_empty() {
            continue;
        }

        if device.edit(line).await.is_err() {
            break;
        }
    }
}
