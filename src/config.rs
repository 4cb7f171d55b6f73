use const_format::concatcp;
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::{connect_async, tungstenite::{self, Message}, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

/// Path of the controller's websocket endpoint
pub const WS_PATH: &str = "/ws";

pub const DEFAULT_HOST: &str = "daikin.local";
pub const DEFAULT_ENDPOINT: &str = concatcp!("ws://", DEFAULT_HOST, WS_PATH);


/// A frame as seen by the session. Pings and pongs are handled by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close,
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("url scheme {0} not supported, expected ws or wss")]
    UnsupportedScheme(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error(transparent)]
    WebSocket(#[from] tungstenite::Error),
}


pub trait ChannelStream: Stream<Item = Result<Frame, ChannelError>> + Sink<String, Error = ChannelError> + Send + Unpin {}

impl<T> ChannelStream for T
where
    T: Stream<Item = Result<Frame, ChannelError>> + Sink<String, Error = ChannelError> + Send + Unpin,
{}


/// Endpoint of the controller at `host` (optionally `host:port`).
pub fn endpoint_for_host(host: &str) -> Result<Url, ChannelError> {
    Ok(Url::parse(&format!("ws://{host}{WS_PATH}"))?)
}

/// Accepts either a full `ws://` / `wss://` URL or a bare host.
pub fn parse_endpoint(text: &str) -> Result<Url, ChannelError> {
    if !text.contains("://") {
        return endpoint_for_host(text);
    }

    let url = Url::parse(text)?;
    check_scheme(&url)?;

    Ok(url)
}

fn check_scheme(url: &Url) -> Result<(), ChannelError> {
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(ChannelError::UnsupportedScheme(other.to_string())),
    }
}

/// Connect to the controller.
pub async fn open(url: &Url) -> Result<Box<dyn ChannelStream>, ChannelError> {
    check_scheme(url)?;

    let (stream, response) = connect_async(url.as_str()).await?;
    debug!(status = %response.status(), "websocket handshake with {url} complete");

    Ok(Box::new(framed(stream)))
}

/// Text-only view of a websocket, used on both ends of the connection.
pub fn framed<T>(stream: WebSocketStream<T>) -> impl ChannelStream
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    stream
        .sink_map_err(ChannelError::from)
        .with(|text: String| future::ready(Ok::<_, ChannelError>(Message::Text(text))))
        .filter_map(|message| future::ready(match message {
            Ok(Message::Text(text)) => Some(Ok(Frame::Text(text))),
            Ok(Message::Close(_)) => Some(Ok(Frame::Close)),
            Ok(Message::Binary(data)) => {
                warn!(len = data.len(), "ignoring binary frame");
                None
            },
            Ok(_) => None,
            Err(err) => Some(Err(ChannelError::from(err))),
        }))
}
