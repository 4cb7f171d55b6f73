use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

use super::commands::Command;
use super::telemetry::{MessageType, Telemetry};


/// Reasons an inbound text frame is dropped.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed message: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("message has no `type` discriminant")]
    MissingType,

    #[error("unknown message type `{0}`")]
    UnknownType(String),

    #[error("invalid `{kind}` message: {source}")]
    InvalidPayload {
        kind: MessageType,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid `{kind}` message: {reason}")]
    Rejected {
        kind: MessageType,
        reason: &'static str,
    },
}

impl DecodeError {
    /// Message type of the dropped message, if it got far enough to tell
    pub fn kind(&self) -> Option<MessageType> {
        match self {
            DecodeError::InvalidPayload { kind, .. } | DecodeError::Rejected { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Decode one inbound text frame.
///
/// Fails closed: the whole payload is validated against the schema of its
/// type before anything is returned, so a caller never sees half a message.
pub fn decode(text: &str) -> Result<Telemetry, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(DecodeError::Malformed)?;

    let kind = {
        let object = value.as_object().ok_or(DecodeError::NotAnObject)?;

        let tag = object.get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingType)?;

        MessageType::from_str(tag).map_err(|_| DecodeError::UnknownType(tag.to_string()))?
    };

    serde_json::from_value(value).map_err(|source| DecodeError::InvalidPayload { kind, source })
}

/// Encode a command as a text frame.
pub fn encode(command: &Command) -> Result<String, serde_json::Error> {
    serde_json::to_string(command)
}

/// Encode a device message as a text frame. Used by the emulator.
pub fn encode_telemetry(message: &Telemetry) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}
