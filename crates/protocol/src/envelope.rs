//! Channel-prefixed frames.
//!
//! Every payload on the socket is `"<channel>:" + JSON`. Receivers drop any
//! frame whose prefix is not the channel they subscribed to.

use serde::Serialize;
use serde_json::Value;

use crate::messages::{ClientMessage, ServerMessage};
use crate::ProtocolError;

/// Serialize `message` and prefix it with `channel`.
pub fn encode<T: Serialize>(channel: &str, message: &T) -> Result<String, ProtocolError> {
    let body = serde_json::to_string(message)?;
    Ok(format!("{channel}:{body}"))
}

/// Strip the `"<channel>:"` marker, returning the JSON body.
pub fn strip_channel<'a>(channel: &str, frame: &'a str) -> Result<&'a str, ProtocolError> {
    frame
        .strip_prefix(channel)
        .and_then(|rest| rest.strip_prefix(':'))
        .ok_or_else(|| ProtocolError::WrongChannel {
            expected: channel.to_string(),
        })
}

/// Read the `type` tag without committing to a message shape.
fn message_type(body: &Value) -> Result<&str, ProtocolError> {
    body.get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)
}

/// Decode a server -> client frame received on `channel`.
///
/// Unknown message types are reported as [`ProtocolError::UnknownType`] so
/// the caller can log and ignore them.
pub fn decode_server(channel: &str, frame: &str) -> Result<ServerMessage, ProtocolError> {
    let body: Value = serde_json::from_str(strip_channel(channel, frame)?)?;
    let kind = message_type(&body)?;
    if !ServerMessage::TYPES.contains(&kind) {
        return Err(ProtocolError::UnknownType(kind.to_string()));
    }
    Ok(serde_json::from_value(body)?)
}

/// Decode a client -> server frame (chat is rebroadcast to peers verbatim).
pub fn decode_client(channel: &str, frame: &str) -> Result<ClientMessage, ProtocolError> {
    let body: Value = serde_json::from_str(strip_channel(channel, frame)?)?;
    let kind = message_type(&body)?;
    if !ClientMessage::TYPES.contains(&kind) {
        return Err(ProtocolError::UnknownType(kind.to_string()));
    }
    Ok(serde_json::from_value(body)?)
}
