//! Shared types: connection identity, the inbound mouse event and the
//! crate-wide error.

use std::fmt::Display;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Prefix of the synthetic keepalive payload, `"ping <unix-seconds>"`.
pub const KEEPALIVE_PREFIX: &str = "ping";

/// Identity of a registered connection.
///
/// Issued by the [`Pool`](crate::pool::Pool) at registration time. It is
/// unrelated to the `clientId` a browser puts in its own payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl ConnectionId {
    /// Returns the raw numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A cursor position reported by a client.
///
/// Only used to validate inbound frames. The frame that gets rebroadcast is
/// always the raw text the client sent, extra fields included.
///
/// Decoding is lenient: keys match case-insensitively, missing or `null`
/// fields default to zero and a bare `null` payload is an all-zero event.
/// Anything that is not a JSON object, or a field of the wrong type, is
/// rejected.
///
/// ## Wire format
///
/// ```json
/// { "clientId": 1, "x": 10.5, "y": 20.25 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MouseEvent {
    /// Id chosen by the client.
    #[serde(rename = "clientid")]
    pub client_id: i64,
    /// Horizontal position, sub-pixel precision allowed.
    pub x: f64,
    /// Vertical position, sub-pixel precision allowed.
    pub y: f64,
}

impl MouseEvent {
    /// Decodes a raw payload.
    pub fn parse(raw: &str) -> Result<Self> {
        let fields: Option<Map<String, Value>> = serde_json::from_str(raw)?;
        let Some(fields) = fields else {
            return Ok(Self::default());
        };

        let folded: Map<String, Value> = fields
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.to_lowercase(), value))
            .collect();

        Ok(serde_json::from_value(Value::Object(folded))?)
    }
}

/// Builds the keepalive payload for the given unix timestamp.
pub fn keepalive_payload(unix_seconds: u64) -> String {
    format!("{KEEPALIVE_PREFIX} {unix_seconds}")
}

/// Errors produced by the relay.
#[derive(Debug, Error)]
pub enum MultimouseError {
    /// The listener could not bind its address. Fatal for the process.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Transport level failure on a single connection.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// An inbound payload was not a valid mouse event.
    #[error("malformed mouse event: {0}")]
    Decode(#[from] serde_json::Error),

    /// A client did not take a broadcast frame in time.
    #[error("send timed out after {0:?}")]
    SendTimeout(std::time::Duration),

    /// The broadcaster has stopped and no longer drains the channel.
    #[error("broadcast channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, MultimouseError>;
