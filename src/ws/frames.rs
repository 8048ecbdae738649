//! Outbound control frames.
//!
//! The server expects each control message as a JSON object that is then
//! wrapped as a JSON string literal: the object's text surrounded by double
//! quotes, with its inner quotes backslash-escaped.

use serde::Serialize;

use crate::constants::stream::TZ_ID;
use crate::error::Result;

/// A control message sent to the stream server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlFrame {
    #[serde(rename = "_event")]
    event: &'static str,
    #[serde(rename = "tzID", skip_serializing_if = "Option::is_none")]
    tz_id: Option<u8>,
    message: String,
}

impl ControlFrame {
    /// Start receiving updates for an instrument.
    pub fn subscribe(instrument_id: u64) -> Self {
        Self {
            event: "subscribe",
            tz_id: Some(TZ_ID),
            message: format!("pid-{instrument_id}:"),
        }
    }

    /// Stop receiving updates for an instrument.
    pub fn unsubscribe(instrument_id: u64) -> Self {
        Self {
            event: "unsubscribe",
            tz_id: Some(TZ_ID),
            message: format!("pid-{instrument_id}:"),
        }
    }

    /// Keep-alive.
    pub fn heartbeat() -> Self {
        Self {
            event: "heartbeat",
            tz_id: None,
            message: "h".to_owned(),
        }
    }

    /// The `_event` name.
    pub fn event(&self) -> &str {
        self.event
    }

    /// Serialize to the text sent on the socket.
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(format!("\"{}\"", json.replace('"', "\\\"")))
    }
}
