//! Inbound frame decoder.
//!
//! Frames of interest look like
//!
//! ```text
//! a["{\"message\":\"pid-8873::{\\\"pid\\\":\\\"8873\\\",\\\"last\\\":\\\"27,500\\\",...}\"}"]
//! ```
//!
//! i.e. an `a`-prefixed array whose single element is an escaped JSON
//! document, whose `message` in turn carries `pid-{id}::` followed by the
//! escaped quote record. Rather than unwrapping each layer, the decoder
//! flattens the escaping and cuts the record out of the middle:
//!
//! 1. drop every `\` and `%`,
//! 2. strip thousands separators (`,` not followed by `"`),
//! 3. keep what lies after the first `::`, minus the 4 closing characters.
//!
//! The result is parsed as a [`RawQuote`]. The cleanup rules are the wire
//! compatibility contract and stay confined to this module.

use crate::constants::stream::{ENVELOPE_MARKER, ENVELOPE_TRAILER_LEN, PAYLOAD_DELIMITER};
use crate::error::{InvestingError, Result};
use crate::types::quote::{Quote, RawQuote};

/// Classification of one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A price update.
    Quote(Quote),
    /// The server acknowledged a keep-alive.
    Heartbeat,
    /// Anything else (open/handshake frames, unrelated channels).
    Unrecognized,
}

/// Decode one text frame.
///
/// Frames that do not start with the envelope marker, and enveloped frames
/// mentioning neither `pid` nor `heartbeat`, are [`Frame::Unrecognized`].
/// A quote frame that cannot be decoded yields [`InvestingError::Decode`].
pub fn decode(text: &str) -> Result<Frame> {
    if !text.starts_with(ENVELOPE_MARKER) {
        return Ok(Frame::Unrecognized);
    }

    if text.contains("pid") {
        let raw = decode_quote(text)?;
        Ok(Frame::Quote(raw.into()))
    } else if text.contains("heartbeat") {
        Ok(Frame::Heartbeat)
    } else {
        Ok(Frame::Unrecognized)
    }
}

/// Extract and parse the quote record of an enveloped frame.
pub fn decode_quote(text: &str) -> Result<RawQuote> {
    let normalized = normalize(text);
    let payload = payload(&normalized)?;

    serde_json::from_str(payload)
        .map_err(|e| InvestingError::Decode(format!("invalid quote record: {e}")))
}

/// Flatten the escaping and strip thousands separators.
///
/// `,"` marks a structural comma (the next key or value starts with a
/// quote); it is parked as `;"` while every other comma is dropped.
pub fn normalize(text: &str) -> String {
    text.replace('\\', "")
        .replace('%', "")
        .replace(",\"", ";\"")
        .replace(',', "")
        .replace(";\"", ",\"")
}

/// The record between the first `::` and the closing envelope characters.
fn payload(normalized: &str) -> Result<&str> {
    let start = normalized
        .find(PAYLOAD_DELIMITER)
        .map(|i| i + PAYLOAD_DELIMITER.len())
        .ok_or_else(|| InvestingError::Decode("missing `::` payload delimiter".into()))?;
    let end = normalized
        .len()
        .checked_sub(ENVELOPE_TRAILER_LEN)
        .filter(|end| *end >= start)
        .ok_or_else(|| InvestingError::Decode("frame too short for its envelope".into()))?;

    normalized
        .get(start..end)
        .ok_or_else(|| InvestingError::Decode("envelope cut inside a character".into()))
}
