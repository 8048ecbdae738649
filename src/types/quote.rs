#![allow(missing_docs)]
//! Quote types: live stream updates and page snapshots.

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Raw wire record
// ---------------------------------------------------------------------------

/// Quote fields as they appear on the wire, before any derivation.
///
/// The stream sends numbers either as JSON numbers or as strings (`"27,500"`
/// once thousands separators are stripped becomes `"27500"`). Absent, `null`,
/// or empty fields are kept as `None`, never zero.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawQuote {
    /// Instrument id.
    #[serde(deserialize_with = "de_id")]
    pub pid: u64,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub bid: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub ask: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub last: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub high: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub low: Option<f64>,
    /// Turnover as a plain number (the `turnover` field is abbreviated text).
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub turnover_numeric: Option<f64>,
    /// Baseline the change is measured against.
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub pc: Option<f64>,
    /// Event time, seconds since the Unix epoch.
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub timestamp: Option<i64>,
}

// ---------------------------------------------------------------------------
// Decoded quote
// ---------------------------------------------------------------------------

/// One real-time price update for an instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    /// Instrument id (the subscription key).
    pub instrument_id: u64,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub last: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    /// `last - previous_close`, absent when either side is missing.
    pub change: Option<f64>,
    pub turnover: Option<f64>,
    /// Baseline reported by the server.
    pub previous_close: Option<f64>,
    /// Event time, seconds since the Unix epoch.
    pub timestamp: Option<i64>,
    /// `timestamp` as a UTC date-time.
    pub datetime: Option<DateTime<Utc>>,
}

impl Quote {
    /// Build a quote, deriving `change` and `datetime`.
    ///
    /// `change` is always recomputed as `last - previous_close`; it is `None`
    /// whenever `last` or `previous_close` is missing.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instrument_id: u64,
        bid: Option<f64>,
        ask: Option<f64>,
        last: Option<f64>,
        high: Option<f64>,
        low: Option<f64>,
        turnover: Option<f64>,
        previous_close: Option<f64>,
        timestamp: Option<i64>,
    ) -> Self {
        let change = match (last, previous_close) {
            (Some(last), Some(pc)) => Some(last - pc),
            _ => None,
        };
        let datetime = timestamp.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));

        Self {
            instrument_id,
            bid,
            ask,
            last,
            high,
            low,
            change,
            turnover,
            previous_close,
            timestamp,
            datetime,
        }
    }
}

impl From<RawQuote> for Quote {
    fn from(raw: RawQuote) -> Self {
        Self::new(
            raw.pid,
            raw.bid,
            raw.ask,
            raw.last,
            raw.high,
            raw.low,
            raw.turnover_numeric,
            raw.pc,
            raw.timestamp,
        )
    }
}

/// A quote labelled with the caller's display alias for its instrument.
///
/// The instrument id remains the addressable key; the alias is carried
/// alongside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AliasedQuote {
    /// Display alias registered for `quote.instrument_id`.
    pub alias: String,
    #[serde(flatten)]
    pub quote: Quote,
}

impl std::ops::Deref for AliasedQuote {
    type Target = Quote;

    fn deref(&self) -> &Quote {
        &self.quote
    }
}

// ---------------------------------------------------------------------------
// Lenient number parsing
// ---------------------------------------------------------------------------

/// Parse a numeric field that may arrive as a number, a numeric string, an
/// empty string, or `null`.
fn number_from_value<E: de::Error>(value: Option<Value>) -> Result<Option<f64>, E> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<f64>()
                .map(Some)
                .map_err(|_| E::custom(format!("invalid number `{s}`")))
        }
        Some(other) => Err(E::custom(format!("expected a number, found `{other}`"))),
    }
}

fn de_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    number_from_value(Option::<Value>::deserialize(d)?)
}

fn de_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    if let Some(Value::Number(n)) = &value {
        if let Some(ts) = n.as_i64() {
            return Ok(Some(ts));
        }
    }
    Ok(number_from_value::<D::Error>(value)?.map(|ts| ts.trunc() as i64))
}

fn de_id<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| de::Error::custom(format!("invalid instrument id `{n}`"))),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| de::Error::custom(format!("invalid instrument id `{s}`"))),
        other => Err(de::Error::custom(format!(
            "expected an instrument id, found `{other}`"
        ))),
    }
}
