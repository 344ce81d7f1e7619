//! Upstream wire formats
//!
//! TCP feed, one record per line:
//!
//! ```text
//! PF1_USDTRY|22:number:34.736673|25:number:35.736673|5:timestamp:2024-05-01T12:00:00.123Z
//! ```
//!
//! Each value is the third `:`-separated part of its segment, so ISO timestamps
//! keep their colons. Lines without `|` are control messages.
//!
//! REST feed, one JSON body per instrument:
//!
//! ```text
//! {"rateName":"PF2_USDTRY","bid":34.1,"ask":34.2,"timestamp":"2024-05-01T12:00:00.123Z"}
//! ```

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use common::RateFields;
use serde::Deserialize;

use crate::error::WireError;

const TCP_FIELD_COUNT: usize = 4;
const SEGMENT_PARTS: usize = 3;

/// One parsed quote
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub rate_name: String,
    pub fields: RateFields,
}

/// A line read from the TCP feed
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamLine {
    Tick(Tick),
    /// Acknowledgements and other non-data messages
    Control(String),
}

pub fn subscribe_command(rate_name: &str) -> String {
    format!("subscribe|{}\n", rate_name)
}

pub fn unsubscribe_command(rate_name: &str) -> String {
    format!("unsubscribe|{}\n", rate_name)
}

/// Parse one line of the TCP feed
pub fn parse_tcp_line(line: &str) -> Result<UpstreamLine, WireError> {
    let line = line.trim();
    if !line.contains('|') {
        return Ok(UpstreamLine::Control(line.to_string()));
    }

    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() < TCP_FIELD_COUNT {
        return Err(WireError::TooFewFields {
            expected: TCP_FIELD_COUNT,
            got: fields.len(),
        });
    }

    let rate_name = fields[0].trim();
    if rate_name.is_empty() {
        return Err(WireError::EmptyName);
    }

    let bid = parse_price("bid", segment_value(fields[1])?)?;
    let ask = parse_price("ask", segment_value(fields[2])?)?;
    let timestamp = parse_timestamp(segment_value(fields[3])?)?;

    Ok(UpstreamLine::Tick(Tick {
        rate_name: rate_name.to_string(),
        fields: RateFields::new(bid, ask, timestamp),
    }))
}

/// `id:type:value` -> `value`
fn segment_value(segment: &str) -> Result<&str, WireError> {
    let parts: Vec<&str> = segment.splitn(SEGMENT_PARTS, ':').collect();
    match parts.as_slice() {
        [_, _, value] if !value.trim().is_empty() => Ok(value.trim()),
        _ => Err(WireError::BadSegment(segment.to_string())),
    }
}

fn parse_price(field: &'static str, value: &str) -> Result<f64, WireError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| WireError::BadNumber {
            field,
            value: value.to_string(),
        })
}

/// RFC 3339 timestamp to epoch milliseconds.
///
/// A timestamp without an offset (`2024-05-01T12:00:00.123`) is read as UTC.
pub fn parse_timestamp(value: &str) -> Result<i64, WireError> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive).timestamp_millis())
        .map_err(|_| WireError::BadTimestamp(value.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestQuote {
    #[serde(default)]
    rate_name: Option<String>,
    bid: f64,
    ask: f64,
    timestamp: String,
}

/// Parse a REST body returned for `requested`
pub fn parse_rest_body(body: &str, requested: &str) -> Result<Tick, WireError> {
    let quote: RestQuote = serde_json::from_str(body).map_err(|e| WireError::Json(e.to_string()))?;

    if let Some(name) = quote.rate_name.as_deref() {
        if name != requested {
            return Err(WireError::NameMismatch {
                expected: requested.to_string(),
                got: name.to_string(),
            });
        }
    }
    if !quote.bid.is_finite() {
        return Err(WireError::BadNumber {
            field: "bid",
            value: quote.bid.to_string(),
        });
    }
    if !quote.ask.is_finite() {
        return Err(WireError::BadNumber {
            field: "ask",
            value: quote.ask.to_string(),
        });
    }

    Ok(Tick {
        rate_name: requested.to_string(),
        fields: RateFields::new(quote.bid, quote.ask, parse_timestamp(&quote.timestamp)?),
    })
}
