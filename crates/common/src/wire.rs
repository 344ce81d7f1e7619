//! Downstream publish record
//!
//! One record per message: `name|bid|ask|timestamp`, prices with six decimals,
//! timestamp as RFC 3339 UTC with millisecond precision, e.g.
//!
//! ```text
//! EURTRY|37.123456|37.223456|2024-05-01T12:00:00.123Z
//! ```

use crate::error::{Error, Result};
use crate::rate::Rate;
use chrono::{DateTime, SecondsFormat, Utc};

const FIELD_COUNT: usize = 4;

/// A record as seen by a downstream consumer
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedRecord {
    pub name: String,
    pub bid: f64,
    pub ask: f64,
    /// Epoch milliseconds
    pub timestamp: i64,
}

/// Encode a rate into its publish record, using the rate's own timestamp
pub fn encode_record(rate: &Rate) -> Result<String> {
    let ts = rate
        .fields
        .timestamp_utc()
        .ok_or_else(|| Error::InvalidTimestamp(rate.fields.timestamp.to_string()))?;

    Ok(format!(
        "{}|{:.6}|{:.6}|{}",
        rate.name,
        rate.fields.bid,
        rate.fields.ask,
        ts.to_rfc3339_opts(SecondsFormat::Millis, true)
    ))
}

/// Parse a publish record
pub fn decode_record(record: &str) -> Result<PublishedRecord> {
    let parts: Vec<&str> = record.trim_end().split('|').collect();
    if parts.len() != FIELD_COUNT {
        return Err(Error::invalid_record(
            record,
            format!("expected {} fields, got {}", FIELD_COUNT, parts.len()),
        ));
    }

    let name = parts[0].trim();
    if name.is_empty() {
        return Err(Error::invalid_record(record, "empty rate name"));
    }

    let bid = parse_price(record, parts[1], "bid")?;
    let ask = parse_price(record, parts[2], "ask")?;
    let timestamp = DateTime::parse_from_rfc3339(parts[3].trim())
        .map_err(|e| Error::InvalidTimestamp(format!("{}: {}", parts[3], e)))?
        .with_timezone(&Utc)
        .timestamp_millis();

    Ok(PublishedRecord {
        name: name.to_string(),
        bid,
        ask,
        timestamp,
    })
}

fn parse_price(record: &str, raw: &str, field: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| Error::invalid_record(record, format!("{} '{}': {}", field, raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::RateFields;
    use assert_matches::assert_matches;

    #[test]
    fn test_encode_format() {
        let rate = Rate::updated("EURTRY", RateFields::new(37.1, 37.2, 1_714_564_800_123));
        let record = encode_record(&rate).unwrap();
        assert_eq!(record, "EURTRY|37.100000|37.200000|2024-05-01T12:00:00.123Z");
    }

    #[test]
    fn test_published_record_reconstructs_rate() {
        let rate = Rate::calculated("USDTRY", 32.456789, 32.567891);
        let decoded = decode_record(&encode_record(&rate).unwrap()).unwrap();

        assert_eq!(decoded.name, rate.name);
        assert!((decoded.bid - rate.fields.bid).abs() < 1e-6);
        assert!((decoded.ask - rate.fields.ask).abs() < 1e-6);
        assert_eq!(decoded.timestamp, rate.fields.timestamp);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert_matches!(decode_record("USDTRY|1.0|2.0"), Err(Error::InvalidRecord { .. }));
        assert_matches!(
            decode_record("USDTRY|abc|2.0|2024-05-01T12:00:00Z"),
            Err(Error::InvalidRecord { .. })
        );
        assert_matches!(
            decode_record("USDTRY|1.0|2.0|yesterday"),
            Err(Error::InvalidTimestamp(_))
        );
        assert_matches!(
            decode_record("|1.0|2.0|2024-05-01T12:00:00Z"),
            Err(Error::InvalidRecord { .. })
        );
    }
}
