use chrono::Utc;
use thiserror::Error;

use super::{AnchorId, AnchorSample};
use crate::constants::TELEMETRY_DELIMITER;

/// Why a telemetry line carried no usable reading
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("empty line")]
    EmptyLine,

    #[error("no '|' delimiter")]
    MissingDelimiter,

    #[error("empty value field")]
    EmptyField,

    #[error("value field is not UTF-8")]
    InvalidEncoding,

    #[error("value field is not a number")]
    InvalidNumber,

    #[error("value is not finite")]
    NonFinite,
}

/// Decode the RSSI from one anchor line
///
/// Lines look like `<anything>|<rssi>\r\n`; the value is the last
/// `|`-separated field. Trailing CR/LF and whitespace around the value are
/// ignored.
///
/// # Example
/// ```
/// use rssitrack::telemetry::parse_rssi;
///
/// assert_eq!(parse_rssi(b"24:6f:28:aa|beacon|-71.5\r\n"), Ok(-71.5));
/// assert!(parse_rssi(b"booting...\r\n").is_err());
/// ```
pub fn parse_rssi(raw: &[u8]) -> Result<f64, ParseFailure> {
    let line = raw.trim_ascii_end();
    if line.is_empty() {
        return Err(ParseFailure::EmptyLine);
    }

    let split = line
        .iter()
        .rposition(|&b| b == TELEMETRY_DELIMITER)
        .ok_or(ParseFailure::MissingDelimiter)?;

    let field = std::str::from_utf8(&line[split + 1..])
        .map_err(|_| ParseFailure::InvalidEncoding)?
        .trim();
    if field.is_empty() {
        return Err(ParseFailure::EmptyField);
    }

    let value: f64 = field.parse().map_err(|_| ParseFailure::InvalidNumber)?;
    if !value.is_finite() {
        return Err(ParseFailure::NonFinite);
    }
    Ok(value)
}

/// [`parse_rssi`] stamped with the anchor and the time of decoding
pub fn parse_sample(anchor: AnchorId, raw: &[u8]) -> Result<AnchorSample, ParseFailure> {
    parse_rssi(raw).map(|rssi| AnchorSample {
        anchor,
        rssi,
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_field_is_value() {
        assert_eq!(parse_rssi(b"1|-76.0\r\n"), Ok(-76.0));
        assert_eq!(parse_rssi(b"a|b|c|-80\n"), Ok(-80.0));
        assert_eq!(parse_rssi(b"|-60.25"), Ok(-60.25));
        assert_eq!(parse_rssi(b"id| -55 \r\n"), Ok(-55.0));
    }

    #[test]
    fn test_exact_value_preserved() {
        for v in [-76.0, -99.125, -40.000_001, 0.0, 12.5e-3] {
            let line = format!("anchor|{}\r\n", v);
            assert_eq!(parse_rssi(line.as_bytes()), Ok(v));
        }
    }

    #[test]
    fn test_failures() {
        assert_eq!(parse_rssi(b""), Err(ParseFailure::EmptyLine));
        assert_eq!(parse_rssi(b"\r\n"), Err(ParseFailure::EmptyLine));
        assert_eq!(parse_rssi(b"-76.0\r\n"), Err(ParseFailure::MissingDelimiter));
        assert_eq!(parse_rssi(b"id|\r\n"), Err(ParseFailure::EmptyField));
        assert_eq!(parse_rssi(b"id|ack\r\n"), Err(ParseFailure::InvalidNumber));
        assert_eq!(parse_rssi(b"id|NaN\r\n"), Err(ParseFailure::NonFinite));
        assert_eq!(parse_rssi(b"id|\xff\xfe"), Err(ParseFailure::InvalidEncoding));
    }

    #[test]
    fn test_sample_carries_anchor() {
        let anchor = AnchorId::new(2).unwrap();
        let sample = parse_sample(anchor, b"x|-70").unwrap();
        assert_eq!(sample.anchor, anchor);
        assert_eq!(sample.rssi, -70.0);
    }
}
