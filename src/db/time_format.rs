//! Conversion between stored timestamp text and in-memory instants.
//!
//! The alerts table stores `triggered_at` as text, and the way instants
//! were serialized has changed over the life of the schema. Rows written
//! by older builds may carry a space instead of a `T` separator, omit
//! fractional seconds, or omit the UTC offset entirely, so the read path
//! has to try every encoding that has ever been written.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use thiserror::Error;

/// How a format entry carries zone information.
#[derive(Debug, Clone, Copy)]
enum Zone {
    /// Explicit UTC offset in the text
    Offset,
    /// No zone in the text; read as UTC
    Naive,
}

/// One recognized textual encoding of a stored instant.
#[derive(Debug, Clone, Copy)]
struct TimeFormat {
    pattern: &'static str,
    zone: Zone,
}

/// Known encodings, most specific first. Decoding tries them in order and
/// keeps the first format's error when all of them fail. New historical
/// encodings get appended here; the decode logic stays untouched.
const FORMATS: &[TimeFormat] = &[
    TimeFormat { pattern: "%Y-%m-%d %H:%M:%S%.f%:z", zone: Zone::Offset },
    TimeFormat { pattern: "%Y-%m-%dT%H:%M:%S%.f%:z", zone: Zone::Offset },
    TimeFormat { pattern: "%Y-%m-%d %H:%M:%S%:z", zone: Zone::Offset },
    TimeFormat { pattern: "%Y-%m-%dT%H:%M:%S%:z", zone: Zone::Offset },
    TimeFormat { pattern: "%Y-%m-%d %H:%M:%S", zone: Zone::Naive },
    TimeFormat { pattern: "%Y-%m-%dT%H:%M:%S", zone: Zone::Naive },
];

/// A stored timestamp that no known encoding could decode.
#[derive(Error, Debug, Clone)]
#[error("unrecognized timestamp {text:?}: {source}")]
pub struct TimestampParseError {
    /// The original stored text
    pub text: String,
    /// Error from the first (most specific) attempted format
    #[source]
    pub source: chrono::ParseError,
}

/// Decode a stored timestamp, trying each known encoding in order.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, TimestampParseError> {
    let mut first_err: Option<chrono::ParseError> = None;

    for format in FORMATS {
        let parsed = match format.zone {
            Zone::Offset => DateTime::parse_from_str(text, format.pattern)
                .map(|instant| instant.with_timezone(&Utc)),
            Zone::Naive => NaiveDateTime::parse_from_str(text, format.pattern)
                .map(|instant| DateTime::from_naive_utc_and_offset(instant, Utc)),
        };

        match parsed {
            Ok(instant) => return Ok(instant),
            Err(err) => {
                first_err.get_or_insert(err);
            }
        }
    }

    Err(TimestampParseError {
        text: text.to_string(),
        // FORMATS is non-empty, so at least one attempt was recorded
        source: first_err.expect("no formats attempted"),
    })
}

/// Encode an instant in the current canonical format (RFC 3339 with
/// nanoseconds and an explicit offset).
pub fn format_timestamp(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Nanos, false)
}
