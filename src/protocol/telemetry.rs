// src/protocol/telemetry.rs
//
// Board-to-host status lines.
//
// The firmware prints `#|<pot1>|<pot2>|` every 100 ms. Hosts also accept the
// form without the trailing separator. Fields after the second are ignored.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

const MARKER: &str = "#";
const SEPARATOR: char = '|';

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("not a telemetry line (missing '#' marker)")]
    MissingMarker,

    #[error("telemetry field {0} missing")]
    MissingField(usize),

    #[error("telemetry field {index} is not an integer: {text:?}")]
    InvalidField { index: usize, text: String },
}

/// Two analog readings reported by the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Telemetry {
    pub first: i32,
    pub second: i32,
}

impl Telemetry {
    /// Parse a decoded line, e.g. `#|10|20|`. Only the first two fields are read.
    pub fn parse(line: &str) -> Result<Self, TelemetryError> {
        let mut fields = line.trim().split(SEPARATOR);

        if fields.next() != Some(MARKER) {
            return Err(TelemetryError::MissingMarker);
        }

        let first = parse_field(fields.next(), 1)?;
        let second = parse_field(fields.next(), 2)?;

        Ok(Telemetry { first, second })
    }

    /// Clamp a reading into 0..=100 for a progress indicator.
    pub fn percent(value: i32) -> u16 {
        value.clamp(0, 100) as u16
    }
}

impl fmt::Display for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#|{}|{}|", self.first, self.second)
    }
}

fn parse_field(field: Option<&str>, index: usize) -> Result<i32, TelemetryError> {
    let text = match field {
        Some(t) if !t.trim().is_empty() => t.trim(),
        _ => return Err(TelemetryError::MissingField(index)),
    };
    text.parse::<i32>().map_err(|_| TelemetryError::InvalidField {
        index,
        text: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        assert_eq!(
            Telemetry::parse("#|10|20"),
            Ok(Telemetry { first: 10, second: 20 })
        );
    }

    #[test]
    fn test_parse_firmware_trailing_separator() {
        assert_eq!(
            Telemetry::parse("#|0|100|"),
            Ok(Telemetry { first: 0, second: 100 })
        );
        assert_eq!(
            Telemetry::parse("  #|7|8|\r"),
            Ok(Telemetry { first: 7, second: 8 })
        );
    }

    #[test]
    fn test_missing_marker() {
        assert_eq!(Telemetry::parse("10|20"), Err(TelemetryError::MissingMarker));
        assert_eq!(Telemetry::parse(""), Err(TelemetryError::MissingMarker));
        assert_eq!(Telemetry::parse("#10|20"), Err(TelemetryError::MissingMarker));
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(Telemetry::parse("#"), Err(TelemetryError::MissingField(1)));
        assert_eq!(Telemetry::parse("#|5"), Err(TelemetryError::MissingField(2)));
        assert_eq!(Telemetry::parse("#|5||"), Err(TelemetryError::MissingField(2)));
    }

    #[test]
    fn test_invalid_field() {
        assert_eq!(
            Telemetry::parse("#|abc|20"),
            Err(TelemetryError::InvalidField {
                index: 1,
                text: "abc".to_string()
            })
        );
    }

    #[test]
    fn test_extra_fields_ignored() {
        let expected = Ok(Telemetry { first: 1, second: 2 });
        assert_eq!(Telemetry::parse("#|1|2|3"), expected);
        assert_eq!(Telemetry::parse("#|1|2||"), expected);
        assert_eq!(Telemetry::parse("#|1|2|x|y|"), expected);
    }

    #[test]
    fn test_percent_clamps() {
        assert_eq!(Telemetry::percent(-5), 0);
        assert_eq!(Telemetry::percent(42), 42);
        assert_eq!(Telemetry::percent(250), 100);
    }

    #[test]
    fn test_display_matches_firmware_format() {
        let t = Telemetry { first: 3, second: 4 };
        assert_eq!(t.to_string(), "#|3|4|");
        assert_eq!(Telemetry::parse(&t.to_string()), Ok(t));
    }
}
