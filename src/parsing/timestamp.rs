use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::trace;

use crate::error_handling::types::ParseError;

/// Timestamp patterns, tried in order. `%.f` accepts an optional fractional
/// part, so every entry also covers its millisecond variant.
const TIMESTAMP_FORMATS: &[&str] = &[
    // year first, dotted date
    "%Y.%m.%d-%H.%M.%S%.f",
    "%Y.%m.%d-%H:%M:%S%.f",
    "%Y.%m.%d %H.%M.%S%.f",
    "%Y.%m.%d %H:%M:%S%.f",
    // year first, dashed date
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d-%H.%M.%S%.f",
    "%Y-%m-%d-%H:%M:%S%.f",
    "%Y-%m-%d %H.%M.%S%.f",
    // year first, slashed date
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d-%H:%M:%S%.f",
    "%Y/%m/%d %H.%M.%S%.f",
    "%Y/%m/%d-%H.%M.%S%.f",
    // day first
    "%d.%m.%Y-%H.%M.%S%.f",
    "%d.%m.%Y %H:%M:%S%.f",
    "%d.%m.%Y-%H:%M:%S%.f",
    "%d.%m.%Y %H.%M.%S%.f",
    "%d-%m-%Y %H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S%.f",
    // compact
    "%Y%m%d-%H%M%S",
    "%Y%m%d_%H%M%S",
    "%Y%m%d%H%M%S",
];

/// Plausible range for bare Unix-second timestamps (2001-09-09 .. 2033-05-18).
const UNIX_SECONDS_RANGE: std::ops::RangeInclusive<i64> = 1_000_000_000..=2_000_000_000;

/// Parses a remote timestamp into UTC.
///
/// Offset-bearing RFC 3339 strings are converted to UTC; every other accepted
/// form carries no zone and is taken as UTC. Exhausting the cascade yields
/// [`ParseError::InvalidTimestamp`].
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, ParseError> {
    let trimmed = text.trim().trim_matches('"');
    if trimmed.is_empty() {
        return Err(ParseError::InvalidTimestamp(text.to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive_input = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    for format in TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(naive_input, format) {
            trace!("Parsed timestamp '{}' with format {}", trimmed, format);
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if trimmed.len() == 10 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(secs) = trimmed.parse::<i64>() {
            if UNIX_SECONDS_RANGE.contains(&secs) {
                if let Some(dt) = DateTime::from_timestamp(secs, 0) {
                    return Ok(dt);
                }
            }
        }
    }

    Err(ParseError::InvalidTimestamp(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn expected() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 9, 11, 58, 37).unwrap()
    }

    #[test]
    fn listed_forms_resolve_to_the_same_instant() {
        let forms = [
            "2025.05.09-11.58.37",
            "2025-05-09 11:58:37",
            "2025/05/09 11:58:37",
            "09.05.2025-11.58.37",
            "20250509-115837",
        ];
        for form in forms {
            assert_eq!(parse_timestamp(form).unwrap(), expected(), "form {}", form);
        }
    }

    #[test]
    fn other_variants_resolve_too() {
        let forms = [
            "2025.05.09-11:58:37",
            "2025.05.09 11.58.37",
            "2025-05-09T11:58:37",
            "2025-05-09T11:58:37Z",
            "2025-05-09T13:58:37+02:00",
            "2025-05-09-11.58.37",
            "09/05/2025 11:58:37",
            "09-05-2025 11:58:37",
            "20250509_115837",
            "20250509115837",
            "1746791917",
            "  2025.05.09-11.58.37  ",
        ];
        for form in forms {
            assert_eq!(parse_timestamp(form).unwrap(), expected(), "form {}", form);
        }
    }

    #[test]
    fn milliseconds_are_kept() {
        let ts = parse_timestamp("2025.05.09-11.58.37.250").unwrap();
        assert_eq!(ts.with_nanosecond(0).unwrap(), expected());
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn garbage_is_a_typed_failure() {
        for bad in ["", "yesterday", "2025.13.45-99.99.99", "TestKiller", "12345"] {
            match parse_timestamp(bad) {
                Err(ParseError::InvalidTimestamp(s)) => assert_eq!(s, bad),
                other => panic!("unexpected result for {:?}: {:?}", bad, other),
            }
        }
    }
}
