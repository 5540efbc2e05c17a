//! ISO-8601 timestamps as written into OSW files.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

const BASIC_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const EXTENDED_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Render in basic ISO-8601 form, e.g. `20240131T235959Z`
pub fn format(ts: &DateTime<Utc>) -> String {
    ts.format(BASIC_FORMAT).to_string()
}

/// Current time in basic ISO-8601 form
pub fn now() -> String {
    format(&Utc::now())
}

/// Parse basic or extended ISO-8601, or RFC 3339 with any offset
pub fn parse(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    for fmt in [BASIC_FORMAT, EXTENDED_FORMAT] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Render in RFC 3339 form for log output
pub fn to_rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_basic_format_round_trip() {
        let ts = Utc.with_ymd_and_hms(2016, 5, 17, 14, 3, 9).unwrap();
        let text = format(&ts);
        assert_eq!(text, "20160517T140309Z");
        assert_eq!(parse(&text), Some(ts));
    }

    #[test]
    fn test_accepts_extended_and_rfc3339() {
        let ts = Utc.with_ymd_and_hms(2016, 5, 17, 14, 3, 9).unwrap();
        assert_eq!(parse("2016-05-17T14:03:09Z"), Some(ts));
        assert_eq!(parse("2016-05-17T16:03:09+02:00"), Some(ts));
        assert_eq!(to_rfc3339(&ts), "2016-05-17T14:03:09Z");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse("yesterday").is_none());
        assert!(parse("").is_none());
    }
}
