use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Canonical storage form of a timestamp (RFC 3339, UTC, microseconds).
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now() -> String {
    format_timestamp(Utc::now())
}

/// Best-effort ISO-8601 parse.
///
/// Accepts RFC 3339 with an offset, naive `T`-separated values (as written by
/// older exporters, taken as UTC) and SQLite's `YYYY-MM-DD HH:MM:SS`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|ndt| ndt.and_utc())
}

/// Render a stored timestamp as `YYYY-MM-DD HH:MM:SS`; unreadable values are
/// shown as-is.
pub fn display_timestamp(raw: &str) -> String {
    parse_timestamp(raw)
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_iso_shapes() {
        let expected = "2026-02-07T10:11:12Z";
        for raw in [
            "2026-02-07T10:11:12Z",
            "2026-02-07T12:11:12+02:00",
            "2026-02-07T10:11:12",
            "2026-02-07 10:11:12",
            "2026-02-07T10:11:12.000000",
        ] {
            let ts = parse_timestamp(raw).unwrap_or_else(|| panic!("failed on {raw}"));
            assert_eq!(ts.to_rfc3339_opts(SecondsFormat::Secs, true), expected);
        }
    }

    #[test]
    fn garbage_does_not_parse() {
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn stored_form_roundtrips() {
        let raw = now();
        assert!(parse_timestamp(&raw).is_some());
        assert_eq!(display_timestamp("2026-02-07T10:11:12Z"), "2026-02-07 10:11:12");
    }
}
