//! Publication date parsing and formatting.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

/// Primary feed date layout, e.g. `Tue, 30 Sep 2025 13:49:00 +0200`.
const RFC822_NUMERIC: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Parse a feed date, trying the RFC-822 style layout first and ISO-8601 after.
///
/// Naive ISO values carry no offset and are taken as UTC.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_str(raw, RFC822_NUMERIC) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Format a timestamp as an RFC-2822 date in UTC.
pub fn format_rfc2822(dt: &DateTime<FixedOffset>) -> String {
    dt.with_timezone(&Utc).to_rfc2822()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc822_with_offset() {
        let dt = parse_pub_date("Tue, 30 Sep 2025 13:49:00 +0200").unwrap();
        assert_eq!(dt.with_timezone(&Utc).to_rfc3339(), "2025-09-30T11:49:00+00:00");
    }

    #[test]
    fn test_parse_iso_fallbacks() {
        assert!(parse_pub_date("2025-09-30T13:49:00+02:00").is_some());
        assert!(parse_pub_date("2025-09-30T13:49:00").is_some());
        assert!(parse_pub_date("2025-09-30").is_some());
    }

    #[test]
    fn test_unparsable_dates() {
        assert!(parse_pub_date("").is_none());
        assert!(parse_pub_date("No Date").is_none());
        assert!(parse_pub_date("30/09/2025").is_none());
    }

    #[test]
    fn test_formatted_date_parses_back() {
        let dt = parse_pub_date("Tue, 30 Sep 2025 13:49:00 +0200").unwrap();
        let formatted = format_rfc2822(&dt);
        assert_eq!(formatted, "Tue, 30 Sep 2025 11:49:00 +0000");
        assert_eq!(parse_pub_date(&formatted), Some(dt));
    }
}
