//! # Timestamps: HTTP Dates and CI Build Times
//!
//! HTTP dates (`If-Modified-Since`, `Last-Modified`) carry whole seconds
//! in GMT. Three syntaxes are accepted on input, as HTTP/1.1 requires:
//!
//! - IMF-fixdate / RFC 2822: `Sun, 06 Nov 1994 08:49:37 GMT`
//! - RFC 850: `Sunday, 06-Nov-94 08:49:37 GMT`
//! - asctime: `Sun Nov  6 08:49:37 1994`
//!
//! Output is always IMF-fixdate.
//!
//! CI build times arrive in whatever the CI renders: RFC 3339, GitLab's
//! `2026-03-01 12:00:00 UTC`, a numeric offset variant of it, or RFC 2822.

use chrono::{DateTime, NaiveDateTime, TimeZone, Timelike, Utc};

const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
const RFC850: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME: &str = "%a %b %d %H:%M:%S %Y";

/// Drop sub-second precision.
pub fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

/// Render `dt` as an IMF-fixdate, truncating sub-seconds.
pub fn format_http_date(dt: DateTime<Utc>) -> String {
    truncate_to_seconds(dt).format(IMF_FIXDATE).to_string()
}

/// Parse an HTTP date in any of the three accepted syntaxes.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, RFC850) {
        return Some(Utc.from_utc_datetime(&naive));
    }
    // asctime pads single-digit days with a space; collapse runs first.
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&collapsed, ASCTIME)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parse a CI `finished_at` value.
pub fn parse_ci_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(naive) = value.strip_suffix(" UTC") {
        if let Ok(naive) = NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f") {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Some(dt.with_timezone(&Utc));
    }
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap()
    }

    #[test]
    fn all_three_http_syntaxes_agree() {
        let expected = reference();
        assert_eq!(parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT"), Some(expected));
        assert_eq!(parse_http_date("Sunday, 06-Nov-94 08:49:37 GMT"), Some(expected));
        assert_eq!(parse_http_date("Sun Nov  6 08:49:37 1994"), Some(expected));
    }

    #[test]
    fn garbage_is_not_a_date() {
        assert_eq!(parse_http_date(""), None);
        assert_eq!(parse_http_date("yesterday"), None);
        assert_eq!(parse_http_date("Sun, 99 Nov 1994 08:49:37 GMT"), None);
    }

    #[test]
    fn format_is_imf_fixdate() {
        let dt = reference() + chrono::Duration::milliseconds(750);
        assert_eq!(format_http_date(dt), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn formatted_dates_parse_back() {
        let dt = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 5).unwrap();
        assert_eq!(parse_http_date(&format_http_date(dt)), Some(dt));
    }

    #[test]
    fn ci_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_ci_timestamp("2026-03-01T12:00:00Z"), Some(expected));
        assert_eq!(parse_ci_timestamp("2026-03-01T12:00:00.000Z"), Some(expected));
        assert_eq!(parse_ci_timestamp("2026-03-01 12:00:00 UTC"), Some(expected));
        assert_eq!(parse_ci_timestamp("2026-03-01 14:00:00 +0200"), Some(expected));
        assert_eq!(parse_ci_timestamp("Sun, 01 Mar 2026 12:00:00 GMT"), Some(expected));
    }

    #[test]
    fn ci_timestamp_rejects_nonsense() {
        assert_eq!(parse_ci_timestamp("not yet"), None);
        assert_eq!(parse_ci_timestamp(""), None);
    }

    #[test]
    fn truncation_drops_fraction_only() {
        let dt = reference() + chrono::Duration::microseconds(999_999);
        assert_eq!(truncate_to_seconds(dt), reference());
    }
}
