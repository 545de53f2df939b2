use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%Y/%m/%d", "%d/%m/%Y", "%Y%m%d"];

// Epoch seconds below this (2001-09-09) are not taken as timestamps, so a
// compact `20240101` is never read as a day in 1970.
const MIN_EPOCH_SECS: f64 = 1e9;
// Epoch values above this are milliseconds (1e11 s is the year 5138).
const MILLIS_THRESHOLD: f64 = 1e11;

/// Parses a trade timestamp. Naive values are read as wall-clock time in `tz`.
pub fn parse_timestamp(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Some(dt) = parse_epoch(raw) {
        return Some(dt);
    }

    let naive = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| parse_naive_date(raw).and_then(|d| d.and_hms_opt(0, 0, 0)))?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parses a calendar date, also accepting a unix timestamp or a full datetime.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    parse_naive_date(raw)
        .or_else(|| parse_epoch(raw).map(|dt| dt.date_naive()))
        .or_else(|| parse_timestamp(raw, chrono_tz::UTC).map(|dt| dt.date_naive()))
}

fn parse_naive_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn parse_epoch(raw: &str) -> Option<DateTime<Utc>> {
    let value: f64 = raw.parse().ok()?;
    if !value.is_finite() || value < MIN_EPOCH_SECS {
        return None;
    }
    if value >= MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value as i64)
    } else {
        let secs = value.trunc() as i64;
        let nanos = ((value.fract()) * 1e9).round() as u32;
        DateTime::from_timestamp(secs, nanos.min(999_999_999))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn rfc3339_and_naive_formats() {
        let a = parse_timestamp("2024-01-02T03:04:05Z", chrono_tz::UTC).unwrap();
        let b = parse_timestamp("2024-01-02 03:04:05", chrono_tz::UTC).unwrap();
        assert_eq!(a, b);
        let c = parse_timestamp("2024-01-02", chrono_tz::UTC).unwrap();
        assert_eq!(c.hour(), 0);
    }

    #[test]
    fn ist_export_format_converts_to_utc() {
        // 02-12-2024 22:50 IST is 17:20 UTC the same day.
        let ts = parse_timestamp("02-12-2024 22:50", chrono_tz::Asia::Kolkata).unwrap();
        assert_eq!(ts.date_naive(), NaiveDate::from_ymd_opt(2024, 12, 2).unwrap());
        assert_eq!(ts.hour(), 17);
        assert_eq!(ts.minute(), 20);

        // Just after midnight IST is still the previous UTC day.
        let early = parse_timestamp("03-12-2024 01:00", chrono_tz::Asia::Kolkata).unwrap();
        assert_eq!(early.date_naive(), NaiveDate::from_ymd_opt(2024, 12, 2).unwrap());
    }

    #[test]
    fn epoch_seconds_and_millis() {
        let s = parse_timestamp("1704067200", chrono_tz::UTC).unwrap();
        let ms = parse_timestamp("1704067200000", chrono_tz::UTC).unwrap();
        assert_eq!(s, ms);
        assert_eq!(s.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let sci = parse_timestamp("1.7040672e12", chrono_tz::UTC).unwrap();
        assert_eq!(sci, s);
    }

    #[test]
    fn dates_from_several_spellings() {
        let d = NaiveDate::from_ymd_opt(2018, 2, 1).unwrap();
        assert_eq!(parse_date("2018-02-01"), Some(d));
        assert_eq!(parse_date("01-02-2018"), Some(d));
        assert_eq!(parse_date("1517463000"), Some(d));
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn compact_dates_are_not_epochs() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(parse_date("20240101"), Some(d));
        let ts = parse_timestamp("20240101", chrono_tz::UTC).unwrap();
        assert_eq!(ts.date_naive(), d);

        assert_eq!(parse_date("12345"), None);
        assert_eq!(parse_timestamp("12345", chrono_tz::UTC), None);
        assert_eq!(parse_date("20241301"), None);
    }
}
