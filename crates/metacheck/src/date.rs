// ABOUTME: Flexible date parsing for meta tags and registry payloads.
// ABOUTME: Normalizes heterogeneous date strings to UTC so records never carry source-format dates.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Formats carrying a numeric timezone offset.
const FORMATS_WITH_TZ: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S %z",
    "%a, %e %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
    "%e %b %Y %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%:z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S %z",
];

/// Datetime formats without an offset; interpreted as UTC.
const FORMATS_NAIVE: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d %b %Y %H:%M:%S",
    "%e %b %Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

/// Date-only formats; interpreted as midnight UTC so the day never shifts.
const FORMATS_DATE: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y%m%d",
    "%b %e, %Y",
    "%e %b %Y",
    "%b %d, %Y",
    "%d %b %Y",
    "%B %e, %Y",
    "%e %B %Y",
    "%B %d, %Y",
    "%d %B %Y",
];

/// Named timezone abbreviations seen in meta tags, with offsets in seconds.
const TZ_OFFSETS: &[(&str, i32)] = &[
    ("GMT", 0),
    ("UTC", 0),
    ("EST", -5 * 3600),
    ("EDT", -4 * 3600),
    ("CST", -6 * 3600),
    ("CDT", -5 * 3600),
    ("MST", -7 * 3600),
    ("MDT", -6 * 3600),
    ("PST", -8 * 3600),
    ("PDT", -7 * 3600),
    ("CET", 3600),
    ("CEST", 2 * 3600),
    ("EET", 2 * 3600),
    ("EEST", 3 * 3600),
    ("BST", 3600),
    ("JST", 9 * 3600),
    ("AEST", 10 * 3600),
    ("AEDT", 11 * 3600),
];

/// Parse a date string into UTC.
///
/// Strict formats (RFC 3339, RFC 2822) are tried first, then partial dates
/// (`2020`, `2020-05`), explicit format tables, named timezones and finally
/// `dateparser` for natural-language inputs. Returns `None` if nothing matches;
/// callers drop the field rather than keep the raw text.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(dt) = parse_strict(s) {
        return Some(dt);
    }

    // Registry dates may be ranges ("2019-01-01/2019-12-31"); keep the start.
    if let Some((start, _)) = s.split_once('/') {
        if start.len() >= 4 {
            if let Some(dt) = parse_strict(start.trim()) {
                return Some(dt);
            }
        }
    }

    if let Ok(dt) = dateparser::parse(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}

fn parse_strict(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = parse_partial(s) {
        return Some(dt);
    }

    for fmt in FORMATS_WITH_TZ {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in FORMATS_NAIVE {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for fmt in FORMATS_DATE {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return midnight_utc(date);
        }
    }

    parse_with_named_timezone(s)
}

/// Year-only and year-month values, as published by scholarly registries.
fn parse_partial(s: &str) -> Option<DateTime<Utc>> {
    let bytes = s.as_bytes();
    let all_digits = |b: &[u8]| b.iter().all(u8::is_ascii_digit);

    match bytes.len() {
        4 if all_digits(bytes) => {
            let year: i32 = s.parse().ok()?;
            midnight_utc(NaiveDate::from_ymd_opt(year, 1, 1)?)
        }
        7 if bytes[4] == b'-' && all_digits(&bytes[..4]) && all_digits(&bytes[5..]) => {
            let year: i32 = s[..4].parse().ok()?;
            let month: u32 = s[5..].parse().ok()?;
            midnight_utc(NaiveDate::from_ymd_opt(year, month, 1)?)
        }
        _ => None,
    }
}

fn midnight_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&naive))
}

/// chrono's `%Z` does not parse abbreviations, so map the common ones by hand.
fn parse_with_named_timezone(s: &str) -> Option<DateTime<Utc>> {
    for (tz_name, offset_secs) in TZ_OFFSETS {
        let Some(base) = s.strip_suffix(tz_name) else {
            continue;
        };
        let base = base.trim_end();
        let formats = [
            "%a, %d %b %Y %H:%M:%S",
            "%a, %e %b %Y %H:%M:%S",
            "%d %b %Y %H:%M:%S",
            "%e %b %Y %H:%M:%S",
            "%Y-%m-%d %H:%M:%S",
        ];
        for fmt in &formats {
            if let Ok(naive) = NaiveDateTime::parse_from_str(base, fmt) {
                let offset = FixedOffset::east_opt(*offset_secs)?;
                let dt = offset.from_local_datetime(&naive).single()?;
                return Some(dt.with_timezone(&Utc));
            }
        }
    }
    None
}
