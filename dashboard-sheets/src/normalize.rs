//! Tolerant coercion of raw cells into numbers and dates.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Outcome of coercing a raw cell. Callers decide what an unparsable cell means.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced<T> {
    Parsed(T),
    Unparsable,
}

impl<T> Coerced<T> {
    pub fn parsed(self) -> Option<T> {
        match self {
            Coerced::Parsed(value) => Some(value),
            Coerced::Unparsable => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Coerced::Parsed(_))
    }
}

/// Reads a number from a cell. Plain numerals, including exponent forms such
/// as `1.5e-7`, are taken as is; anything else keeps its leading number after
/// dropping everything but digits, `.` and `-`: `"1,234 leads"` parses as `1234`.
pub fn parse_number(raw: Option<&str>) -> Coerced<f64> {
    let Some(raw) = raw.filter(|value| !value.is_empty()) else {
        return Coerced::Unparsable;
    };

    if let Ok(value) = raw.trim().parse::<f64>() {
        if value.is_finite() {
            return Coerced::Parsed(value);
        }
    }

    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    match leading_float(&cleaned).and_then(|prefix| prefix.parse::<f64>().ok()) {
        Some(value) if value.is_finite() => Coerced::Parsed(value),
        _ => Coerced::Unparsable,
    }
}

/// Number for aggregation: anything unparsable counts as zero.
pub fn to_number(raw: Option<&str>) -> f64 {
    parse_number(raw).parsed().unwrap_or(0.0)
}

/// Longest prefix shaped like `-?digits(.digits)?`, provided it holds a digit.
fn leading_float(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut end = 0;
    if bytes.first() == Some(&b'-') {
        end = 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start || digits > 0 {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }
    Some(text[..end].trim_end_matches('.'))
}

const GENERIC_DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const GENERIC_DATE_FORMATS: [&str; 6] = [
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
    "%d %b %Y",
    "%d %B %Y",
];

const US_DATE_FORMAT: &str = "%m/%d/%Y";
const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses an appointment or birth date cell.
///
/// Tries generic timestamp forms first, then `MM/dd/yyyy`, then `yyyy-MM-dd`.
/// Date-only values land on midnight; RFC 3339 values keep their wall clock.
pub fn parse_date(raw: Option<&str>) -> Coerced<NaiveDateTime> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Coerced::Unparsable;
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Coerced::Parsed(parsed.naive_local());
    }

    for format in GENERIC_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Coerced::Parsed(parsed);
        }
    }

    for format in GENERIC_DATE_FORMATS
        .iter()
        .chain([US_DATE_FORMAT, ISO_DATE_FORMAT].iter())
    {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Coerced::Parsed(date.and_time(NaiveTime::MIN));
        }
    }

    Coerced::Unparsable
}

/// Date for aggregation: unparsable cells become `None`.
pub fn date_or_none(raw: Option<&str>) -> Option<NaiveDateTime> {
    parse_date(raw).parsed()
}
