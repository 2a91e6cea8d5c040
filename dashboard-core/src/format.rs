//! Number formatting for cards, chips and generated sentences.

use crate::{Trend, TrendDirection};

/// How the magnitude of a trend delta is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendFormat {
    /// Plain count with at most one fractional digit.
    Count,
    /// A fraction (0.12) rendered as a whole percent (12%).
    Fraction,
    /// A value already scaled to percent (12.34) rendered with one decimal (12.3%).
    ScaledPercent,
}

/// Formats a count en-US style with at most one fractional digit: `1234.0` -> `1,234`.
pub fn format_count(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }

    let tenths = (value * 10.0).round() as i64;
    if tenths == 0 {
        return "0".to_string();
    }

    let magnitude = tenths.unsigned_abs();
    let whole = group_thousands(magnitude / 10);
    let sign = if tenths < 0 { "-" } else { "" };
    match magnitude % 10 {
        0 => format!("{sign}{whole}"),
        fraction => format!("{sign}{whole}.{fraction}"),
    }
}

/// Formats a fraction as a whole percent: `0.256` -> `26%`.
pub fn format_percent(value: f64) -> String {
    if !value.is_finite() {
        return "0%".to_string();
    }
    format!("{}%", (value * 100.0).round() as i64)
}

/// Builds a signed trend chip. Returns `None` for a NaN delta.
///
/// A forced direction wins over the sign of the delta, which is how metrics
/// where "more is worse" are rendered.
pub fn build_trend(
    delta: f64,
    label: &str,
    format: TrendFormat,
    forced: Option<TrendDirection>,
) -> Option<Trend> {
    if delta.is_nan() {
        return None;
    }

    let direction = forced.unwrap_or(if delta > 0.0 {
        TrendDirection::Positive
    } else if delta < 0.0 {
        TrendDirection::Negative
    } else {
        TrendDirection::Neutral
    });

    let magnitude = delta.abs();
    let formatted = match format {
        TrendFormat::Count => format_count(magnitude),
        TrendFormat::Fraction => format_percent(magnitude),
        TrendFormat::ScaledPercent => format!("{magnitude:.1}%"),
    };

    let value = if delta == 0.0 {
        "0".to_string()
    } else {
        let sign = if delta > 0.0 { '+' } else { '-' };
        format!("{sign}{formatted}")
    };

    Some(Trend {
        direction,
        label: label.to_string(),
        value,
    })
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_group_thousands_and_keep_one_decimal() {
        assert_eq!(format_count(1234.0), "1,234");
        assert_eq!(format_count(1_234_567.0), "1,234,567");
        assert_eq!(format_count(2.25), "2.3");
        assert_eq!(format_count(4.0), "4");
        assert_eq!(format_count(-12.0), "-12");
        assert_eq!(format_count(0.01), "0");
        assert_eq!(format_count(f64::NAN), "0");
    }

    #[test]
    fn percents_round_to_whole_numbers() {
        assert_eq!(format_percent(0.26), "26%");
        assert_eq!(format_percent(0.875), "88%");
        assert_eq!(format_percent(0.0), "0%");
        assert_eq!(format_percent(f64::INFINITY), "0%");
    }

    #[test]
    fn zero_delta_renders_literal_zero_and_neutral() {
        let trend = build_trend(0.0, "vs prior 30 days", TrendFormat::Count, None)
            .expect("trend for finite delta");
        assert_eq!(trend.value, "0");
        assert_eq!(trend.direction, TrendDirection::Neutral);
    }

    #[test]
    fn signed_deltas_pick_direction_from_sign() {
        let up = build_trend(12.0, "new patients", TrendFormat::Count, None).expect("trend");
        assert_eq!(up.value, "+12");
        assert_eq!(up.direction, TrendDirection::Positive);

        let down = build_trend(-0.05, "attendance", TrendFormat::Fraction, None).expect("trend");
        assert_eq!(down.value, "-5%");
        assert_eq!(down.direction, TrendDirection::Negative);

        let scaled =
            build_trend(33.333, "pending PT ratio", TrendFormat::ScaledPercent, None).expect("trend");
        assert_eq!(scaled.value, "+33.3%");
    }

    #[test]
    fn forced_direction_overrides_sign() {
        let trend = build_trend(
            7.0,
            "issues to audit",
            TrendFormat::Count,
            Some(TrendDirection::Negative),
        )
        .expect("trend");
        assert_eq!(trend.direction, TrendDirection::Negative);
        assert_eq!(trend.value, "+7");
    }

    #[test]
    fn nan_delta_yields_no_trend() {
        assert!(build_trend(f64::NAN, "x", TrendFormat::Count, None).is_none());
    }
}
