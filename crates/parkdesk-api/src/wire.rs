//! Lenient decoders for values the parking service encodes inconsistently
//!
//! Amounts arrive either as JSON numbers or as numeric strings (`"0.00"`).
//! Timestamps arrive as RFC 3339 strings, naive `YYYY-MM-DD HH:MM:SS`
//! strings (UTC), epoch milliseconds, or epoch milliseconds as a string.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, de::Error as _};
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(serde_json::Number),
    Text(String),
}

/// Parse a decimal amount from its textual form.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Parse a timestamp in any of the accepted encodings.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(millis) = s.parse::<i64>() {
        return Utc.timestamp_millis_opt(millis).single();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn amount_from(raw: NumberOrString) -> Option<Decimal> {
    match raw {
        NumberOrString::Number(n) => parse_amount(&n.to_string()),
        NumberOrString::Text(s) => parse_amount(&s),
    }
}

fn timestamp_from(raw: NumberOrString) -> Option<DateTime<Utc>> {
    match raw {
        NumberOrString::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        NumberOrString::Text(s) => parse_timestamp(&s),
    }
}

fn count_from(raw: NumberOrString) -> Option<u32> {
    let value = match raw {
        NumberOrString::Number(n) => n.as_f64()?,
        NumberOrString::Text(s) => s.trim().parse::<f64>().ok()?,
    };
    let whole = value.is_finite() && value.fract() == 0.0;
    (whole && value >= 0.0 && value <= f64::from(u32::MAX)).then_some(value as u32)
}

fn minutes_from(raw: NumberOrString) -> Option<f64> {
    match raw {
        NumberOrString::Number(n) => n.as_f64(),
        NumberOrString::Text(s) => s.trim().parse::<f64>().ok(),
    }
    .filter(|m| m.is_finite())
}

pub fn amount<'de, D: Deserializer<'de>>(d: D) -> Result<Decimal, D::Error> {
    let raw = NumberOrString::deserialize(d)?;
    amount_from(raw).ok_or_else(|| D::Error::custom("invalid amount"))
}

pub fn opt_amount<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Decimal>, D::Error> {
    match Option::<NumberOrString>::deserialize(d)? {
        None => Ok(None),
        Some(raw) => amount_from(raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom("invalid amount")),
    }
}

pub fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = NumberOrString::deserialize(d)?;
    timestamp_from(raw).ok_or_else(|| D::Error::custom("invalid timestamp"))
}

pub fn opt_timestamp<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    match Option::<NumberOrString>::deserialize(d)? {
        None => Ok(None),
        Some(raw) => timestamp_from(raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom("invalid timestamp")),
    }
}

/// Whole, non-negative count (hours, vehicles). Integral floats are accepted.
pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let raw = NumberOrString::deserialize(d)?;
    count_from(raw).ok_or_else(|| D::Error::custom("invalid count"))
}

pub fn opt_count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    match Option::<NumberOrString>::deserialize(d)? {
        None => Ok(None),
        Some(raw) => count_from(raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom("invalid count")),
    }
}

pub fn opt_minutes<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    match Option::<NumberOrString>::deserialize(d)? {
        None => Ok(None),
        Some(raw) => minutes_from(raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom("invalid minutes")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_accept_numbers_and_strings() {
        assert_eq!(parse_amount("0.00"), Some(Decimal::ZERO));
        assert_eq!(parse_amount(" 40.50 "), Some(Decimal::new(4050, 2)));
        assert_eq!(parse_amount("1e2"), Some(Decimal::from(100)));
        assert_eq!(parse_amount("forty"), None);

        let from_number = amount_from(NumberOrString::Number(serde_json::Number::from(90)));
        assert_eq!(from_number, Some(Decimal::from(90)));
    }

    #[test]
    fn timestamps_accept_all_encodings() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap();

        assert_eq!(parse_timestamp("2025-01-15T09:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-15T14:30:00+05:30"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-15 09:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-15T09:00:00.000"), Some(expected));

        let millis = expected.timestamp_millis();
        assert_eq!(parse_timestamp(&millis.to_string()), Some(expected));
        assert_eq!(
            timestamp_from(NumberOrString::Number(serde_json::Number::from(millis))),
            Some(expected)
        );

        assert_eq!(parse_timestamp("last tuesday"), None);
    }

    #[test]
    fn counts_reject_negative_values() {
        assert_eq!(count_from(NumberOrString::Text("3".into())), Some(3));
        assert_eq!(
            count_from(NumberOrString::Number(serde_json::Number::from_f64(2.0).unwrap())),
            Some(2)
        );
        assert_eq!(count_from(NumberOrString::Text("-1".into())), None);
        assert_eq!(count_from(NumberOrString::Text("2.5".into())), None);
    }
}
