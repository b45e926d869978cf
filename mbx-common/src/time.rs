//! Timestamp utilities
//!
//! Devices store timestamps as ISO-8601 text or as epoch integers in
//! seconds, milliseconds, microseconds or nanoseconds, with nothing in the
//! data declaring which. The unit is inferred from the decimal digit count
//! of the integer part:
//!
//! | digits | unit         |
//! |--------|--------------|
//! | ≤ 10   | seconds      |
//! | ≤ 13   | milliseconds |
//! | ≤ 16   | microseconds |
//! | ≤ 19   | nanoseconds  |
//!
//! Anything longer is unresolvable, and so is any negative epoch value,
//! whether it arrives as a number or as text.

use crate::value::RawValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Epoch precision inferred from digit count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochUnit {
    Seconds,
    Millis,
    Micros,
    Nanos,
}

impl EpochUnit {
    /// Pick the unit for an integer part with `digits` decimal digits
    pub fn from_digit_count(digits: u32) -> Option<Self> {
        match digits {
            0..=10 => Some(EpochUnit::Seconds),
            11..=13 => Some(EpochUnit::Millis),
            14..=16 => Some(EpochUnit::Micros),
            17..=19 => Some(EpochUnit::Nanos),
            _ => None,
        }
    }

    /// Ticks of this unit per second
    pub fn per_second(self) -> i128 {
        match self {
            EpochUnit::Seconds => 1,
            EpochUnit::Millis => 1_000,
            EpochUnit::Micros => 1_000_000,
            EpochUnit::Nanos => 1_000_000_000,
        }
    }
}

fn digit_count(n: u128) -> u32 {
    n.checked_ilog10().map_or(1, |log| log + 1)
}

/// Resolve an epoch integer of unknown precision
pub fn from_epoch_integer(value: i128) -> Option<DateTime<Utc>> {
    let magnitude = u128::try_from(value).ok()?;
    let unit = EpochUnit::from_digit_count(digit_count(magnitude))?;
    let per_second = unit.per_second();
    let secs = i64::try_from(value.div_euclid(per_second)).ok()?;
    let nanos = value.rem_euclid(per_second) * (1_000_000_000 / per_second);
    DateTime::from_timestamp(secs, u32::try_from(nanos).ok()?)
}

/// Resolve an epoch real of unknown precision (unit from the integer part)
pub fn from_epoch_real(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() || value < 0.0 || value >= 1e20 {
        return None;
    }
    let unit = EpochUnit::from_digit_count(digit_count(value.trunc() as u128))?;
    let scaled = value / unit.per_second() as f64;
    let secs = scaled.floor();
    let nanos = (((scaled - secs) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(secs as i64, nanos)
}

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse ISO-8601 text; a missing offset means UTC
pub fn parse_iso8601(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse a textual timestamp: ISO-8601 first, then an all-digit epoch
pub fn parse_timestamp_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Some(dt) = parse_iso8601(text) {
        return Some(dt);
    }
    if text.bytes().all(|b| b.is_ascii_digit()) {
        return text.parse::<i128>().ok().and_then(from_epoch_integer);
    }
    None
}

/// Parse any raw value into a calendar time, or `None` when unresolvable
pub fn parse_timestamp(value: &RawValue) -> Option<DateTime<Utc>> {
    match value {
        RawValue::Null | RawValue::Blob(_) => None,
        RawValue::Integer(i) => from_epoch_integer(i128::from(*i)),
        RawValue::Real(f) => from_epoch_real(*f),
        RawValue::Text(s) => parse_timestamp_text(s),
    }
}
