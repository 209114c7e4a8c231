//! Second-precision UTC timestamps in the sortable text format used on disk and on the wire.
//!
//! Accepted input formats:
//! - Wire format: `2026-02-07 17:00:00`
//! - ISO 8601: `2026-02-07T17:00:00`, optionally suffixed with `Z`
//!
//! Everything else is rejected; partial dates, epoch numbers and relative
//! expressions are never guessed.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, TimeDelta, Timelike, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// strftime pattern of the wire/storage format.
pub const WIRE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Error type for timestamp parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampParseError {
    pub input: String,
}

impl fmt::Display for TimestampParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid timestamp '{}': expected YYYY-MM-DD HH:MM:SS",
            self.input
        )
    }
}

impl std::error::Error for TimestampParseError {}

/// A UTC wall-clock instant truncated to whole seconds.
///
/// The text form sorts lexicographically in time order, which is what the
/// SQLite `timestamp` indexes rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Current UTC time, truncated to the second.
    pub fn now() -> Self {
        Self::from_naive(Utc::now().naive_utc())
    }

    /// Wraps a naive UTC datetime, dropping sub-second precision.
    pub fn from_naive(dt: NaiveDateTime) -> Self {
        Self(dt.with_nanosecond(0).unwrap_or(dt))
    }

    /// Parses the wire format (or its ISO `T` variant).
    pub fn parse(input: &str) -> Result<Self, TimestampParseError> {
        let trimmed = input.trim();
        let body = trimmed.strip_suffix('Z').unwrap_or(trimmed);

        NaiveDateTime::parse_from_str(body, WIRE_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(body, ISO_FORMAT))
            .ok()
            // chrono encodes a leap second as nanosecond >= 1e9
            .filter(|dt| dt.nanosecond() < 1_000_000_000)
            .map(Self::from_naive)
            .ok_or_else(|| TimestampParseError {
                input: input.to_string(),
            })
    }

    /// Returns `self - delta`, saturating at the representable minimum.
    pub fn saturating_sub(&self, delta: TimeDelta) -> Self {
        Self(self.0.checked_sub_signed(delta).unwrap_or(NaiveDateTime::MIN))
    }

    /// Returns `self + delta`, saturating at the representable maximum.
    pub fn saturating_add(&self, delta: TimeDelta) -> Self {
        Self(self.0.checked_add_signed(delta).unwrap_or(NaiveDateTime::MAX))
    }

    /// Start of a `[now - hours, now]` window.
    pub fn hours_before(&self, hours: f64) -> Self {
        let secs = (hours * 3600.0).round() as i64;
        self.saturating_sub(TimeDelta::try_seconds(secs).unwrap_or(TimeDelta::MAX))
    }

    /// Retention cutoff: everything strictly older than the result is expired.
    pub fn days_before(&self, days: u32) -> Self {
        self.saturating_sub(TimeDelta::days(i64::from(days)))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(WIRE_FORMAT))
    }
}

impl FromStr for Timestamp {
    type Err = TimestampParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(dt: NaiveDateTime) -> Self {
        Self::from_naive(dt)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl ToSql for Timestamp {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Timestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        Self::parse(text).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}
