//! ISO-8601 timestamp parsing and rendering

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

use crate::error::{Error, Result};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// A point in time, with or without a UTC offset.
///
/// Offset-carrying timestamps compare by instant, so `03:04:05Z` equals
/// `04:04:05+01:00`. Naive timestamps only equal other naive timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timestamp {
    Zoned(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl Timestamp {
    pub fn parse(value: &str) -> Result<Self> {
        isostr_to_datetime(value)
    }

    pub fn to_isostr(&self) -> String {
        datetime_to_isostr(self)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Timestamp::Zoned(dt.fixed_offset())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_isostr())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_isostr())
    }
}

/// Parse an ISO-8601 string (`Z`, numeric offset, zone-less or date-only).
pub fn isostr_to_datetime(value: &str) -> Result<Timestamp> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(Timestamp::Zoned(dt));
    }

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Timestamp::Naive(dt));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Timestamp::Naive(dt));
        }
    }

    Err(Error::InvalidDatetime(value.to_string()))
}

/// Render a timestamp as ISO-8601, using `Z` for UTC.
pub fn datetime_to_isostr(ts: &Timestamp) -> String {
    match ts {
        Timestamp::Zoned(dt) if dt.offset().local_minus_utc() == 0 => dt
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        Timestamp::Zoned(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, false),
        Timestamp::Naive(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
    }
}
